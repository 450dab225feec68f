use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const PAYMENT_METHOD_MANUAL: &str = "manual";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub property_id: String,
    pub customer_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub num_guests: u32,
    pub base_amount: Decimal,
    pub guest_charges: Decimal,
    pub extra_fees: Decimal,
    pub total_amount: Decimal,
    pub advance_paid: Decimal,
    pub status: BookingStatus,
    pub verification_status: VerificationStatus,
    pub id_proofs: Vec<String>,
    pub payment_method: String,
    pub manual_reference: Option<String>,
    pub payment_screenshot_url: Option<String>,
    pub food_required: bool,
    pub food_preference: Option<FoodPreference>,
    pub allergies: Option<String>,
    pub special_requests: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn payment_submitted(&self) -> bool {
        self.manual_reference.is_some()
            || self.payment_screenshot_url.is_some()
            || self.advance_paid > Decimal::ZERO
    }

    /// Where the booking sits in the customer-facing flow. Pending bookings are
    /// split by verification and payment state; the rest map one-to-one.
    pub fn stage(&self) -> BookingStage {
        match self.status {
            BookingStatus::Confirmed => BookingStage::Confirmed,
            BookingStatus::Completed => BookingStage::Completed,
            BookingStatus::Cancelled => BookingStage::Cancelled,
            BookingStatus::Pending => match self.verification_status {
                VerificationStatus::Pending => BookingStage::AwaitingVerification,
                VerificationStatus::Rejected => BookingStage::VerificationRejected,
                VerificationStatus::Approved if self.payment_submitted() => {
                    BookingStage::AwaitingConfirmation
                }
                VerificationStatus::Approved => BookingStage::AwaitingPayment,
            },
        }
    }

    pub fn outstanding_amount(&self) -> Decimal {
        self.total_amount - self.advance_paid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }

    /// Statuses that hold the property's date against other requests.
    pub fn holds_date(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerificationStatus::Pending),
            "approved" => Some(VerificationStatus::Approved),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FoodPreference {
    #[serde(rename = "veg")]
    Veg,
    #[serde(rename = "non-veg")]
    NonVeg,
    #[serde(rename = "both")]
    Both,
}

impl FoodPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodPreference::Veg => "veg",
            FoodPreference::NonVeg => "non-veg",
            FoodPreference::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "veg" => Some(FoodPreference::Veg),
            "non-veg" => Some(FoodPreference::NonVeg),
            "both" => Some(FoodPreference::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStage {
    AwaitingVerification,
    VerificationRejected,
    AwaitingPayment,
    AwaitingConfirmation,
    Confirmed,
    Completed,
    Cancelled,
}

/// Customer-supplied part of a booking request. Pricing and status fields are
/// always computed server-side.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub property_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub num_guests: u32,
    #[serde(default)]
    pub food_required: bool,
    pub food_preference: Option<FoodPreference>,
    pub allergies: Option<String>,
    pub special_requests: Option<String>,
}
