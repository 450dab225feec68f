use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingRequest, Identity, Property};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Property not found")]
    PropertyNotFound,
    #[error("Property is not available for booking")]
    PropertyInactive,
    #[error("Maximum {max} guests allowed")]
    TooManyGuests { max: u32 },
    #[error("Bookings are for a single day: check-in and check-out must be the same date")]
    InvalidStayShape,
    #[error("Check-in date cannot be in the past")]
    PastDate,
    #[error("Property is already booked for these dates")]
    AlreadyBooked,
    #[error("A phone number is required before booking")]
    PhoneRequired,
}

impl AdmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::PropertyNotFound => "property_not_found",
            AdmissionError::PropertyInactive => "property_inactive",
            AdmissionError::TooManyGuests { .. } => "too_many_guests",
            AdmissionError::InvalidStayShape => "invalid_stay_shape",
            AdmissionError::PastDate => "past_date",
            AdmissionError::AlreadyBooked => "already_booked",
            AdmissionError::PhoneRequired => "phone_required",
        }
    }
}

/// Runs the admission rules in order and returns the first failure. The
/// overlap lookup is only as strong as the surrounding transaction.
pub fn check_admission(
    conn: &Connection,
    identity: &Identity,
    property: Option<&Property>,
    request: &BookingRequest,
    today: NaiveDate,
) -> Result<(), AppError> {
    let property = property.ok_or(AdmissionError::PropertyNotFound)?;
    if !property.is_active {
        return Err(AdmissionError::PropertyInactive.into());
    }

    if request.num_guests > property.max_guests {
        return Err(AdmissionError::TooManyGuests {
            max: property.max_guests,
        }
        .into());
    }

    if request.check_in_date != request.check_out_date {
        return Err(AdmissionError::InvalidStayShape.into());
    }

    if request.check_in_date < today {
        return Err(AdmissionError::PastDate.into());
    }

    let conflicts = queries::find_overlapping_bookings(
        conn,
        &property.id,
        &request.check_in_date,
        &request.check_out_date,
    )?;
    if !conflicts.is_empty() {
        tracing::debug!(
            property_id = %property.id,
            conflicting = conflicts.len(),
            "booking request overlaps existing bookings"
        );
        return Err(AdmissionError::AlreadyBooked.into());
    }

    if !has_phone_on_file(conn, identity) {
        return Err(AdmissionError::PhoneRequired.into());
    }

    Ok(())
}

/// A phone from the identity claims or the saved profile is enough; a verified
/// one is not required. If the profile cannot be read the request is let
/// through.
fn has_phone_on_file(conn: &Connection, identity: &Identity) -> bool {
    if identity.phone.as_deref().is_some_and(|p| !p.trim().is_empty()) {
        return true;
    }
    match queries::get_profile(conn, &identity.id) {
        Ok(Some(profile)) => profile.has_phone(),
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(
                error = %e,
                user_id = %identity.id,
                "profile lookup failed, allowing booking"
            );
            true
        }
    }
}
