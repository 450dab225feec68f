use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::Property;

/// Platform-wide pricing constants. One advance fraction per deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy {
    pub food_rate: Decimal,
    pub advance_fraction: Decimal,
}

/// Per-unit rates a quote is computed from. Normally taken from a `Property`.
#[derive(Debug, Clone, Copy)]
pub struct RateCard {
    pub base_price_per_night: Decimal,
    pub per_head_price: Decimal,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
}

impl From<&Property> for RateCard {
    fn from(p: &Property) -> Self {
        RateCard {
            base_price_per_night: p.base_price_per_night,
            per_head_price: p.per_head_price,
            cleaning_fee: p.cleaning_fee,
            service_fee: p.service_fee,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub nights: u32,
    pub num_guests: u32,
    pub base_price_per_night: Decimal,
    pub per_head_price: Decimal,
    pub food_rate: Decimal,
    pub base_amount: Decimal,
    pub guest_charges: Decimal,
    pub food_charges: Decimal,
    pub cleaning_fee: Decimal,
    pub service_fee: Decimal,
    pub extra_fees: Decimal,
    pub total_amount: Decimal,
    pub advance_fraction: Decimal,
    pub advance_amount: Decimal,
    pub remaining_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("at least one guest is required")]
    NoGuests,
    #[error("check-out date cannot be before check-in date")]
    CheckOutBeforeCheckIn,
    #[error("{0} must not be negative")]
    NegativeRate(&'static str),
    #[error("amount is too large to price")]
    Overflow,
}

impl PricingError {
    pub fn field(&self) -> &'static str {
        match self {
            PricingError::NoGuests => "num_guests",
            PricingError::CheckOutBeforeCheckIn => "check_out_date",
            PricingError::NegativeRate(field) => *field,
            PricingError::Overflow => "total_amount",
        }
    }
}

pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> Result<u32, PricingError> {
    let days = (check_out - check_in).num_days();
    if days < 0 {
        return Err(PricingError::CheckOutBeforeCheckIn);
    }
    Ok(u32::try_from(days).unwrap_or(u32::MAX).max(1))
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_mul(b).ok_or(PricingError::Overflow)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_add(b).ok_or(PricingError::Overflow)
}

/// Up-front share of `total`, rounded half-up to two decimal places.
pub fn advance_for(total: Decimal, policy: &PricingPolicy) -> Result<Decimal, PricingError> {
    Ok(mul(total, policy.advance_fraction)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .min(total))
}

pub fn compute_quote(
    rates: RateCard,
    check_in: NaiveDate,
    check_out: NaiveDate,
    num_guests: u32,
    food_required: bool,
    policy: &PricingPolicy,
) -> Result<PriceBreakdown, PricingError> {
    if num_guests < 1 {
        return Err(PricingError::NoGuests);
    }
    let checks = [
        ("base_price_per_night", rates.base_price_per_night),
        ("per_head_price", rates.per_head_price),
        ("cleaning_fee", rates.cleaning_fee),
        ("service_fee", rates.service_fee),
        ("food_rate", policy.food_rate),
    ];
    for (field, value) in checks {
        if value < Decimal::ZERO {
            return Err(PricingError::NegativeRate(field));
        }
    }

    let nights = nights_between(check_in, check_out)?;
    let nights_d = Decimal::from(nights);
    let guests_d = Decimal::from(num_guests);

    // Rates are unbounded above, so every step is checked.
    let base_amount = mul(rates.base_price_per_night, nights_d)?;
    let guest_charges = mul(mul(rates.per_head_price, guests_d)?, nights_d)?;
    let food_charges = if food_required {
        mul(mul(policy.food_rate, guests_d)?, nights_d)?
    } else {
        Decimal::ZERO
    };
    let extra_fees = add(add(rates.cleaning_fee, rates.service_fee)?, food_charges)?;
    let total_amount = add(add(base_amount, guest_charges)?, extra_fees)?;

    let advance_amount = advance_for(total_amount, policy)?;
    let remaining_amount = total_amount - advance_amount;

    Ok(PriceBreakdown {
        nights,
        num_guests,
        base_price_per_night: rates.base_price_per_night,
        per_head_price: rates.per_head_price,
        food_rate: policy.food_rate,
        base_amount,
        guest_charges,
        food_charges,
        cleaning_fee: rates.cleaning_fee,
        service_fee: rates.service_fee,
        extra_fees,
        total_amount,
        advance_fraction: policy.advance_fraction,
        advance_amount,
        remaining_amount,
    })
}
