use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use validator::ValidationError;

// Books
pub mod customers;
pub mod ledger;
pub mod parties;

// Sales and stock
pub mod inventory;
pub mod orders;
pub mod production;
pub mod products;

// People
pub mod staff;

// Administration
pub mod audit;
pub mod permissions;
pub mod settings;
pub mod users;

// Feeds
pub mod dashboard;
pub mod notifications;

/// Largest amount or quantity accepted in a request body
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Non-negative and no larger than [`MAX_AMOUNT`]
pub(crate) fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative_amount"));
    }
    validate_signed_amount(value)
}

/// Magnitude no larger than [`MAX_AMOUNT`]
pub(crate) fn validate_signed_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(ValidationError::new("amount_too_large"));
    }
    Ok(())
}

/// Midnight UTC at the start of `date`
pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(NaiveTime::MIN), Utc)
}
