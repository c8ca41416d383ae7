//! Error handling for the tax engines
//!
//! Defines the calculation error taxonomy. Engine failures are typed so the
//! UI can map each variant to a specific user-facing message; file IO at the
//! import boundary uses anyhow for context chaining instead.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the cambial and IR engines and the rate resolver
#[derive(Error, Debug)]
pub enum CalcError {
    #[error("exchange rate not available for {0}, check connectivity and retry")]
    RateUnavailable(NaiveDate),

    #[error("withdrawal of ${requested} on {date} exceeds the ${available} held on that date")]
    InsufficientBalance {
        date: NaiveDate,
        requested: Decimal,
        available: Decimal,
    },

    #[error("trading platform not identified from the report's column layout")]
    PlatformNotIdentified,

    #[error("the operations report is empty")]
    EmptyReport,

    #[error("the exchange-rate map is empty")]
    EmptyRateMap,

    #[error("invalid close date: {0}")]
    InvalidCloseDate(String),

    #[error("the first movement in a history must be an inflow (Envio)")]
    FirstMovementNotInflow,

    #[error("movement on {0} has a non-positive amount")]
    NonPositiveAmount(NaiveDate),

    #[error("a held-over (Não Retirada) movement is only allowed on December 31, got {0}")]
    HeldOverOutsideYearEnd(NaiveDate),

    #[error("rate service request failed")]
    RateService(#[from] reqwest::Error),

    #[error("rate service returned status {0}")]
    RateServiceStatus(reqwest::StatusCode),

    #[error("rate service returned an unparsable quote for {0}")]
    InvalidQuote(NaiveDate),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CalcError>;
