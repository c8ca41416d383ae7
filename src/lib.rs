//! Cambio - USD cost-basis and trader tax engine
//!
//! This library implements the tax calculations behind a retail trader's
//! annual declaration for US-dollar markets: a weighted-average-cost
//! capital-flow engine for remittances (cambial), a monthly trade P&L
//! apportionment engine (IR), and the daily PTAX exchange-rate resolver
//! both engines read from.

pub mod cambial;
pub mod error;
pub mod ir;
pub mod rates;
pub mod utils;

pub use error::{CalcError, Result};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Levy applied to non-exempt gains in both engines (15%)
pub const TAX_RATE: Decimal = dec!(0.15);
