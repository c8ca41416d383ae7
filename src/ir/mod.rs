//! Trade P&L (IR) engine
//!
//! Converts a broker's closed-trade report into monthly BRL results and the
//! annual tax figure: identify the platform from the column layout,
//! normalize each row, convert the USD net result at the close-date rate,
//! bucket by month and apply the 15% levy to a positive annual total.
//!
//! The caller supplies the rate map (typically `RateCache::buy_snapshot`
//! after resolving every close date); the engine never fetches.

pub mod platform;
pub mod report;

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{CalcError, Result};
use crate::TAX_RATE;

pub use platform::{identify, normalize, NormalizedTrade, PlatformProfile};
pub use report::{read_report_csv, ReportRow};

/// One closed trade after normalization and conversion
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedTrade {
    pub iso_date: NaiveDate,
    /// `YYYY-MM` bucket key
    pub year_month: String,
    pub asset: Option<String>,
    pub result_usd: Decimal,
    pub result_brl: Decimal,
    /// Pass-through columns the engine never reads
    pub extra: HashMap<String, String>,
}

/// Summed results for one `YYYY-MM` bucket
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyResult {
    pub month: String,
    pub result_usd: Decimal,
    pub result_brl: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrSummary {
    pub total_usd: Decimal,
    pub total_brl: Decimal,
    /// 15% of the annual BRL total when positive, zero otherwise
    pub annual_tax: Decimal,
    pub net_after_tax: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct IrReport {
    pub platform: String,
    pub trades: Vec<ProcessedTrade>,
    pub monthly: Vec<MonthlyResult>,
    pub summary: IrSummary,
    /// Close dates with no entry in the rate map. Those trades stay in the
    /// totals valued at R$ 0, so a non-empty list means the annual figures
    /// understate or overstate reality until the rates are backfilled.
    pub unresolved_dates: Vec<NaiveDate>,
}

/// Parse a broker-reported money value: spaces stripped, decimal comma or
/// decimal point accepted, anything unparsable counts as zero.
fn parse_result_value(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace(',', ".");
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

/// Parse a close date in `DD/MM/YYYY` or `YYYY.MM.DD` form, ignoring any
/// time-of-day suffix.
fn parse_close_date(raw: &str) -> Result<NaiveDate> {
    let token = raw.split_whitespace().next().unwrap_or("");

    let parsed = if token.contains('/') {
        NaiveDate::parse_from_str(token, "%d/%m/%Y")
    } else {
        NaiveDate::parse_from_str(&token.replace('.', "-"), "%Y-%m-%d")
    };

    parsed.map_err(|_| CalcError::InvalidCloseDate(raw.to_string()))
}

/// Apportion a closed-trade report into monthly results and the annual tax.
///
/// Fails the whole batch on an unidentified platform, an empty rate map or
/// an unparsable close date. A close date missing from the rate map does not
/// fail the batch: the trade is valued at R$ 0 and the date is reported in
/// `unresolved_dates`.
pub fn apportion(
    rows: &[ReportRow],
    rates: &HashMap<NaiveDate, Decimal>,
) -> Result<IrReport> {
    let profile = platform::identify(rows)?;
    info!("Identified trading platform: {}", profile.name);

    if rates.is_empty() {
        return Err(CalcError::EmptyRateMap);
    }

    let mut trades = Vec::with_capacity(rows.len());
    let mut unresolved_dates = Vec::new();

    for row in rows {
        let normalized = platform::normalize(row, profile);

        let result_usd = parse_result_value(&normalized.result);
        let iso_date = parse_close_date(&normalized.close_date)?;
        let year_month = format!("{:04}-{:02}", iso_date.year(), iso_date.month());

        let result_brl = match rates.get(&iso_date) {
            Some(rate) => result_usd * *rate,
            None => {
                warn!("No exchange rate for {}, trade valued at R$ 0", iso_date);
                unresolved_dates.push(iso_date);
                Decimal::ZERO
            }
        };

        trades.push(ProcessedTrade {
            iso_date,
            year_month,
            asset: normalized.asset,
            result_usd,
            result_brl,
            extra: normalized.extra,
        });
    }

    // BTreeMap keeps the YYYY-MM keys in chronological order
    let mut buckets: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for trade in &trades {
        let entry = buckets.entry(trade.year_month.clone()).or_default();
        entry.0 += trade.result_usd;
        entry.1 += trade.result_brl;
    }
    let monthly: Vec<MonthlyResult> = buckets
        .into_iter()
        .map(|(month, (result_usd, result_brl))| MonthlyResult {
            month,
            result_usd,
            result_brl,
        })
        .collect();

    let total_usd: Decimal = trades.iter().map(|t| t.result_usd).sum();
    let total_brl: Decimal = trades.iter().map(|t| t.result_brl).sum();
    let annual_tax = if total_brl > Decimal::ZERO {
        total_brl * TAX_RATE
    } else {
        Decimal::ZERO
    };
    let net_after_tax = total_brl - annual_tax;

    unresolved_dates.sort();
    unresolved_dates.dedup();

    Ok(IrReport {
        platform: profile.name.to_string(),
        trades,
        monthly,
        summary: IrSummary {
            total_usd,
            total_brl,
            annual_tax,
            net_after_tax,
        },
        unresolved_dates,
    })
}
