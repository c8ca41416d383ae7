//! Broker platform identification and row normalization
//!
//! An uploaded operations report is matched against the known export shapes
//! by its column-name set (lower-cased, whitespace-collapsed). The matched
//! profile tells the engine which source columns hold the close date, net
//! result, commission, swap and asset; everything else passes through under
//! a snake-cased key.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::report::ReportRow;
use crate::error::{CalcError, Result};

/// Column mapping for one known broker export shape
#[derive(Debug)]
pub struct PlatformProfile {
    pub name: &'static str,
    /// Normalized column names that must all be present
    signature: &'static [&'static str],
    /// Source column headers as the platform exports them
    close_date: &'static str,
    result: &'static str,
    commission: &'static str,
    swap: &'static str,
    asset: &'static str,
}

const PROFILES: &[PlatformProfile] = &[
    PlatformProfile {
        name: "Metatrader 5 (Posições)",
        signature: &["position", "ativo", "horário", "lucro"],
        close_date: "Horário",
        result: "Lucro",
        commission: "Comissão",
        swap: "Swap",
        asset: "Ativo",
    },
    PlatformProfile {
        name: "Metatrader 5 (Negócios)",
        signature: &["n. do trade", "datade fechamento"],
        close_date: "Datade  Fechamento",
        result: "Resultado",
        commission: "Comissão",
        swap: "Swap",
        asset: "Ativo",
    },
    PlatformProfile {
        name: "Metatrader 5 (Inglês)",
        signature: &["position", "type", "deal"],
        close_date: "Time",
        result: "Profit",
        commission: "Commission",
        swap: "Swap",
        asset: "Symbol",
    },
    PlatformProfile {
        name: "Metatrader 4",
        signature: &["ticket", "open time", "close time"],
        close_date: "Close Time",
        result: "Profit",
        commission: "Commission",
        swap: "Swap",
        asset: "Item",
    },
    PlatformProfile {
        name: "CTrader",
        signature: &["tradeid", "direction", "close time"],
        close_date: "Close Time",
        result: "Net Profit",
        commission: "Commissions",
        swap: "Swap",
        asset: "Symbol",
    },
];

/// Row after renaming to canonical fields
#[derive(Debug, Clone, Default)]
pub struct NormalizedTrade {
    pub close_date: String,
    pub result: String,
    pub commission: Option<String>,
    pub swap: Option<String>,
    pub asset: Option<String>,
    /// Columns the engine never reads, kept under snake-cased keys
    pub extra: HashMap<String, String>,
}

/// Lower-case and collapse runs of whitespace to single spaces.
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn snake_case(header: &str) -> String {
    header
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Match a report's column layout against the known platform profiles.
///
/// Profiles are tried in a fixed order; the first whose signature columns
/// are all present wins. An empty report is its own error so the UI can
/// distinguish "empty file" from "unknown platform".
pub fn identify(rows: &[ReportRow]) -> Result<&'static PlatformProfile> {
    let first = rows.first().ok_or(CalcError::EmptyReport)?;
    let columns: HashSet<String> = first.keys().map(|k| normalize_header(k)).collect();

    for profile in PROFILES {
        if profile
            .signature
            .iter()
            .all(|column| columns.contains(*column))
        {
            debug!("Report columns match {}", profile.name);
            return Ok(profile);
        }
    }

    Err(CalcError::PlatformNotIdentified)
}

/// Rename a row's matched columns to canonical fields; unmatched columns
/// pass through snake-cased rather than being dropped.
pub fn normalize(row: &ReportRow, profile: &PlatformProfile) -> NormalizedTrade {
    let mut normalized = NormalizedTrade::default();

    for (key, value) in row {
        let nkey = normalize_header(key);
        if nkey == normalize_header(profile.close_date) {
            normalized.close_date = value.clone();
        } else if nkey == normalize_header(profile.result) {
            normalized.result = value.clone();
        } else if nkey == normalize_header(profile.commission) {
            normalized.commission = Some(value.clone());
        } else if nkey == normalize_header(profile.swap) {
            normalized.swap = Some(value.clone());
        } else if nkey == normalize_header(profile.asset) {
            normalized.asset = Some(value.clone());
        } else {
            normalized.extra.insert(snake_case(key), value.clone());
        }
    }

    normalized
}
