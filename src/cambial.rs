//! Capital-flow (cambial) engine
//!
//! Processes a user's USD remittance history under weighted-average-cost
//! accounting: each inflow raises the BRL cost basis of the USD balance,
//! each outflow realizes gain or loss against the running average cost, and
//! a year-end held-over election defers recognition by re-basing the cost
//! forward without touching the balance. Gains realized on outflows are
//! taxed at 15%; losses and deferred gains are not.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, Result};
use crate::rates::{RateCache, RateSide};
use crate::TAX_RATE;

/// One capital movement in the user's history.
///
/// Field names mirror the stored document shape, so histories persisted by
/// the UI deserialize directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    #[serde(rename = "value")]
    pub amount_usd: Decimal,
    /// Rate captured when the movement was first persisted; used only to
    /// pre-seed the cache on load, never read by the engine.
    #[serde(rename = "cotacao", default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    /// Money sent abroad ("Envio")
    #[serde(rename = "Envio")]
    Inflow,
    /// Money withdrawn back to BRL ("Retirada")
    #[serde(rename = "Retirada")]
    Outflow,
    /// Year-end deferral election ("Não Retirada"), Dec 31 only
    #[serde(rename = "Não Retirada")]
    HeldOver,
}

/// Per-movement engine output, one row per input in order
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMovement {
    pub date: NaiveDate,
    pub kind: MovementKind,
    pub amount_usd: Decimal,
    /// BRL per USD applied to this movement
    pub rate: Decimal,
    pub amount_brl: Decimal,
    /// Realized gain/loss in BRL, zero for inflows
    pub gain_loss: Decimal,
    /// USD balance immediately after this movement
    pub balance_usd: Decimal,
}

/// KPI roll-up over a fully processed history
#[derive(Debug, Clone, Default, Serialize)]
pub struct CambialSummary {
    pub balance_usd: Decimal,
    /// BRL cost of the USD currently held
    pub cost_basis_brl: Decimal,
    pub total_inflow_usd: Decimal,
    pub total_inflow_brl: Decimal,
    pub total_outflow_usd: Decimal,
    pub total_outflow_brl: Decimal,
    pub total_gain_loss: Decimal,
    /// Positive gains on true outflows only; deferrals and losses excluded
    pub taxable_gain: Decimal,
    pub tax_due: Decimal,
    /// Mark-to-market BRL value of the most recent held-over election
    pub held_over_value_brl: Option<Decimal>,
    /// True when a held-over was recorded on December 31
    pub offer_carry_forward: bool,
    /// What the dashboard shows as the current BRL balance
    pub display_balance_brl: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CambialReport {
    pub rows: Vec<ProcessedMovement>,
    pub summary: CambialSummary,
}

/// Check the UI preconditions on a movement history before processing.
///
/// The engine itself only enforces balance sufficiency; these rules guard
/// data entry: a history must open with an inflow, amounts are positive, and
/// the held-over election exists only on December 31.
pub fn validate_movements(movements: &[Movement]) -> Result<()> {
    if let Some(first) = movements.first() {
        if first.kind != MovementKind::Inflow {
            return Err(CalcError::FirstMovementNotInflow);
        }
    }

    for movement in movements {
        if movement.amount_usd <= Decimal::ZERO {
            return Err(CalcError::NonPositiveAmount(movement.date));
        }
        if movement.kind == MovementKind::HeldOver && !is_year_end(movement.date) {
            return Err(CalcError::HeldOverOutsideYearEnd(movement.date));
        }
    }

    Ok(())
}

fn is_year_end(date: NaiveDate) -> bool {
    date.month() == 12 && date.day() == 31
}

/// Process a date-ascending movement history into per-row results and KPIs.
///
/// Every rate the pass needs must already be in the cache (the engine never
/// fetches); a missing rate fails that movement with `RateUnavailable`, and
/// a withdrawal larger than the running balance fails the whole batch.
pub fn process(movements: &[Movement], rates: &RateCache) -> Result<CambialReport> {
    let mut balance_usd = Decimal::ZERO;
    let mut cost_basis_brl = Decimal::ZERO;
    let mut total_inflow_usd = Decimal::ZERO;
    let mut total_inflow_brl = Decimal::ZERO;
    let mut total_outflow_usd = Decimal::ZERO;
    let mut total_outflow_brl = Decimal::ZERO;
    let mut total_gain_loss = Decimal::ZERO;
    let mut taxable_gain = Decimal::ZERO;
    let mut held_over_value_brl: Option<Decimal> = None;
    let mut offer_carry_forward = false;

    let mut rows = Vec::with_capacity(movements.len());

    for movement in movements {
        let side = RateSide::for_kind(movement.kind);
        let rate = rates
            .get(movement.date, side)
            .ok_or(CalcError::RateUnavailable(movement.date))?;

        let amount_brl = movement.amount_usd * rate;
        let mut gain_loss = Decimal::ZERO;

        match movement.kind {
            MovementKind::Inflow => {
                balance_usd += movement.amount_usd;
                cost_basis_brl += amount_brl;
                total_inflow_usd += movement.amount_usd;
                total_inflow_brl += amount_brl;
            }
            MovementKind::Outflow | MovementKind::HeldOver => {
                if movement.amount_usd > balance_usd {
                    return Err(CalcError::InsufficientBalance {
                        date: movement.date,
                        requested: movement.amount_usd,
                        available: balance_usd,
                    });
                }

                let avg_cost = if balance_usd > Decimal::ZERO {
                    cost_basis_brl / balance_usd
                } else {
                    Decimal::ZERO
                };
                let operation_cost_brl = movement.amount_usd * avg_cost;

                gain_loss = amount_brl - operation_cost_brl;
                total_gain_loss += gain_loss;

                if movement.kind == MovementKind::Outflow && gain_loss > Decimal::ZERO {
                    taxable_gain += gain_loss;
                }

                if movement.kind == MovementKind::HeldOver {
                    // Deferral, not a realization: the USD balance stays put
                    // and the cost basis is re-based forward as if the gain
                    // were reinvested.
                    cost_basis_brl += Decimal::TWO * gain_loss;
                    held_over_value_brl = Some(amount_brl);
                    if is_year_end(movement.date) {
                        offer_carry_forward = true;
                    }
                } else {
                    total_outflow_usd += movement.amount_usd;
                    total_outflow_brl += amount_brl;
                    balance_usd -= movement.amount_usd;
                    cost_basis_brl -= operation_cost_brl;
                }
            }
        }

        rows.push(ProcessedMovement {
            date: movement.date,
            kind: movement.kind,
            amount_usd: movement.amount_usd,
            rate,
            amount_brl,
            gain_loss,
            balance_usd,
        });
    }

    let tax_due = taxable_gain * TAX_RATE;
    let display_balance_brl = match held_over_value_brl {
        Some(value) => value,
        None if balance_usd.is_zero() => Decimal::ZERO,
        None => cost_basis_brl + total_gain_loss,
    };

    Ok(CambialReport {
        rows,
        summary: CambialSummary {
            balance_usd,
            cost_basis_brl,
            total_inflow_usd,
            total_inflow_brl,
            total_outflow_usd,
            total_outflow_brl,
            total_gain_loss,
            taxable_gain,
            tax_due,
            held_over_value_brl,
            offer_carry_forward,
            display_balance_brl,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RatePair;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn movement(date: NaiveDate, kind: MovementKind, amount: Decimal) -> Movement {
        Movement {
            date,
            kind,
            amount_usd: amount,
            rate: None,
        }
    }

    /// Cache where buy and sell sides carry the same rate per date
    fn flat_cache(rates: &[(NaiveDate, Decimal)]) -> RateCache {
        let cache = RateCache::new();
        for &(d, r) in rates {
            cache.insert_pair(d, RatePair { buy: r, sell: r });
        }
        cache
    }

    #[test]
    fn test_average_cost_realization() {
        // 1000 USD in at 5.00, 500 USD out at 5.50
        let d1 = date(2024, 1, 2);
        let d2 = date(2024, 1, 3);
        let cache = flat_cache(&[(d1, dec!(5.00)), (d2, dec!(5.50))]);
        let movements = vec![
            movement(d1, MovementKind::Inflow, dec!(1000)),
            movement(d2, MovementKind::Outflow, dec!(500)),
        ];

        let report = process(&movements, &cache).unwrap();

        let outflow = &report.rows[1];
        assert_eq!(outflow.amount_brl, dec!(2750));
        assert_eq!(outflow.gain_loss, dec!(250));
        assert_eq!(outflow.balance_usd, dec!(500));

        let kpi = &report.summary;
        assert_eq!(kpi.taxable_gain, dec!(250));
        assert_eq!(kpi.tax_due, dec!(37.50));
        assert_eq!(kpi.balance_usd, dec!(500));
        assert_eq!(kpi.cost_basis_brl, dec!(2500));
    }

    #[test]
    fn test_inflow_and_outflow_totals_match_rows() {
        let days: Vec<NaiveDate> = (1..=4).map(|d| date(2024, 2, d)).collect();
        let cache = flat_cache(&[
            (days[0], dec!(5.00)),
            (days[1], dec!(5.10)),
            (days[2], dec!(5.20)),
            (days[3], dec!(5.30)),
        ]);
        let movements = vec![
            movement(days[0], MovementKind::Inflow, dec!(1000)),
            movement(days[1], MovementKind::Inflow, dec!(250)),
            movement(days[2], MovementKind::Outflow, dec!(300)),
            movement(days[3], MovementKind::Outflow, dec!(200)),
        ];

        let report = process(&movements, &cache).unwrap();

        let inflow_sum: Decimal = report
            .rows
            .iter()
            .filter(|r| r.kind == MovementKind::Inflow)
            .map(|r| r.amount_usd)
            .sum();
        let outflow_sum: Decimal = report
            .rows
            .iter()
            .filter(|r| r.kind == MovementKind::Outflow)
            .map(|r| r.amount_usd)
            .sum();

        assert_eq!(inflow_sum, report.summary.total_inflow_usd);
        assert_eq!(outflow_sum, report.summary.total_outflow_usd);
        assert_eq!(report.summary.balance_usd, inflow_sum - outflow_sum);
    }

    #[test]
    fn test_balance_never_negative_and_oversell_fails() {
        let d1 = date(2024, 1, 2);
        let d2 = date(2024, 1, 3);
        let cache = flat_cache(&[(d1, dec!(5.00)), (d2, dec!(5.50))]);
        let movements = vec![
            movement(d1, MovementKind::Inflow, dec!(100)),
            movement(d2, MovementKind::Outflow, dec!(150)),
        ];

        let err = process(&movements, &cache).unwrap_err();
        match err {
            CalcError::InsufficientBalance {
                date: d,
                requested,
                available,
            } => {
                assert_eq!(d, d2);
                assert_eq!(requested, dec!(150));
                assert_eq!(available, dec!(100));
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[test]
    fn test_held_over_defers_without_reducing_balance() {
        let d1 = date(2024, 1, 2);
        let d2 = date(2024, 1, 3);
        let year_end = date(2024, 12, 31);
        let cache = flat_cache(&[
            (d1, dec!(5.00)),
            (d2, dec!(5.50)),
            (year_end, dec!(6.00)),
        ]);
        let movements = vec![
            movement(d1, MovementKind::Inflow, dec!(1000)),
            movement(d2, MovementKind::Outflow, dec!(500)),
            movement(year_end, MovementKind::HeldOver, dec!(500)),
        ];

        let report = process(&movements, &cache).unwrap();
        let kpi = &report.summary;

        assert_eq!(kpi.balance_usd, dec!(500));
        assert_eq!(kpi.held_over_value_brl, Some(dec!(3000)));
        assert!(kpi.offer_carry_forward);
        assert_eq!(kpi.display_balance_brl, dec!(3000));

        // Deferred gain is not taxable; only the earlier outflow gain is
        assert_eq!(kpi.taxable_gain, dec!(250));
        // Cost basis re-based forward: 2500 + 2 * (3000 - 2500)
        assert_eq!(kpi.cost_basis_brl, dec!(3500));
    }

    #[test]
    fn test_losses_are_not_taxable_and_do_not_offset_gains() {
        let d1 = date(2024, 3, 1);
        let d2 = date(2024, 3, 2);
        let d3 = date(2024, 3, 3);
        let cache = flat_cache(&[(d1, dec!(5.00)), (d2, dec!(4.00)), (d3, dec!(5.50))]);
        let movements = vec![
            movement(d1, MovementKind::Inflow, dec!(1000)),
            // Loss of 500 BRL: 400 * (4.00 - 5.00)
            movement(d2, MovementKind::Outflow, dec!(400)),
            // Gain of 300 BRL: 600 * (5.50 - 5.00)
            movement(d3, MovementKind::Outflow, dec!(600)),
        ];

        let report = process(&movements, &cache).unwrap();
        let kpi = &report.summary;

        assert_eq!(kpi.total_gain_loss, dec!(-100));
        // Only the positive gain accumulates; the loss never nets against it
        assert_eq!(kpi.taxable_gain, dec!(300));
        assert_eq!(kpi.tax_due, dec!(45.00));
    }

    #[test]
    fn test_display_balance_zero_when_fully_withdrawn() {
        let d1 = date(2024, 1, 2);
        let d2 = date(2024, 1, 3);
        let cache = flat_cache(&[(d1, dec!(5.00)), (d2, dec!(5.50))]);
        let movements = vec![
            movement(d1, MovementKind::Inflow, dec!(100)),
            movement(d2, MovementKind::Outflow, dec!(100)),
        ];

        let report = process(&movements, &cache).unwrap();
        assert_eq!(report.summary.balance_usd, Decimal::ZERO);
        assert_eq!(report.summary.display_balance_brl, Decimal::ZERO);
    }

    #[test]
    fn test_missing_rate_fails_movement() {
        let d1 = date(2024, 1, 2);
        let cache = flat_cache(&[]);
        let movements = vec![movement(d1, MovementKind::Inflow, dec!(100))];

        let err = process(&movements, &cache).unwrap_err();
        assert!(matches!(err, CalcError::RateUnavailable(d) if d == d1));
    }

    #[test]
    fn test_empty_history_yields_zero_summary() {
        let report = process(&[], &RateCache::new()).unwrap();
        assert!(report.rows.is_empty());
        assert_eq!(report.summary.balance_usd, Decimal::ZERO);
        assert_eq!(report.summary.display_balance_brl, Decimal::ZERO);
        assert!(!report.summary.offer_carry_forward);
    }

    #[test]
    fn test_validate_rejects_non_inflow_first_movement() {
        let d = date(2024, 1, 2);
        let sequence = vec![movement(d, MovementKind::Outflow, dec!(100))];
        assert!(matches!(
            validate_movements(&sequence),
            Err(CalcError::FirstMovementNotInflow)
        ));

        let held = vec![movement(date(2024, 12, 31), MovementKind::HeldOver, dec!(1))];
        assert!(matches!(
            validate_movements(&held),
            Err(CalcError::FirstMovementNotInflow)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_amounts_and_dates() {
        let ok = vec![
            movement(date(2024, 1, 2), MovementKind::Inflow, dec!(100)),
            movement(date(2024, 12, 31), MovementKind::HeldOver, dec!(50)),
        ];
        assert!(validate_movements(&ok).is_ok());

        let zero = vec![movement(date(2024, 1, 2), MovementKind::Inflow, dec!(0))];
        assert!(matches!(
            validate_movements(&zero),
            Err(CalcError::NonPositiveAmount(_))
        ));

        let midyear_hold = vec![
            movement(date(2024, 1, 2), MovementKind::Inflow, dec!(100)),
            movement(date(2024, 6, 15), MovementKind::HeldOver, dec!(50)),
        ];
        assert!(matches!(
            validate_movements(&midyear_hold),
            Err(CalcError::HeldOverOutsideYearEnd(_))
        ));
    }

    #[test]
    fn test_movement_serde_matches_stored_document_shape() {
        let json = r#"{"date":"2024-12-31","type":"Não Retirada","value":"500","cotacao":"6.00"}"#;
        let parsed: Movement = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, MovementKind::HeldOver);
        assert_eq!(parsed.amount_usd, dec!(500));
        assert_eq!(parsed.rate, Some(dec!(6.00)));

        let no_rate: Movement =
            serde_json::from_str(r#"{"date":"2024-01-02","type":"Envio","value":"100"}"#).unwrap();
        assert_eq!(no_rate.rate, None);
    }
}
