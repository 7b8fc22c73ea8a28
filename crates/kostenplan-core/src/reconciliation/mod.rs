//! Cross-entity cost reconciliation (the GF-Liste).
//!
//! Merges three independently maintained ledgers into one comparison per
//! trade identity: the planned calculation (cost groups KG 300/400), the
//! trade-level awarded costs, and the signed contract sums. Each row gets
//! a signed variance against a reference amount and a categorical status.
//!
//! # Precedence
//!
//! - `reference` is the first non-zero of trade amount, calculation
//!   amount, contract amount
//! - `actual` is the first non-zero of contract amount, trade amount,
//!   calculation amount
//! - `variance = actual - reference`
//!
//! Partial data is shown, not discarded: a contract or trade cost with no
//! match on the other side still produces a row, and entries with no
//! resolvable trade name fold into the unassigned bucket.

use serde::{Deserialize, Serialize};

use crate::ledger::{Contract, CostLedger, TradeCost};

/// Variance percentage at or below which a row counts as savings.
pub const SAVINGS_THRESHOLD_PERCENT: f64 = -5.0;
/// Variance percentage at or above which a row counts as an overrun.
pub const OVERRUN_THRESHOLD_PERCENT: f64 = 10.0;

/// Row identity used for contract and trade entries with a blank name.
pub const UNASSIGNED_IDENTITY: &str = "Nicht zugeordnet";

/// Number column marker for rows created from a contract with no matching
/// trade.
const CONTRACT_ONLY_NUMBER: &str = "V";

/// Categorical variance status of one reconciliation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceStatus {
    /// No contract and no awarded cost yet; only the calculation exists.
    Open,
    /// Awarded cost recorded, but no contract signed yet.
    Awarded,
    /// Contracted, variance at or below the savings threshold.
    Savings,
    /// Contracted, variance between the thresholds.
    OnTrack,
    /// Contracted, variance at or above the overrun threshold.
    Overrun,
}

impl VarianceStatus {
    /// Classifies a row from its amounts and variance percentage.
    #[must_use]
    pub fn classify(contract_amount: f64, trade_amount: f64, variance_percent: f64) -> Self {
        if contract_amount > 0.0 {
            if variance_percent <= SAVINGS_THRESHOLD_PERCENT {
                Self::Savings
            } else if variance_percent >= OVERRUN_THRESHOLD_PERCENT {
                Self::Overrun
            } else {
                Self::OnTrack
            }
        } else if trade_amount > 0.0 {
            Self::Awarded
        } else {
            Self::Open
        }
    }

    /// Returns the string representation used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Awarded => "awarded",
            Self::Savings => "savings",
            Self::OnTrack => "on_track",
            Self::Overrun => "overrun",
        }
    }
}

impl std::fmt::Display for VarianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One comparison line for a trade identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    /// Cost group code, trade number, or `"V"` for contract-only rows.
    pub number: String,
    /// The trade identity the three sources were matched on.
    pub name: String,
    /// Planned calculation amount, `0.0` if absent.
    pub calc_amount: f64,
    /// Awarded trade amount (or the trade's own estimate), `0.0` if absent.
    pub trade_amount: f64,
    /// Sum of matching contract sums, `0.0` if none.
    pub contract_amount: f64,
    /// The reference amount the variance is measured against.
    pub reference_amount: f64,
    /// `actual - reference`, signed.
    pub variance: f64,
    /// Variance as a percentage of the reference, `0.0` when the reference
    /// is zero.
    pub variance_percent: f64,
    /// Categorical status.
    pub status: VarianceStatus,
}

/// Component sums over all rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationTotals {
    /// Sum of calculation amounts.
    pub calc_amount: f64,
    /// Sum of trade amounts.
    pub trade_amount: f64,
    /// Sum of contract amounts.
    pub contract_amount: f64,
    /// Sum of row variances.
    pub variance: f64,
    /// Total variance against the summed reference basis, not averaged.
    pub variance_percent: f64,
}

/// The full reconciliation: sorted rows plus a totals record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// One row per trade identity, sorted by name, case-insensitive.
    pub rows: Vec<ReconciliationRow>,
    /// Component sums.
    pub totals: ReconciliationTotals,
}

struct PartialRow {
    number: String,
    name: String,
    calc_amount: f64,
    trade_amount: f64,
    contract_amount: f64,
}

/// First non-zero amount in precedence order.
fn first_non_zero(amounts: [f64; 3]) -> f64 {
    amounts.into_iter().find(|&a| a != 0.0).unwrap_or(0.0)
}

fn identity_of(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        UNASSIGNED_IDENTITY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reconciles the calculation ledger, trade costs, and contracts into one
/// report.
///
/// Pure over its inputs: nothing is mutated, and recomputation with
/// identical inputs yields an identical report. Zero identities produce an
/// empty row list plus a zero-valued totals record.
#[must_use]
pub fn reconcile(
    ledger: &CostLedger,
    trade_costs: &[TradeCost],
    contracts: &[Contract],
) -> ReconciliationReport {
    let mut rows: Vec<PartialRow> = Vec::new();

    // Calculation side: construction-trade cost groups only (KG 300/400).
    for group in ledger {
        if group.category.is_construction_trade() {
            rows.push(PartialRow {
                number: group.code.to_string(),
                name: group.name.clone(),
                calc_amount: group.amount,
                trade_amount: 0.0,
                contract_amount: 0.0,
            });
        }
    }

    // Trade-cost side, matched by name. A later entry with the same name
    // replaces the trade amount rather than accumulating, mirroring how
    // the trade list itself is maintained as one line per trade.
    for trade in trade_costs {
        let identity = identity_of(&trade.name);
        match rows.iter_mut().find(|row| row.name == identity) {
            Some(row) => row.trade_amount = trade.effective_amount(),
            None => rows.push(PartialRow {
                number: trade.number.clone(),
                name: identity,
                calc_amount: 0.0,
                trade_amount: trade.effective_amount(),
                contract_amount: 0.0,
            }),
        }
    }

    // Contract side, matched by trade name; sums accumulate since several
    // contracts may serve one trade.
    for contract in contracts {
        let identity = identity_of(&contract.trade);
        match rows.iter_mut().find(|row| row.name == identity) {
            Some(row) => row.contract_amount += contract.sum,
            None => rows.push(PartialRow {
                number: CONTRACT_ONLY_NUMBER.to_string(),
                name: identity,
                calc_amount: 0.0,
                trade_amount: 0.0,
                contract_amount: contract.sum,
            }),
        }
    }

    let mut rows: Vec<ReconciliationRow> = rows.into_iter().map(finalize_row).collect();
    rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let totals = compute_totals(&rows);
    ReconciliationReport { rows, totals }
}

fn finalize_row(row: PartialRow) -> ReconciliationRow {
    let reference_amount = first_non_zero([row.trade_amount, row.calc_amount, row.contract_amount]);
    let actual_amount = first_non_zero([row.contract_amount, row.trade_amount, row.calc_amount]);

    let variance = actual_amount - reference_amount;
    let variance_percent = if reference_amount > 0.0 {
        variance / reference_amount * 100.0
    } else {
        0.0
    };

    ReconciliationRow {
        number: row.number,
        name: row.name,
        calc_amount: row.calc_amount,
        trade_amount: row.trade_amount,
        contract_amount: row.contract_amount,
        reference_amount,
        variance,
        variance_percent,
        status: VarianceStatus::classify(row.contract_amount, row.trade_amount, variance_percent),
    }
}

fn compute_totals(rows: &[ReconciliationRow]) -> ReconciliationTotals {
    let mut totals = ReconciliationTotals::default();
    for row in rows {
        totals.calc_amount += row.calc_amount;
        totals.trade_amount += row.trade_amount;
        totals.contract_amount += row.contract_amount;
        totals.variance += row.variance;
    }

    let reference_total = first_non_zero([
        totals.trade_amount,
        totals.calc_amount,
        totals.contract_amount,
    ]);
    totals.variance_percent = if reference_total > 0.0 {
        totals.variance / reference_total * 100.0
    } else {
        0.0
    };
    totals
}
