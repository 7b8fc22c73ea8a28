//! Manual per-cell overrides on top of a computed plan.
//!
//! Users may pin an individual quarter cell to a hand-edited amount. The
//! override lives in a sparse patch map kept apart from computed plans, so
//! a full recompute never leaves stale edits behind inside the derived
//! structure: the caller re-applies (or clears) the overlay explicitly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::CostGroupCode;

use super::{conservation_warnings, LiquidityPlan};

/// Sparse map of user-edited quarter cells: cost group code to quarter id
/// to pinned amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideMap {
    cells: BTreeMap<CostGroupCode, BTreeMap<String, f64>>,
}

impl OverrideMap {
    /// Creates an empty override map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins a cell to a sanitized amount.
    pub fn set(&mut self, code: impl Into<CostGroupCode>, quarter_id: impl Into<String>, amount: f64) {
        self.cells
            .entry(code.into())
            .or_default()
            .insert(quarter_id.into(), crate::ledger::sanitize_amount(amount));
    }

    /// Removes one pinned cell, restoring it to the computed value on the
    /// next [`OverrideMap::apply`].
    pub fn remove(&mut self, code: &CostGroupCode, quarter_id: &str) {
        if let Some(row) = self.cells.get_mut(code) {
            row.remove(quarter_id);
            if row.is_empty() {
                self.cells.remove(code);
            }
        }
    }

    /// Drops every override: full reset to computed values.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Returns the pinned amount for a cell, if any.
    #[must_use]
    pub fn get(&self, code: &CostGroupCode, quarter_id: &str) -> Option<f64> {
        self.cells.get(code).and_then(|row| row.get(quarter_id)).copied()
    }

    /// Number of pinned cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no cell is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Applies the overlay to a computed plan, returning a new plan.
    ///
    /// Only cells that exist in the plan are touched; overrides for codes
    /// or quarters the plan does not know are ignored. Conservation
    /// warnings are re-derived, so pinning a cell away from its computed
    /// value surfaces in the plan's warnings once the drift crosses
    /// tolerance.
    #[must_use]
    pub fn apply(&self, plan: &LiquidityPlan) -> LiquidityPlan {
        let mut patched = plan.clone();
        for (code, row) in &self.cells {
            let Some(allocation) = patched.allocations.get_mut(code) else {
                continue;
            };
            for (quarter_id, amount) in row {
                if let Some(cell) = allocation.quarter_amounts.get_mut(quarter_id) {
                    *cell = *amount;
                }
            }
        }
        patched.warnings = conservation_warnings(&patched.allocations);
        patched
    }
}
