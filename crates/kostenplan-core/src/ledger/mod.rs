//! Cost ledger model for DIN 276 building projects.
//!
//! The ledger is the single source of truth every derived computation reads
//! from: the distribution engine spreads its amounts over quarters, and the
//! reconciliation engine compares it against trade-level awarded costs and
//! signed contracts. Three independently edited collections live here:
//!
//! - **[`CostLedger`]**: cost groups keyed by DIN 276 code ("100".."800"),
//!   with a main-group / subgroup hierarchy
//! - **[`TradeCost`]**: per-trade construction cost lines carrying both the
//!   original estimate and the awarded (tendered) amount
//! - **[`Contract`]**: signed contract sums associated with a trade by name
//!
//! # Sanitization
//!
//! This is a best-effort planning aid, not a validating transaction system.
//! Monetary inputs are sanitized at the boundary: non-finite or negative
//! amounts are coerced to zero (with a `tracing` warning) instead of being
//! rejected, so `NaN` can never reach the derivation engines.
//!
//! # Invariants
//!
//! - Cost group codes are unique within a ledger
//! - A subgroup's parent must reference an existing main group

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coerces a monetary input to a safe value.
///
/// Non-finite and negative amounts become `0.0`. Derived computations rely
/// on this: no `NaN` may enter a distribution or reconciliation.
#[must_use]
pub fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::warn!(value, "non-finite or negative amount coerced to zero");
        0.0
    }
}

/// A hierarchical DIN 276-style cost group code, e.g. `"300"` or `"310"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostGroupCode(String);

impl CostGroupCode {
    /// Creates a code from its string form. Surrounding whitespace is
    /// trimmed; no further validation is applied (non-numeric codes simply
    /// classify as [`CostGroupCategory::Other`]).
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric value of the code, if it parses as one.
    #[must_use]
    pub fn numeric(&self) -> Option<u32> {
        self.0.parse().ok()
    }

    /// Returns `true` for main-group codes (multiples of 100).
    #[must_use]
    pub fn is_main_group(&self) -> bool {
        self.numeric().is_some_and(|n| n % 100 == 0)
    }

    /// Returns the classification derived from the hundreds digit.
    #[must_use]
    pub fn category(&self) -> CostGroupCategory {
        CostGroupCategory::from_code(self)
    }
}

impl std::fmt::Display for CostGroupCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CostGroupCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Classification of a cost group by its DIN 276 main group.
///
/// Derived once per code and carried alongside the entity, replacing
/// repeated string-prefix dispatch at every use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CostGroupCategory {
    /// KG 100: land acquisition (Grundstück).
    Land,
    /// KG 200: site preparation and servicing (Herrichten und Erschließen).
    SitePreparation,
    /// KG 300: structural work (Bauwerk - Baukonstruktion).
    Structure,
    /// KG 400: building services (Bauwerk - Technische Anlagen).
    BuildingServices,
    /// KG 500: outdoor facilities (Außenanlagen).
    OutdoorWorks,
    /// KG 600: furnishings and artwork (Ausstattung und Kunstwerke).
    Furnishing,
    /// KG 700: ancillary construction costs (Baunebenkosten).
    AncillaryCosts,
    /// KG 800: financing (Finanzierung).
    Financing,
    /// Anything outside KG 100-899, including non-numeric codes.
    Other,
}

impl CostGroupCategory {
    /// Classifies a code by its hundreds digit.
    #[must_use]
    pub fn from_code(code: &CostGroupCode) -> Self {
        match code.numeric().map(|n| n / 100 * 100) {
            Some(100) => Self::Land,
            Some(200) => Self::SitePreparation,
            Some(300) => Self::Structure,
            Some(400) => Self::BuildingServices,
            Some(500) => Self::OutdoorWorks,
            Some(600) => Self::Furnishing,
            Some(700) => Self::AncillaryCosts,
            Some(800) => Self::Financing,
            _ => Self::Other,
        }
    }

    /// Returns `true` for the construction-trade main groups (KG 300/400)
    /// that participate in trade-level reconciliation.
    #[must_use]
    pub const fn is_construction_trade(&self) -> bool {
        matches!(self, Self::Structure | Self::BuildingServices)
    }

    /// Returns the string representation used in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Land => "land",
            Self::SitePreparation => "site_preparation",
            Self::Structure => "structure",
            Self::BuildingServices => "building_services",
            Self::OutdoorWorks => "outdoor_works",
            Self::Furnishing => "furnishing",
            Self::AncillaryCosts => "ancillary_costs",
            Self::Financing => "financing",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for CostGroupCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single budget line: one DIN 276 cost group with its planned amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostGroup {
    /// Unique hierarchical code within the ledger.
    pub code: CostGroupCode,
    /// Display name.
    pub name: String,
    /// Planned amount in EUR. Always finite and non-negative.
    pub amount: f64,
    /// Optional free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Optional parent main-group code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CostGroupCode>,
    /// Classification derived from the code.
    pub category: CostGroupCategory,
}

impl CostGroup {
    /// Creates a cost group with a sanitized amount and derived category.
    #[must_use]
    pub fn new(code: impl Into<CostGroupCode>, name: impl Into<String>, amount: f64) -> Self {
        let code = code.into();
        let category = code.category();
        Self {
            code,
            name: name.into(),
            amount: sanitize_amount(amount),
            notes: None,
            parent: None,
            category,
        }
    }

    /// Attaches a parent main-group code.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<CostGroupCode>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Attaches free-text notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Errors raised by ledger mutation.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    /// A cost group with the same code already exists.
    #[error("duplicate cost group code '{code}'")]
    DuplicateCode {
        /// The conflicting code.
        code: String,
    },

    /// The referenced parent code does not exist in the ledger.
    #[error("cost group '{code}' references unknown parent '{parent}'")]
    UnknownParent {
        /// The subgroup's code.
        code: String,
        /// The missing parent code.
        parent: String,
    },

    /// The referenced parent exists but is not a main group.
    #[error("cost group '{code}' references parent '{parent}' which is not a main group")]
    ParentNotMainGroup {
        /// The subgroup's code.
        code: String,
        /// The non-main-group parent code.
        parent: String,
    },
}

/// The project's flat cost-group ledger, ordered by code.
///
/// Mutation goes through [`CostLedger::insert`], which enforces code
/// uniqueness and parent integrity. Derivation engines treat the ledger as
/// read-only input and return new structures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    entries: BTreeMap<CostGroupCode, CostGroup>,
}

impl CostLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cost group.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateCode`] if the code is already
    /// present, [`LedgerError::UnknownParent`] if the parent does not
    /// exist, or [`LedgerError::ParentNotMainGroup`] if it exists but is
    /// not a main group.
    pub fn insert(&mut self, group: CostGroup) -> Result<(), LedgerError> {
        if self.entries.contains_key(&group.code) {
            return Err(LedgerError::DuplicateCode {
                code: group.code.to_string(),
            });
        }
        if let Some(parent) = &group.parent {
            let Some(parent_group) = self.entries.get(parent) else {
                return Err(LedgerError::UnknownParent {
                    code: group.code.to_string(),
                    parent: parent.to_string(),
                });
            };
            if !parent_group.code.is_main_group() {
                return Err(LedgerError::ParentNotMainGroup {
                    code: group.code.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        self.entries.insert(group.code.clone(), group);
        Ok(())
    }

    /// Replaces the amount of an existing cost group, sanitized.
    ///
    /// Returns `false` if the code is not present.
    pub fn set_amount(&mut self, code: &CostGroupCode, amount: f64) -> bool {
        match self.entries.get_mut(code) {
            Some(group) => {
                group.amount = sanitize_amount(amount);
                true
            },
            None => false,
        }
    }

    /// Removes a cost group, returning it if present.
    pub fn remove(&mut self, code: &CostGroupCode) -> Option<CostGroup> {
        self.entries.remove(code)
    }

    /// Looks up a cost group by code.
    #[must_use]
    pub fn get(&self, code: &CostGroupCode) -> Option<&CostGroup> {
        self.entries.get(code)
    }

    /// Returns `true` if the code is present.
    #[must_use]
    pub fn contains(&self, code: &CostGroupCode) -> bool {
        self.entries.contains_key(code)
    }

    /// Returns the amount for a code, or `0.0` when absent.
    #[must_use]
    pub fn amount_of(&self, code: &CostGroupCode) -> f64 {
        self.entries.get(code).map_or(0.0, |g| g.amount)
    }

    /// Iterates cost groups in code order.
    pub fn iter(&self) -> impl Iterator<Item = &CostGroup> {
        self.entries.values()
    }

    /// Returns the number of cost groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ledger holds no cost groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sums all cost group amounts.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.values().map(|g| g.amount).sum()
    }
}

impl<'a> IntoIterator for &'a CostLedger {
    type Item = &'a CostGroup;
    type IntoIter = std::collections::btree_map::Values<'a, CostGroupCode, CostGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// A trade-level construction cost line (Gewerk).
///
/// Carries both the project's own estimate and the awarded (Vergabe)
/// amount; reconciliation uses whichever is authoritative via
/// [`TradeCost::effective_amount`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCost {
    /// Trade number, e.g. `"03"` for shell construction.
    pub number: String,
    /// Trade name, the identity reconciliation matches on.
    pub name: String,
    /// The project's own cost estimate in EUR.
    pub estimate: f64,
    /// The awarded/tendered amount in EUR, `0.0` until awarded.
    pub awarded: f64,
    /// Extra costs accrued after award (Mehrkosten).
    pub extra_costs: f64,
    /// Deductions agreed after award (Abzüge).
    pub deductions: f64,
    /// Optional free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TradeCost {
    /// Creates a trade cost line with sanitized amounts.
    #[must_use]
    pub fn new(
        number: impl Into<String>,
        name: impl Into<String>,
        estimate: f64,
        awarded: f64,
    ) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            estimate: sanitize_amount(estimate),
            awarded: sanitize_amount(awarded),
            extra_costs: 0.0,
            deductions: 0.0,
            notes: None,
        }
    }

    /// The amount reconciliation treats as this trade's figure: the awarded
    /// amount once set, else the trade's own estimate.
    #[must_use]
    pub fn effective_amount(&self) -> f64 {
        if self.awarded > 0.0 {
            self.awarded
        } else {
            self.estimate
        }
    }

    /// The projected final cost including post-award changes.
    #[must_use]
    pub fn projected_total(&self) -> f64 {
        self.effective_amount() + self.extra_costs - self.deductions
    }
}

/// A signed contract, associated with a trade by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Trade name this contract belongs to. May be blank; blank
    /// associations reconcile into the unassigned bucket instead of being
    /// dropped.
    pub trade: String,
    /// Contractor name.
    pub contractor: String,
    /// Contract sum in EUR.
    pub sum: f64,
    /// Optional free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Contract {
    /// Creates a contract with a sanitized sum.
    #[must_use]
    pub fn new(trade: impl Into<String>, contractor: impl Into<String>, sum: f64) -> Self {
        Self {
            trade: trade.into(),
            contractor: contractor.into(),
            sum: sanitize_amount(sum),
            notes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_derives_from_hundreds_digit() {
        assert_eq!(
            CostGroupCode::new("100").category(),
            CostGroupCategory::Land
        );
        assert_eq!(
            CostGroupCode::new("310").category(),
            CostGroupCategory::Structure
        );
        assert_eq!(
            CostGroupCode::new("450").category(),
            CostGroupCategory::BuildingServices
        );
        assert_eq!(
            CostGroupCode::new("800").category(),
            CostGroupCategory::Financing
        );
        assert_eq!(
            CostGroupCode::new("950").category(),
            CostGroupCategory::Other
        );
        assert_eq!(
            CostGroupCode::new("300+400").category(),
            CostGroupCategory::Other
        );
    }

    #[test]
    fn construction_trades_are_structure_and_services() {
        assert!(CostGroupCategory::Structure.is_construction_trade());
        assert!(CostGroupCategory::BuildingServices.is_construction_trade());
        assert!(!CostGroupCategory::Land.is_construction_trade());
        assert!(!CostGroupCategory::Financing.is_construction_trade());
    }

    #[test]
    fn sanitize_coerces_invalid_amounts_to_zero() {
        assert_eq!(sanitize_amount(f64::NAN), 0.0);
        assert_eq!(sanitize_amount(f64::INFINITY), 0.0);
        assert_eq!(sanitize_amount(-500.0), 0.0);
        assert_eq!(sanitize_amount(500.0), 500.0);
    }

    #[test]
    fn insert_rejects_duplicate_codes() {
        let mut ledger = CostLedger::new();
        ledger
            .insert(CostGroup::new("300", "Bauwerk - Baukonstruktion", 1_000.0))
            .expect("first insert should succeed");
        let error = ledger
            .insert(CostGroup::new("300", "Duplicate", 2_000.0))
            .expect_err("duplicate code should be rejected");
        assert_eq!(
            error,
            LedgerError::DuplicateCode {
                code: "300".to_string()
            }
        );
    }

    #[test]
    fn insert_rejects_unknown_parent() {
        let mut ledger = CostLedger::new();
        let error = ledger
            .insert(CostGroup::new("310", "Baugrube", 50_000.0).with_parent("300"))
            .expect_err("missing parent should be rejected");
        assert_eq!(
            error,
            LedgerError::UnknownParent {
                code: "310".to_string(),
                parent: "300".to_string()
            }
        );
    }

    #[test]
    fn insert_rejects_non_main_group_parent() {
        let mut ledger = CostLedger::new();
        ledger
            .insert(CostGroup::new("310", "Baugrube", 50_000.0))
            .expect("insert should succeed");
        let error = ledger
            .insert(CostGroup::new("311", "Herstellung", 10_000.0).with_parent("310"))
            .expect_err("subgroup parent should be rejected");
        assert_eq!(
            error,
            LedgerError::ParentNotMainGroup {
                code: "311".to_string(),
                parent: "310".to_string()
            }
        );
    }

    #[test]
    fn subgroup_with_existing_main_group_parent_is_accepted() {
        let mut ledger = CostLedger::new();
        ledger
            .insert(CostGroup::new("300", "Bauwerk - Baukonstruktion", 0.0))
            .expect("main group insert should succeed");
        ledger
            .insert(CostGroup::new("310", "Baugrube", 50_000.0).with_parent("300"))
            .expect("subgroup insert should succeed");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn amount_of_returns_zero_for_absent_codes() {
        let ledger = CostLedger::new();
        assert_eq!(ledger.amount_of(&CostGroupCode::new("300")), 0.0);
    }

    #[test]
    fn cost_group_amount_is_sanitized_on_construction() {
        let group = CostGroup::new("300", "Bauwerk", f64::NAN);
        assert_eq!(group.amount, 0.0);
    }

    #[test]
    fn set_amount_sanitizes_and_reports_presence() {
        let mut ledger = CostLedger::new();
        ledger
            .insert(CostGroup::new("300", "Bauwerk", 1_000.0))
            .expect("insert should succeed");
        assert!(ledger.set_amount(&CostGroupCode::new("300"), -1.0));
        assert_eq!(ledger.amount_of(&CostGroupCode::new("300")), 0.0);
        assert!(!ledger.set_amount(&CostGroupCode::new("999"), 5.0));
    }

    #[test]
    fn effective_amount_prefers_awarded_over_estimate() {
        let awarded = TradeCost::new("03", "Rohbau", 800_000.0, 760_000.0);
        assert_eq!(awarded.effective_amount(), 760_000.0);

        let pending = TradeCost::new("03", "Rohbau", 800_000.0, 0.0);
        assert_eq!(pending.effective_amount(), 800_000.0);
    }

    #[test]
    fn projected_total_folds_extras_and_deductions() {
        let mut trade = TradeCost::new("07", "Dach", 120_000.0, 115_000.0);
        trade.extra_costs = 4_000.0;
        trade.deductions = 1_500.0;
        assert_eq!(trade.projected_total(), 117_500.0);
    }
}
