//! Deterministic construction-cost planning core.
//!
//! This crate is the computational heart of a building-project calculation
//! tool: it models DIN 276 cost-group ledgers and derives two things from
//! them, without any I/O, UI, or persistence of its own:
//!
//! - **Liquidity planning** ([`distribution`]): spreading each cost
//!   group's amount over synthetic three-month quarter buckets
//!   ([`schedule`]) using phase and curve heuristics
//! - **Cost reconciliation** ([`reconciliation`]): matching the planned
//!   calculation against trade-level awarded costs and signed contracts,
//!   classifying the variance per trade
//!
//! # Design principles
//!
//! 1. **Purity**: every entry point is a function over its explicit
//!    inputs; source ledgers are read-only and derived structures are
//!    returned fresh, so callers can diff old vs. new state
//! 2. **Determinism**: identical inputs yield identical outputs; map
//!    ordering is `BTreeMap`-stable throughout
//! 3. **Degrade, never throw**: invalid monetary or duration inputs are
//!    sanitized to safe defaults at the boundary, and allocation drift is
//!    surfaced as a warning annotation instead of an error
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use kostenplan_core::distribution::DistributionEngine;
//! use kostenplan_core::ledger::{CostGroup, CostLedger};
//! use kostenplan_core::schedule::{generate_quarters, TimeConfig};
//!
//! let mut ledger = CostLedger::new();
//! ledger
//!     .insert(CostGroup::new("300", "Bauwerk - Baukonstruktion", 1_200_000.0))
//!     .unwrap();
//!
//! let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
//! let config = TimeConfig::new(start, 24, 6);
//! let quarters = generate_quarters(config.start_date, config.total_duration_months);
//!
//! let engine = DistributionEngine::din276();
//! let plan = engine.distribute(&ledger, &quarters, config.planning_duration_months);
//! assert_eq!(plan.quarters.len(), 8);
//! ```

pub mod distribution;
pub mod ledger;
pub mod reconciliation;
pub mod schedule;

pub use distribution::{
    AllocationWarning, DistributionEngine, DistributionProfile, LiquidityPlan, OverrideMap, Phase,
    ProfileTable, QuarterAllocation, Shape, ALLOCATION_TOLERANCE,
};
pub use ledger::{
    Contract, CostGroup, CostGroupCategory, CostGroupCode, CostLedger, LedgerError, TradeCost,
};
pub use reconciliation::{
    reconcile, ReconciliationReport, ReconciliationRow, ReconciliationTotals, VarianceStatus,
};
pub use schedule::{generate_quarters, Quarter, TimeConfig};
