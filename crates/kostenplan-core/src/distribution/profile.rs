//! Distribution profiles: how a cost group's amount spreads over time.
//!
//! Every cost group resolves to exactly one profile. The [`ProfileTable`]
//! carries the curated DIN 276 defaults; codes without a curated entry get
//! a profile synthesized from their [`CostGroupCategory`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::{CostGroupCategory, CostGroupCode, CostLedger};

/// Which project phase a cost group's spending falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Spent entirely during the planning window.
    Planning,
    /// Spent entirely during the construction window.
    Construction,
    /// Fixed 30% planning / 70% construction split.
    Both,
    /// Fixed 70% planning / 30% construction split; the construction
    /// portion always uses the early curve (architects and engineers).
    PlanningHeavy,
}

/// The allocation curve applied within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    /// Linear taper, heaviest in the first quarter. Only meaningful in the
    /// planning window; in the construction window it behaves as linear.
    FrontLoaded,
    /// Equal amount per quarter.
    Linear,
    /// 60% over the first half of the window, 40% over the second.
    Early,
    /// 40% over the first half of the window, 60% over the second.
    Late,
    /// 80% over the trailing quarter of the window (by count, minimum one
    /// bucket), 20% evenly over the rest.
    End,
}

/// A resolved distribution profile for one cost group, including the
/// display metadata the plan carries through (group flag, parent, combined
/// components). The display flags never affect the arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionProfile {
    /// The cost group code this profile applies to.
    pub code: CostGroupCode,
    /// Display name, curated or taken from the ledger entry.
    pub name: String,
    /// Phase split.
    pub phase: Phase,
    /// Allocation curve within the construction window.
    pub shape: Shape,
    /// Main-group flag for display grouping.
    pub is_group: bool,
    /// Parent main-group code for display grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CostGroupCode>,
    /// For combined entries, the component codes whose amounts sum into
    /// this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<Vec<CostGroupCode>>,
}

impl DistributionProfile {
    fn curated(
        code: &str,
        name: &str,
        phase: Phase,
        shape: Shape,
        is_group: bool,
        parent: Option<&str>,
    ) -> Self {
        Self {
            code: CostGroupCode::new(code),
            name: name.to_string(),
            phase,
            shape,
            is_group,
            parent: parent.map(CostGroupCode::new),
            combined: None,
        }
    }
}

/// Lookup table mapping cost group codes to distribution profiles.
///
/// Resolution order: exact curated entry, else a profile synthesized from
/// the code's category. Combined entries (e.g. "300+400") are kept
/// separately and only activate when every component is present in the
/// ledger.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    entries: BTreeMap<CostGroupCode, DistributionProfile>,
    combined: Vec<DistributionProfile>,
}

impl ProfileTable {
    /// The curated DIN 276 profile table.
    #[must_use]
    pub fn din276() -> Self {
        use Phase::{Both, Construction, Planning, PlanningHeavy};
        use Shape::{Early, End, FrontLoaded, Late, Linear};

        let curated = [
            // KG 100 - Grundstück
            DistributionProfile::curated("100", "Grundstück", Planning, FrontLoaded, true, None),
            DistributionProfile::curated("110", "Grundstückswert", Planning, FrontLoaded, false, Some("100")),
            DistributionProfile::curated("111", "Grundstücksnebenkosten", Planning, FrontLoaded, false, Some("100")),
            DistributionProfile::curated("112", "Makler", Planning, FrontLoaded, false, Some("100")),
            DistributionProfile::curated("113", "Freimachen Abriss Altlasten", Construction, Early, false, Some("100")),
            // KG 200 - Herrichten und Erschließen
            DistributionProfile::curated("200", "Herrichten und Erschließen", Construction, Early, false, None),
            DistributionProfile::curated("210", "Fernwärme - Hausanschluss", Construction, Early, false, Some("200")),
            DistributionProfile::curated("211", "TW/AW-Hausanschluss inkl. Bauwasser", Construction, Early, false, Some("200")),
            DistributionProfile::curated("212", "Strom-Hausanschluss", Construction, Early, false, Some("200")),
            DistributionProfile::curated("213", "Telefon/TV-Anschluss", Construction, Early, false, Some("200")),
            // KG 250 - Maßnahmen LVB
            DistributionProfile::curated("250", "Maßnahmen LVB", Planning, FrontLoaded, false, None),
            // KG 300 / 400 - Bauwerk
            DistributionProfile::curated("300", "Bauwerk - Baukonstruktion", Construction, Linear, true, None),
            DistributionProfile::curated("400", "Bauwerk - Technische Anlagen", Construction, Linear, true, None),
            // KG 500 - Außenanlagen
            DistributionProfile::curated("500", "Außenanlagen", Construction, Late, false, None),
            DistributionProfile::curated("510", "Außenanlagen", Construction, Late, false, Some("500")),
            // KG 600 - Ausstattung
            DistributionProfile::curated("600", "Ausstattung und Kunstwerke", Construction, End, true, None),
            DistributionProfile::curated("610", "Ausstattung und Kunstwerke", Construction, End, false, Some("600")),
            // KG 700 - Baunebenkosten
            DistributionProfile::curated("700", "Baunebenkosten", Both, Linear, true, None),
            DistributionProfile::curated("710", "Bauherrenaufgaben Regiekosten", Both, Linear, false, Some("700")),
            DistributionProfile::curated("711", "Bauherrenaufgaben Regiekosten", Both, Linear, false, Some("700")),
            DistributionProfile::curated("720", "Architekten und Ingenieure", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("721", "Vorplanung", Planning, FrontLoaded, false, Some("700")),
            DistributionProfile::curated("722", "Architekten", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("723", "Statik", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("724", "HLS Planung", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("725", "ELT Planung", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("726", "Bauphysik", PlanningHeavy, Linear, false, Some("700")),
            DistributionProfile::curated("727", "Ausschreibung", Planning, FrontLoaded, false, Some("700")),
            DistributionProfile::curated("740", "Gutachten und Beratung", Both, Early, false, Some("700")),
            DistributionProfile::curated("750", "Vertrieb/Finanzierung", Both, Linear, false, Some("700")),
            DistributionProfile::curated("760", "Allgemeine Baunebenkosten", Both, Linear, false, Some("700")),
            // KG 800 - Finanzierung
            DistributionProfile::curated("800", "Finanzierung", Both, Linear, false, None),
        ];

        let combined = vec![DistributionProfile {
            code: CostGroupCode::new("300+400"),
            name: "Bauwerk - Baukonstruktion + Technische Anlagen".to_string(),
            phase: Construction,
            shape: Linear,
            is_group: true,
            parent: None,
            combined: Some(vec![CostGroupCode::new("300"), CostGroupCode::new("400")]),
        }];

        Self {
            entries: curated
                .into_iter()
                .map(|profile| (profile.code.clone(), profile))
                .collect(),
            combined,
        }
    }

    /// An empty table; every code synthesizes from its category.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            combined: Vec::new(),
        }
    }

    /// Resolves the profile for a code: curated entry if present, else one
    /// synthesized from the code's category. `ledger_name` supplies the
    /// display name for synthesized profiles.
    #[must_use]
    pub fn resolve(&self, code: &CostGroupCode, ledger_name: &str) -> DistributionProfile {
        self.entries
            .get(code)
            .cloned()
            .unwrap_or_else(|| Self::synthesize(code, ledger_name))
    }

    /// Combined entries whose components can be present in a ledger.
    #[must_use]
    pub fn combined_profiles(&self) -> &[DistributionProfile] {
        &self.combined
    }

    /// Returns the combined entries that are fully backed by the ledger
    /// (every component code present).
    #[must_use]
    pub fn active_combined(&self, ledger: &CostLedger) -> Vec<&DistributionProfile> {
        self.combined
            .iter()
            .filter(|profile| {
                profile
                    .combined
                    .as_deref()
                    .is_some_and(|codes| codes.iter().all(|code| ledger.contains(code)))
            })
            .collect()
    }

    /// Synthesizes a default profile from the code's category.
    fn synthesize(code: &CostGroupCode, ledger_name: &str) -> DistributionProfile {
        let category = code.category();
        let (phase, shape) = match category {
            CostGroupCategory::Land => (Phase::Planning, Shape::FrontLoaded),
            CostGroupCategory::SitePreparation => (Phase::Construction, Shape::Early),
            CostGroupCategory::Structure | CostGroupCategory::BuildingServices => {
                (Phase::Construction, Shape::Linear)
            },
            CostGroupCategory::OutdoorWorks => (Phase::Construction, Shape::Late),
            CostGroupCategory::Furnishing => (Phase::Construction, Shape::End),
            CostGroupCategory::AncillaryCosts | CostGroupCategory::Financing => {
                (Phase::Both, Shape::Linear)
            },
            CostGroupCategory::Other => (Phase::Construction, Shape::Linear),
        };

        let numeric = code.numeric();
        let main_group = numeric.map(|n| n / 100 * 100);
        let parent = match (numeric, main_group) {
            // Subgroups point at their main group; financing carries none.
            (Some(n), Some(m)) if n != m && (100..=700).contains(&m) => {
                Some(CostGroupCode::new(m.to_string()))
            },
            _ => None,
        };

        let name = if ledger_name.is_empty() {
            format!("Kostengruppe {code}")
        } else {
            ledger_name.to_string()
        };

        DistributionProfile {
            code: code.clone(),
            name,
            phase,
            shape,
            is_group: numeric.is_some_and(|n| n % 100 == 0 && n < 800),
            parent,
            combined: None,
        }
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::din276()
    }
}
