//! Interaction scenarios for deterministic viewer testing.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// SIM-001: Stacked and clustered points pushed apart
    Declump,

    /// SIM-002: Camera sweep through the field, label churn and teardown
    LabelSweep,

    /// SIM-003: Navigation interrupted mid-flight by a new selection
    FlyCancel,

    /// SIM-004: Guided tour over the most important particles
    GuidedTour,

    /// SIM-005: Category hidden and shown again
    CategoryFilter,

    /// SIM-006: Controller aim swept across the field
    ControllerSweep,

    /// SIM-007: Dataset replaced while labels and a flight are live
    Reload,

    // ═══════════════════════════════════════════════════
    // STRESS SCENARIOS
    // ═══════════════════════════════════════════════════
    /// SIM-008: Large dataset relaxed across frames
    LargeLoad,

    /// SIM-009: Label factory rejecting every creation
    LabelFaults,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        let mut all = Self::standard();
        all.extend(Self::stress());
        all
    }

    /// Returns standard scenarios.
    pub fn standard() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Declump,
            ScenarioId::LabelSweep,
            ScenarioId::FlyCancel,
            ScenarioId::GuidedTour,
            ScenarioId::CategoryFilter,
            ScenarioId::ControllerSweep,
            ScenarioId::Reload,
        ]
    }

    /// Returns stress scenarios only.
    pub fn stress() -> Vec<ScenarioId> {
        vec![ScenarioId::LargeLoad, ScenarioId::LabelFaults]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Declump => "declump",
            ScenarioId::LabelSweep => "label_sweep",
            ScenarioId::FlyCancel => "fly_cancel",
            ScenarioId::GuidedTour => "guided_tour",
            ScenarioId::CategoryFilter => "category_filter",
            ScenarioId::ControllerSweep => "controller_sweep",
            ScenarioId::Reload => "reload",
            ScenarioId::LargeLoad => "large_load",
            ScenarioId::LabelFaults => "label_faults",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Declump => "Coincident stack plus clusters, verify minimum spacing after relaxation",
            ScenarioId::LabelSweep => "Camera flies through the field, verify labels track the near band with no leaks",
            ScenarioId::FlyCancel => "Second selection mid-flight, verify exactly one arrival",
            ScenarioId::GuidedTour => "Tour over the top particles, verify stops are visited in order",
            ScenarioId::CategoryFilter => "Hide a category, verify it is never labeled or targeted",
            ScenarioId::ControllerSweep => "Controller aim sweeps the view, verify targets stay visible and in range",
            ScenarioId::Reload => "Replace the dataset mid-flight, verify labels, blinks and flights are released",
            ScenarioId::LargeLoad => "Thousands of particles relaxed across frames while the viewer keeps rendering",
            ScenarioId::LabelFaults => "Every label creation fails, verify the viewer keeps running and retries",
        }
    }

    /// Returns true if this is a stress scenario.
    pub fn is_stress(&self) -> bool {
        matches!(self, ScenarioId::LargeLoad | ScenarioId::LabelFaults)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "declump" | "sim-001" => Ok(ScenarioId::Declump),
            "label_sweep" | "labelsweep" | "sim-002" => Ok(ScenarioId::LabelSweep),
            "fly_cancel" | "flycancel" | "sim-003" => Ok(ScenarioId::FlyCancel),
            "guided_tour" | "guidedtour" | "tour" | "sim-004" => Ok(ScenarioId::GuidedTour),
            "category_filter" | "categoryfilter" | "sim-005" => Ok(ScenarioId::CategoryFilter),
            "controller_sweep" | "controllersweep" | "sim-006" => Ok(ScenarioId::ControllerSweep),
            "reload" | "sim-007" => Ok(ScenarioId::Reload),
            "large_load" | "largeload" | "sim-008" => Ok(ScenarioId::LargeLoad),
            "label_faults" | "labelfaults" | "sim-009" => Ok(ScenarioId::LabelFaults),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
