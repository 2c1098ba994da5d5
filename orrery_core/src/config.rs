//! Viewer configuration.

use crate::blink::BlinkConfig;
use crate::input::InputConfig;
use crate::labels::LabelConfig;
use crate::navigation::NavigationConfig;
use crate::orbit::MotionConfig;
use crate::palette::PaletteConfig;
use crate::picking::PickingConfig;
use crate::relax::RelaxConfig;
use crate::tour::TourConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a Viewer.
///
/// Every section has defaults, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Viewer's logical name (for logging)
    pub name: String,

    /// Datasets up to this size are relaxed synchronously at load
    pub sync_relax_limit: usize,

    /// Pair comparisons per frame while relaxing a large dataset
    pub relax_pairs_per_frame: usize,

    /// Rows in the proximity panel
    pub proximity_limit: usize,

    pub relax: RelaxConfig,
    pub motion: MotionConfig,
    pub labels: LabelConfig,
    pub picking: PickingConfig,
    pub navigation: NavigationConfig,
    pub blink: BlinkConfig,
    pub tour: TourConfig,
    pub palette: PaletteConfig,
    pub input: InputConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            name: "orrery-viewer".to_string(),
            sync_relax_limit: 600,
            relax_pairs_per_frame: 250_000,
            proximity_limit: 8,
            relax: RelaxConfig::default(),
            motion: MotionConfig::default(),
            labels: LabelConfig::default(),
            picking: PickingConfig::default(),
            navigation: NavigationConfig::default(),
            blink: BlinkConfig::default(),
            tour: TourConfig::default(),
            palette: PaletteConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Parses a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_relax(mut self, relax: RelaxConfig) -> Self {
        self.relax = relax;
        self
    }

    pub fn with_sync_relax_limit(mut self, limit: usize) -> Self {
        self.sync_relax_limit = limit;
        self
    }
}
