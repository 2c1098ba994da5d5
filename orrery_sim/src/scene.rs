//! Headless scene: a label factory that tracks GPU-side resources.

use orrery_env::{EnvError, LabelFactory, LabelHandle, LabelSpec};
use std::collections::BTreeMap;
use tracing::warn;

/// Resources held by one simulated label.
#[derive(Debug, Clone)]
pub struct SimLabel {
    pub spec: LabelSpec,
    pub texture: bool,
    pub material: bool,
}

/// Counters collected by the scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub created: u64,
    pub removed: u64,

    /// Meshes removed while texture or material were still held
    pub leaked_resources: u64,

    /// Release calls for unknown handles
    pub unknown_handles: u64,
}

/// Label factory for the harness.
#[derive(Debug, Default)]
pub struct SimScene {
    labels: BTreeMap<LabelHandle, SimLabel>,
    next_handle: u64,
    stats: SceneStats,

    /// Fail every creation while set (fault injection)
    pub fail_creations: bool,
}

impl SimScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    /// Texts of live labels, as drawn.
    pub fn texts(&self) -> Vec<String> {
        self.labels.values().map(|l| l.spec.display_text()).collect()
    }
}

impl LabelFactory for SimScene {
    fn create_label(&mut self, spec: &LabelSpec) -> Result<LabelHandle, EnvError> {
        if self.fail_creations {
            return Err(EnvError::label(format!("no texture memory for {}", spec.key)));
        }
        self.next_handle += 1;
        let handle = LabelHandle(self.next_handle);
        self.labels.insert(
            handle,
            SimLabel {
                spec: spec.clone(),
                texture: true,
                material: true,
            },
        );
        self.stats.created += 1;
        Ok(handle)
    }

    fn release_texture(&mut self, label: LabelHandle) {
        match self.labels.get_mut(&label) {
            Some(l) => l.texture = false,
            None => self.stats.unknown_handles += 1,
        }
    }

    fn release_material(&mut self, label: LabelHandle) {
        match self.labels.get_mut(&label) {
            Some(l) => l.material = false,
            None => self.stats.unknown_handles += 1,
        }
    }

    fn remove_mesh(&mut self, label: LabelHandle) {
        match self.labels.remove(&label) {
            Some(l) => {
                if l.texture || l.material {
                    warn!("Label {} removed with resources still held", l.spec.key);
                    self.stats.leaked_resources += 1;
                }
                self.stats.removed += 1;
            }
            None => self.stats.unknown_handles += 1,
        }
    }
}
