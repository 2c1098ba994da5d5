//! The "LABELS" Engine - name billboards for nearby particles.
//!
//! Labels only exist while their particle is eligible: visible, inside a
//! near/far distance band and inside the camera's field of view. The manager
//! keeps the set of live labels and reconciles it against the eligible set on
//! a decimated cadence, so label churn costs are bounded.
//!
//! Both sides of the reconciliation use [`LabelKey::for_particle`], which
//! keeps existence and eligibility checks symmetric.

use crate::index::ParticleIndex;
use crate::particle::{ImportanceLevel, Particle};
use orrery_env::{CameraState, LabelFactory, LabelHandle, LabelKey, LabelSpec, LabelStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the VisibilityLabelManager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Reconcile every N frames (default: 20)
    pub cadence: u64,

    /// Labels closer than this are degenerate billboards (default: 2)
    pub near: f64,

    /// Labels further than this are not worth drawing (default: 12)
    pub far: f64,

    /// Levels up to this one get the large bracketed style
    pub bracket_max_level: u8,

    /// Levels up to this one (below the bracketed tier) get the medium style
    pub medium_max_level: u8,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            cadence: 20,
            near: 2.0,
            far: 12.0,
            bracket_max_level: 2,
            medium_max_level: 5,
        }
    }
}

/// Texture style for a particle's importance.
pub fn label_style_for_level(level: ImportanceLevel, config: &LabelConfig) -> LabelStyle {
    if level.get() <= config.bracket_max_level {
        LabelStyle {
            texture_width: 1024,
            texture_height: 256,
            font_px: 96,
            bracketed: true,
            world_height: 1.2,
        }
    } else if level.get() <= config.medium_max_level {
        LabelStyle {
            texture_width: 512,
            texture_height: 128,
            font_px: 56,
            bracketed: false,
            world_height: 0.9,
        }
    } else {
        LabelStyle {
            texture_width: 256,
            texture_height: 64,
            font_px: 32,
            bracketed: false,
            world_height: 0.6,
        }
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub destroyed: usize,

    /// Creations the engine rejected; retried next tick
    pub failed: usize,

    /// Live labels afterwards
    pub live: usize,
}

impl ReconcileReport {
    /// True if nothing was created or destroyed.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.destroyed == 0
    }
}

#[derive(Debug, Clone)]
struct LiveLabel {
    handle: LabelHandle,
    particle_id: String,
}

/// Keeps the live label set in sync with the eligible particles.
#[derive(Debug, Default)]
pub struct VisibilityLabelManager {
    config: LabelConfig,
    live: BTreeMap<LabelKey, LiveLabel>,
}

impl VisibilityLabelManager {
    pub fn new(config: LabelConfig) -> Self {
        Self {
            config,
            live: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    /// Eligibility predicate for one particle.
    pub fn is_eligible(&self, particle: &Particle, camera: &CameraState) -> bool {
        if !particle.is_visible() {
            return false;
        }
        let position = particle.current_position();
        let distance = camera.distance_to(position);
        if distance <= self.config.near || distance >= self.config.far {
            return false;
        }
        matches!(camera.angle_to(position), Some(angle) if angle < camera.fov)
    }

    /// Particles that should carry a label right now.
    pub fn eligible<'a>(&self, index: &'a ParticleIndex, camera: &CameraState) -> Vec<&'a Particle> {
        index
            .visible()
            .filter(|p| self.is_eligible(p, camera))
            .collect()
    }

    /// Reconciles when `frame` falls on the cadence.
    pub fn tick<F: LabelFactory>(
        &mut self,
        frame: u64,
        index: &ParticleIndex,
        camera: &CameraState,
        factory: &mut F,
    ) -> Option<ReconcileReport> {
        if frame % self.config.cadence.max(1) != 0 {
            return None;
        }
        Some(self.reconcile(index, camera, factory))
    }

    /// Destroys stale labels and creates missing ones.
    pub fn reconcile<F: LabelFactory>(
        &mut self,
        index: &ParticleIndex,
        camera: &CameraState,
        factory: &mut F,
    ) -> ReconcileReport {
        let eligible: BTreeMap<LabelKey, &Particle> = self
            .eligible(index, camera)
            .into_iter()
            .map(|p| (LabelKey::for_particle(p.id()), p))
            .collect();

        let mut report = ReconcileReport::default();

        let stale: Vec<LabelKey> = self
            .live
            .keys()
            .filter(|key| !eligible.contains_key(key))
            .copied()
            .collect();
        for key in stale {
            if let Some(label) = self.live.remove(&key) {
                teardown(factory, label.handle);
                report.destroyed += 1;
            }
        }

        for (key, particle) in eligible {
            if self.live.contains_key(&key) {
                continue;
            }
            let spec = LabelSpec {
                key,
                text: particle.id().to_string(),
                position: *particle.current_position(),
                color: particle.color(),
                style: label_style_for_level(particle.importance(), &self.config),
            };
            match factory.create_label(&spec) {
                Ok(handle) => {
                    self.live.insert(
                        key,
                        LiveLabel {
                            handle,
                            particle_id: particle.id().to_string(),
                        },
                    );
                    report.created += 1;
                }
                Err(e) => {
                    warn!("Label for {} not created: {}", particle.id(), e);
                    report.failed += 1;
                }
            }
        }

        report.live = self.live.len();
        if !report.is_noop() {
            debug!(
                "Labels: +{} -{} ({} live, {} failed)",
                report.created, report.destroyed, report.live, report.failed
            );
        }
        report
    }

    /// Tears down every live label.
    pub fn clear<F: LabelFactory>(&mut self, factory: &mut F) -> usize {
        let count = self.live.len();
        for (_, label) in std::mem::take(&mut self.live) {
            teardown(factory, label.handle);
        }
        count
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn has_label(&self, particle_id: &str) -> bool {
        self.live.contains_key(&LabelKey::for_particle(particle_id))
    }

    /// Particle ids with a live label, in key order.
    pub fn labeled_ids(&self) -> impl Iterator<Item = &str> {
        self.live.values().map(|l| l.particle_id.as_str())
    }
}

/// Texture, then material, then mesh.
fn teardown<F: LabelFactory>(factory: &mut F, handle: LabelHandle) {
    factory.release_texture(handle);
    factory.release_material(handle);
    factory.remove_mesh(handle);
}
