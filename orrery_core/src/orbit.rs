//! Orbital motion - the idle animation of particles near the camera.
//!
//! Positions are recomputed from scratch every frame as a pure function of
//! time and the (static) anchor relationships. There is no velocity state, so
//! nothing can drift.

use crate::index::ParticleIndex;
use crate::particle::ImportanceLevel;
use nalgebra::Vector3;
use orrery_env::CameraState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for the OrbitalMotionModel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Only particles closer than this to the camera move (default: 150)
    pub activity_radius: f64,

    /// Maximum distance to an anchor (default: 15)
    pub capture_radius: f64,

    /// Orbit radius as a fraction of the anchor distance
    pub radius_factor: f64,

    /// Upper bound on the orbit radius
    pub radius_cap: f64,

    /// Radius multiplier around a level-1 anchor
    pub primary_boost: f64,

    /// Angular speed of level-1 particles (radians per second)
    pub base_speed: f64,

    /// Extra speed per level below the top
    pub speed_step: f64,

    /// Phase added per particle index
    pub phase_offset: f64,

    /// Vertical squash of the orbit (0.5 gives a disk)
    pub y_flatten: f64,

    /// Amplitude of the floating motion for unanchored particles
    pub jitter_amplitude: f64,

    /// Frequency of the floating motion
    pub jitter_frequency: f64,

    /// Scale applied to every derived position
    pub world_scale: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            activity_radius: 150.0,
            capture_radius: 15.0,
            radius_factor: 0.6,
            radius_cap: 6.0,
            primary_boost: 1.5,
            base_speed: 0.15,
            speed_step: 0.25,
            phase_offset: 0.7,
            y_flatten: 0.5,
            jitter_amplitude: 0.3,
            jitter_frequency: 0.8,
            world_scale: 1.0,
        }
    }
}

/// An anchor found for a particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub index: usize,
    pub level: ImportanceLevel,
    pub distance: f64,
}

/// Per-frame motion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionStats {
    /// Particles within range and field of view
    pub active: usize,
    pub orbiting: usize,
    pub floating: usize,
}

/// Moves particles around more important neighbours.
#[derive(Debug, Default)]
pub struct OrbitalMotionModel {
    config: MotionConfig,

    /// Anchor per particle index, resolved on first activation
    anchors: HashMap<usize, Option<Anchor>>,
}

impl OrbitalMotionModel {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            anchors: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Drops cached anchors (dataset reload).
    pub fn reset(&mut self) {
        self.anchors.clear();
    }

    /// Updates `current_position` for every particle.
    ///
    /// Active particles orbit or float; the rest sit at their scaled rest
    /// position. Activity is judged in scaled (camera) space.
    pub fn update(&mut self, index: &mut ParticleIndex, camera: &CameraState, time: f64) -> MotionStats {
        let scale = self.config.world_scale;
        let mut stats = MotionStats::default();
        let mut updates = Vec::with_capacity(index.len());

        for (i, particle) in index.all().iter().enumerate() {
            let origin = particle.original_position();
            let rest = origin * scale;
            if !self.is_active(camera, &rest) {
                updates.push((i, rest));
                continue;
            }
            stats.active += 1;

            let anchor = *self
                .anchors
                .entry(i)
                .or_insert_with(|| find_anchor(index, i, self.config.capture_radius));

            let position = match anchor {
                Some(anchor) => {
                    stats.orbiting += 1;
                    let center = index.all()[anchor.index].original_position();
                    self.orbit_position(center, &anchor, particle.importance(), i, time)
                }
                None => {
                    stats.floating += 1;
                    self.float_position(origin, i, time)
                }
            };
            updates.push((i, position * scale));
        }

        for (i, position) in updates {
            index.set_current_position(i, position);
        }

        debug!(
            "Motion: {} active ({} orbiting, {} floating)",
            stats.active, stats.orbiting, stats.floating
        );
        stats
    }

    fn is_active(&self, camera: &CameraState, position: &Vector3<f64>) -> bool {
        if camera.distance_to(position) >= self.config.activity_radius {
            return false;
        }
        matches!(camera.angle_to(position), Some(angle) if angle < camera.fov)
    }

    /// Cached anchor for a particle, if it has been resolved.
    pub fn anchor_of(&self, index: usize) -> Option<Anchor> {
        self.anchors.get(&index).copied().flatten()
    }

    fn orbit_position(
        &self,
        center: &Vector3<f64>,
        anchor: &Anchor,
        level: ImportanceLevel,
        i: usize,
        time: f64,
    ) -> Vector3<f64> {
        let boost = if anchor.level.is_primary() {
            self.config.primary_boost
        } else {
            1.0
        };
        let radius = (anchor.distance * self.config.radius_factor * boost).min(self.config.radius_cap * boost);
        let speed = self.config.base_speed
            * (1.0 + (level.get() - ImportanceLevel::MIN) as f64 * self.config.speed_step);
        let angle = time * speed + i as f64 * self.config.phase_offset;

        center
            + Vector3::new(
                radius * angle.cos(),
                radius * angle.sin() * self.config.y_flatten,
                radius * angle.sin(),
            )
    }

    fn float_position(&self, origin: &Vector3<f64>, i: usize, time: f64) -> Vector3<f64> {
        let phase = i as f64 * self.config.phase_offset;
        let t = time * self.config.jitter_frequency;
        let a = self.config.jitter_amplitude;
        origin + Vector3::new(a * (t + phase).sin(), a * (t * 1.3 + phase).cos(), a * (t * 0.7 + phase).sin())
    }
}

/// Nearest more important particle within `capture_radius`.
///
/// Among candidates the lowest level wins, then the smallest distance.
fn find_anchor(index: &ParticleIndex, i: usize, capture_radius: f64) -> Option<Anchor> {
    let particle = index.get(i)?;
    let origin = particle.original_position();
    let level = particle.importance();

    index
        .all()
        .iter()
        .enumerate()
        .filter(|&(j, other)| j != i && other.importance() < level)
        .filter_map(|(j, other)| {
            let distance = (other.original_position() - origin).norm();
            (distance <= capture_radius).then_some(Anchor {
                index: j,
                level: other.importance(),
                distance,
            })
        })
        .min_by(|a, b| a.level.cmp(&b.level).then(a.distance.total_cmp(&b.distance)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{Palette, PaletteConfig};
    use crate::particle::ParticleRecord;
    use approx::assert_relative_eq;
    use orrery_env::Viewport;

    fn build(records: &[ParticleRecord]) -> ParticleIndex {
        ParticleIndex::from_records(records, &Palette::new(PaletteConfig::default(), 0)).unwrap()
    }

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::new(0.0, 0.0, 50.0),
            Vector3::zeros(),
            1.2,
            Viewport::default(),
        )
    }

    #[test]
    fn test_anchor_prefers_lowest_level_then_nearest() {
        let index = build(&[
            ParticleRecord::new("moon", "Concept", Vector3::zeros()).with_level(6),
            ParticleRecord::new("near_planet", "Concept", Vector3::new(2.0, 0.0, 0.0)).with_level(4),
            ParticleRecord::new("far_sun", "Concept", Vector3::new(10.0, 0.0, 0.0)).with_level(1),
            ParticleRecord::new("closer_sun", "Concept", Vector3::new(0.0, 8.0, 0.0)).with_level(1),
            ParticleRecord::new("too_far", "Concept", Vector3::new(40.0, 0.0, 0.0)).with_level(1),
        ]);

        let anchor = find_anchor(&index, 0, 15.0).unwrap();
        assert_eq!(index.all()[anchor.index].id(), "closer_sun");
        assert_relative_eq!(anchor.distance, 8.0);
    }

    #[test]
    fn test_equal_or_higher_level_is_not_an_anchor() {
        let index = build(&[
            ParticleRecord::new("a", "Concept", Vector3::zeros()).with_level(3),
            ParticleRecord::new("b", "Concept", Vector3::new(1.0, 0.0, 0.0)).with_level(3),
            ParticleRecord::new("c", "Concept", Vector3::new(2.0, 0.0, 0.0)).with_level(7),
        ]);
        assert!(find_anchor(&index, 0, 15.0).is_none());
    }

    #[test]
    fn test_orbit_is_deterministic_and_bounded() {
        let mut index = build(&[
            ParticleRecord::new("sun", "Concept", Vector3::zeros()).with_level(1),
            ParticleRecord::new("planet", "Concept", Vector3::new(4.0, 0.0, 0.0)).with_level(3),
        ]);
        let mut model = OrbitalMotionModel::new(MotionConfig::default());

        let stats = model.update(&mut index, &camera(), 12.5);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.orbiting, 1);
        assert_eq!(stats.floating, 1);

        let first = *index.by_name("planet").unwrap().current_position();
        // 4 * 0.6 * 1.5 = 3.6, below the boosted cap
        assert_relative_eq!((first.x.powi(2) + first.z.powi(2)).sqrt(), 3.6, epsilon = 1e-9);
        assert!(first.y.abs() <= 3.6 * 0.5 + 1e-9);

        model.update(&mut index, &camera(), 12.5);
        assert_eq!(*index.by_name("planet").unwrap().current_position(), first);
    }

    #[test]
    fn test_particles_out_of_view_do_not_move() {
        let mut index = build(&[
            ParticleRecord::new("behind", "Concept", Vector3::new(0.0, 0.0, 80.0)),
            ParticleRecord::new("distant", "Concept", Vector3::new(0.0, 0.0, -500.0)),
        ]);
        let mut model = OrbitalMotionModel::default();
        let stats = model.update(&mut index, &camera(), 3.0);

        assert_eq!(stats.active, 0);
        for particle in index.all() {
            assert_eq!(particle.current_position(), particle.original_position());
        }
    }

    #[test]
    fn test_world_scale_applies_to_every_particle() {
        let mut index = build(&[
            ParticleRecord::new("near", "Concept", Vector3::new(0.0, 0.0, -10.0)),
            ParticleRecord::new("far", "Concept", Vector3::new(0.0, 0.0, -200.0)),
            ParticleRecord::new("edge", "Concept", Vector3::new(0.0, 0.0, -100.0)),
        ]);
        let mut model = OrbitalMotionModel::new(MotionConfig {
            world_scale: 2.0,
            ..Default::default()
        });
        let camera = CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
            Viewport::default(),
        );

        let stats = model.update(&mut index, &camera, 1.0);

        // "edge" is 100 away unscaled but 200 away scaled, so it rests
        assert_eq!(stats.active, 1);
        let near = index.by_name("near").unwrap().current_position();
        assert!((near - Vector3::new(0.0, 0.0, -20.0)).norm() <= 2.0 * 0.3 * 3f64.sqrt() + 1e-9);
        assert_eq!(*index.by_name("far").unwrap().current_position(), Vector3::new(0.0, 0.0, -400.0));
        assert_eq!(*index.by_name("edge").unwrap().current_position(), Vector3::new(0.0, 0.0, -200.0));
    }

    #[test]
    fn test_reset_clears_anchor_cache() {
        let mut index = build(&[
            ParticleRecord::new("sun", "Concept", Vector3::zeros()).with_level(1),
            ParticleRecord::new("planet", "Concept", Vector3::new(4.0, 0.0, 0.0)).with_level(3),
        ]);
        let mut model = OrbitalMotionModel::default();
        model.update(&mut index, &camera(), 0.0);
        assert!(model.anchor_of(1).is_some());

        model.reset();
        assert!(model.anchor_of(1).is_none());
    }
}
