//! The "PICKING" Engine - what is the user pointing at?
//!
//! Two pick primitives:
//! - Ray picking with a tolerance cylinder that widens with range, since
//!   angular pointing error grows with distance
//! - Screen-centre picking for gaze selection
//!
//! Both consume a short-lived [`FrameCache`] of plausible candidates instead
//! of scanning the whole particle set, and both stop after a fixed number of
//! comparisons.

use crate::index::ParticleIndex;
use nalgebra::Vector3;
use orrery_env::{CameraState, Ray};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// TOLERANCE CURVE
// ============================================================================

/// One point of a [`ToleranceCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Distance along the ray
    pub distance: f64,

    /// Accepted perpendicular distance at that range
    pub tolerance: f64,
}

impl Breakpoint {
    pub const fn new(distance: f64, tolerance: f64) -> Self {
        Self { distance, tolerance }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("Tolerance curve needs at least one breakpoint")]
    Empty,

    #[error("Breakpoint {0} is not finite and non-negative")]
    Invalid(usize),

    #[error("Breakpoint {0} narrows the tolerance or goes back in distance")]
    NotMonotone(usize),
}

/// Piecewise-linear pick tolerance as a function of projection distance.
///
/// Never decreases: a candidate accepted at some range stays accepted at any
/// longer range with the same perpendicular distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Breakpoint>", into = "Vec<Breakpoint>")]
pub struct ToleranceCurve {
    points: Vec<Breakpoint>,
}

impl ToleranceCurve {
    pub fn new(points: Vec<Breakpoint>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for (i, p) in points.iter().enumerate() {
            let valid = |v: f64| v.is_finite() && v >= 0.0;
            if !valid(p.distance) || !valid(p.tolerance) {
                return Err(CurveError::Invalid(i));
            }
            if i > 0 {
                let prev = points[i - 1];
                if p.distance <= prev.distance || p.tolerance < prev.tolerance {
                    return Err(CurveError::NotMonotone(i));
                }
            }
        }
        Ok(Self { points })
    }

    /// The same tolerance at every range.
    pub fn constant(tolerance: f64) -> Self {
        Self {
            points: vec![Breakpoint::new(0.0, tolerance.max(0.0))],
        }
    }

    /// Tolerance at projection distance `t`, flat outside the breakpoints.
    pub fn at(&self, t: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        if t <= first.distance {
            return first.tolerance;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.distance {
                let s = (t - a.distance) / (b.distance - a.distance);
                return a.tolerance + (b.tolerance - a.tolerance) * s;
            }
        }
        self.points.last().map_or(0.0, |p| p.tolerance)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.points
    }
}

impl Default for ToleranceCurve {
    fn default() -> Self {
        Self {
            points: vec![
                Breakpoint::new(0.0, 0.4),
                Breakpoint::new(100.0, 2.0),
                Breakpoint::new(1_000.0, 12.0),
                Breakpoint::new(10_000.0, 90.0),
            ],
        }
    }
}

impl TryFrom<Vec<Breakpoint>> for ToleranceCurve {
    type Error = CurveError;

    fn try_from(points: Vec<Breakpoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<ToleranceCurve> for Vec<Breakpoint> {
    fn from(curve: ToleranceCurve) -> Self {
        curve.points
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the PickingEngine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickingConfig {
    /// Candidates at or behind this projection length are ignored
    pub epsilon: f64,

    /// Hard cap on candidates examined per pick
    pub max_comparisons: usize,

    pub tolerance: ToleranceCurve,

    /// Frame cache lifetime (default: 100 ms)
    pub cache_validity: Duration,

    /// Cache keeps particles within `fov * cache_fov_multiple` of forward
    pub cache_fov_multiple: f64,

    /// Cache drops particles closer than this to the camera
    pub cache_min_distance: f64,

    /// Continuous targeting runs every N frames (default: 3)
    pub target_every_n_frames: u64,

    /// Gaze picking radius around the screen centre, in pixels
    pub max_screen_radius: f64,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            max_comparisons: 5_000,
            tolerance: ToleranceCurve::default(),
            cache_validity: Duration::from_millis(100),
            cache_fov_multiple: 1.5,
            cache_min_distance: 0.5,
            target_every_n_frames: 3,
            max_screen_radius: 60.0,
        }
    }
}

// ============================================================================
// PICK PRIMITIVES
// ============================================================================

/// A pickable particle: index into the ParticleIndex plus its position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub position: Vector3<f64>,

    /// Distance to the camera when cached
    pub distance: f64,
}

/// Result of a ray pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub index: usize,
    pub projection: f64,
    pub perpendicular: f64,
}

/// Result of a screen-centre pick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenHit {
    pub index: usize,
    pub screen_distance: f64,
}

/// Nearest-along-ray candidate inside the tolerance cylinder.
///
/// Among accepted candidates the smallest projection length wins, not the
/// smallest perpendicular distance.
pub fn pick_by_ray(
    ray: &Ray,
    candidates: &[Candidate],
    tolerance: &ToleranceCurve,
    epsilon: f64,
    max_comparisons: usize,
) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;

    for candidate in candidates.iter().take(max_comparisons) {
        let relative = candidate.position - ray.origin;
        let projection = relative.dot(&ray.direction);
        if projection <= epsilon {
            continue;
        }
        let perpendicular = (relative - ray.direction * projection).norm();
        if perpendicular >= tolerance.at(projection) {
            continue;
        }
        if best.map_or(true, |b| projection < b.projection) {
            best = Some(PickHit {
                index: candidate.index,
                projection,
                perpendicular,
            });
        }
    }

    if candidates.len() > max_comparisons {
        debug!(
            "Ray pick capped at {} of {} candidates",
            max_comparisons,
            candidates.len()
        );
    }
    best
}

/// Candidate projected closest to the viewport centre.
pub fn pick_by_screen_center(
    camera: &CameraState,
    candidates: &[Candidate],
    max_screen_radius: f64,
    max_comparisons: usize,
) -> Option<ScreenHit> {
    let center = camera.viewport.center();

    candidates
        .iter()
        .take(max_comparisons)
        .filter_map(|c| {
            let screen = camera.project(&c.position)?;
            let screen_distance = screen.distance_to(center);
            (screen_distance <= max_screen_radius).then_some(ScreenHit {
                index: c.index,
                screen_distance,
            })
        })
        .min_by(|a, b| a.screen_distance.total_cmp(&b.screen_distance))
}

// ============================================================================
// FRAME CACHE
// ============================================================================

/// Short-lived list of plausible pick candidates, nearest first.
#[derive(Debug, Clone)]
pub struct FrameCache {
    validity: Duration,
    fov_multiple: f64,
    min_distance: f64,
    built_at: Option<Duration>,
    entries: Vec<Candidate>,
    rebuilds: u64,
}

impl FrameCache {
    pub fn new(config: &PickingConfig) -> Self {
        Self {
            validity: config.cache_validity,
            fov_multiple: config.cache_fov_multiple,
            min_distance: config.cache_min_distance,
            built_at: None,
            entries: Vec::new(),
            rebuilds: 0,
        }
    }

    /// Returns the cached candidates, rebuilding them if expired.
    pub fn candidates(&mut self, now: Duration, index: &ParticleIndex, camera: &CameraState) -> &[Candidate] {
        if self.is_stale(now) {
            self.rebuild(now, index, camera);
        }
        &self.entries
    }

    /// Forces a rebuild on next access (category toggle, reload).
    pub fn invalidate(&mut self) {
        self.built_at = None;
        self.entries.clear();
    }

    pub fn is_stale(&self, now: Duration) -> bool {
        match self.built_at {
            Some(built_at) => now.saturating_sub(built_at) >= self.validity,
            None => true,
        }
    }

    /// Number of rebuilds since creation.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn rebuild(&mut self, now: Duration, index: &ParticleIndex, camera: &CameraState) {
        let max_angle = camera.fov * self.fov_multiple;
        self.entries = index
            .visible_indices()
            .filter_map(|i| {
                let position = *index.get(i)?.current_position();
                let distance = camera.distance_to(&position);
                if distance <= self.min_distance {
                    return None;
                }
                let angle = camera.angle_to(&position)?;
                (angle < max_angle).then_some(Candidate {
                    index: i,
                    position,
                    distance,
                })
            })
            .collect();
        self.entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.built_at = Some(now);
        self.rebuilds += 1;
        debug!("Frame cache rebuilt with {} candidates", self.entries.len());
    }
}

// ============================================================================
// CONTINUOUS TARGETING
// ============================================================================

/// Highlight transition: restore `previous`, highlight `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetChange {
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// Tracks the particle under the aim ray at a throttled cadence.
#[derive(Debug, Clone)]
pub struct TargetTracker {
    every_n_frames: u64,
    current: Option<String>,
}

impl TargetTracker {
    pub fn new(every_n_frames: u64) -> Self {
        Self {
            every_n_frames: every_n_frames.max(1),
            current: None,
        }
    }

    pub fn should_sample(&self, frame: u64) -> bool {
        frame % self.every_n_frames == 0
    }

    /// Records the latest hit; returns a change if the target differs.
    pub fn observe(&mut self, hit: Option<&str>) -> Option<TargetChange> {
        if self.current.as_deref() == hit {
            return None;
        }
        let previous = self.current.take();
        self.current = hit.map(str::to_string);
        Some(TargetChange {
            previous,
            current: self.current.clone(),
        })
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Drops the target; returns the change needed to restore its color.
    pub fn reset(&mut self) -> Option<TargetChange> {
        self.observe(None)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Picking with a frame cache and continuous targeting.
#[derive(Debug, Clone)]
pub struct PickingEngine {
    config: PickingConfig,
    cache: FrameCache,
    tracker: TargetTracker,
}

impl PickingEngine {
    pub fn new(config: PickingConfig) -> Self {
        let cache = FrameCache::new(&config);
        let tracker = TargetTracker::new(config.target_every_n_frames);
        Self { config, cache, tracker }
    }

    pub fn config(&self) -> &PickingConfig {
        &self.config
    }

    /// Immediate ray pick (click, trigger).
    pub fn pick_ray(
        &mut self,
        now: Duration,
        index: &ParticleIndex,
        camera: &CameraState,
        ray: &Ray,
    ) -> Option<PickHit> {
        let candidates = self.cache.candidates(now, index, camera);
        pick_by_ray(
            ray,
            candidates,
            &self.config.tolerance,
            self.config.epsilon,
            self.config.max_comparisons,
        )
    }

    /// Immediate screen-centre pick (gaze).
    pub fn pick_center(&mut self, now: Duration, index: &ParticleIndex, camera: &CameraState) -> Option<ScreenHit> {
        let candidates = self.cache.candidates(now, index, camera);
        pick_by_screen_center(
            camera,
            candidates,
            self.config.max_screen_radius,
            self.config.max_comparisons,
        )
    }

    /// Throttled targeting along `aim`; `None` aim means nothing is pointed at.
    pub fn track(
        &mut self,
        frame: u64,
        now: Duration,
        index: &ParticleIndex,
        camera: &CameraState,
        aim: Option<&Ray>,
    ) -> Option<TargetChange> {
        if !self.tracker.should_sample(frame) {
            return None;
        }
        let hit = aim
            .and_then(|ray| self.pick_ray(now, index, camera, ray))
            .and_then(|hit| index.get(hit.index))
            .map(|p| p.id().to_string());
        self.tracker.observe(hit.as_deref())
    }

    pub fn current_target(&self) -> Option<&str> {
        self.tracker.current()
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Clears cache and target (reload); returns the pending highlight restore.
    pub fn reset(&mut self) -> Option<TargetChange> {
        self.cache.invalidate();
        self.tracker.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{Palette, PaletteConfig};
    use crate::particle::ParticleRecord;
    use approx::assert_relative_eq;
    use orrery_env::Viewport;
    use proptest::prelude::*;

    fn candidate(index: usize, x: f64, y: f64) -> Candidate {
        let position = Vector3::new(x, y, 0.0);
        Candidate {
            index,
            position,
            distance: position.norm(),
        }
    }

    fn x_ray() -> Ray {
        Ray::new(Vector3::zeros(), Vector3::x()).unwrap()
    }

    #[test]
    fn test_tight_tolerance_picks_only_close_candidate() {
        let candidates = [candidate(0, 50.0, 1.0), candidate(1, 51.0, 3.0)];
        let hit = pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::constant(2.0), 1e-3, 100).unwrap();
        assert_eq!(hit.index, 0);
        assert_relative_eq!(hit.perpendicular, 1.0);
    }

    #[test]
    fn test_wide_tolerance_picks_nearest_along_ray() {
        let candidates = [candidate(0, 50.0, 1.0), candidate(1, 51.0, 3.0)];
        let hit = pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::constant(4.0), 1e-3, 100).unwrap();
        assert_eq!(hit.index, 0);

        // Projection length wins over perpendicular distance
        let candidates = [candidate(0, 51.0, 1.0), candidate(1, 50.0, 3.0)];
        let hit = pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::constant(4.0), 1e-3, 100).unwrap();
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_candidates_behind_origin_are_ignored() {
        let candidates = [candidate(0, -5.0, 0.0), candidate(1, 0.0, 0.0)];
        assert!(pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::constant(10.0), 1e-3, 100).is_none());
    }

    #[test]
    fn test_comparison_cap_is_respected() {
        let candidates = [candidate(0, 50.0, 30.0), candidate(1, 60.0, 0.0)];
        assert!(pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::default(), 1e-3, 1).is_none());
        assert!(pick_by_ray(&x_ray(), &candidates, &ToleranceCurve::default(), 1e-3, 2).is_some());
    }

    #[test]
    fn test_default_curve_widens_with_range() {
        let curve = ToleranceCurve::default();
        assert_relative_eq!(curve.at(0.0), 0.4);
        assert_relative_eq!(curve.at(100.0), 2.0);
        assert_relative_eq!(curve.at(550.0), 7.0);
        assert_relative_eq!(curve.at(50_000.0), 90.0);
    }

    #[test]
    fn test_curve_rejects_narrowing_breakpoints() {
        let points = vec![Breakpoint::new(0.0, 2.0), Breakpoint::new(10.0, 1.0)];
        assert_eq!(ToleranceCurve::new(points), Err(CurveError::NotMonotone(1)));
        assert_eq!(ToleranceCurve::new(vec![]), Err(CurveError::Empty));

        let json = r#"[{"distance": 0.0, "tolerance": 3.0}, {"distance": 5.0, "tolerance": 1.0}]"#;
        assert!(serde_json::from_str::<ToleranceCurve>(json).is_err());
    }

    #[test]
    fn test_screen_center_pick() {
        let camera = CameraState::looking_at(
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::zeros(),
            1.0,
            Viewport::new(800.0, 600.0),
        );
        let candidates = [
            Candidate {
                index: 0,
                position: Vector3::new(0.3, 0.0, 0.0),
                distance: 10.0,
            },
            Candidate {
                index: 1,
                position: Vector3::new(0.05, 0.0, 0.0),
                distance: 10.0,
            },
            Candidate {
                index: 2,
                position: Vector3::new(0.0, 0.0, 20.0),
                distance: 10.0,
            },
        ];
        let hit = pick_by_screen_center(&camera, &candidates, 60.0, 100).unwrap();
        assert_eq!(hit.index, 1);

        let far = [Candidate {
            index: 0,
            position: Vector3::new(3.0, 0.0, 0.0),
            distance: 10.0,
        }];
        assert!(pick_by_screen_center(&camera, &far, 60.0, 100).is_none());
    }

    fn index() -> ParticleIndex {
        let records = vec![
            ParticleRecord::new("far", "Tool", Vector3::new(0.0, 0.0, -40.0)),
            ParticleRecord::new("near", "Tool", Vector3::new(0.0, 0.0, -10.0)),
            ParticleRecord::new("touching", "Tool", Vector3::new(0.0, 0.0, -0.1)),
            ParticleRecord::new("behind", "Concept", Vector3::new(0.0, 0.0, 10.0)),
        ];
        ParticleIndex::from_records(&records, &Palette::new(PaletteConfig::default(), 0)).unwrap()
    }

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
            Viewport::default(),
        )
    }

    #[test]
    fn test_frame_cache_filters_sorts_and_expires() {
        let mut cache = FrameCache::new(&PickingConfig::default());
        let index = index();

        let ids: Vec<usize> = cache
            .candidates(Duration::ZERO, &index, &camera())
            .iter()
            .map(|c| c.index)
            .collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(cache.rebuilds(), 1);

        cache.candidates(Duration::from_millis(50), &index, &camera());
        assert_eq!(cache.rebuilds(), 1);

        cache.candidates(Duration::from_millis(120), &index, &camera());
        assert_eq!(cache.rebuilds(), 2);

        cache.invalidate();
        cache.candidates(Duration::from_millis(130), &index, &camera());
        assert_eq!(cache.rebuilds(), 3);
    }

    #[test]
    fn test_tracker_throttles_and_reports_changes() {
        let mut engine = PickingEngine::new(PickingConfig::default());
        let index = index();
        let aim = camera().center_ray();

        assert!(engine.track(1, Duration::ZERO, &index, &camera(), Some(&aim)).is_none());

        let change = engine.track(3, Duration::ZERO, &index, &camera(), Some(&aim)).unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.current.as_deref(), Some("near"));

        assert!(engine.track(6, Duration::ZERO, &index, &camera(), Some(&aim)).is_none());

        let lost = engine.track(9, Duration::ZERO, &index, &camera(), None).unwrap();
        assert_eq!(lost.previous.as_deref(), Some("near"));
        assert_eq!(lost.current, None);
    }

    proptest! {
        #[test]
        fn prop_tolerance_never_narrows(
            steps in prop::collection::vec((0.1f64..500.0, 0.0f64..20.0), 1..8),
            a in 0.0f64..5_000.0,
            b in 0.0f64..5_000.0,
        ) {
            let mut distance = 0.0;
            let mut tolerance = 0.0;
            let points: Vec<Breakpoint> = steps
                .into_iter()
                .map(|(dd, dt)| {
                    distance += dd;
                    tolerance += dt;
                    Breakpoint::new(distance, tolerance)
                })
                .collect();
            let curve = ToleranceCurve::new(points).unwrap();

            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(curve.at(near) <= curve.at(far) + 1e-9);
        }
    }
}
