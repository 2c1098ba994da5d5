//! The "DECLUMP" pass - iterative minimum-distance relaxation.
//!
//! Raw taxonomy coordinates tend to pile many points into the same spot.
//! Each pass visits every unordered pair and pushes pairs closer than
//! `min_distance` apart along the line joining them, with the per-step move
//! capped so dense clusters do not overshoot and oscillate.
//!
//! The pass is O(n²) by construction. Large inputs are either skipped or
//! restricted to a sliding window of x-sorted neighbours, and the work is
//! exposed as a resumable [`RelaxJob`] so a host can spread it over frames.

use nalgebra::Vector3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Pairs closer than this are treated as coincident.
const COINCIDENT_DISTANCE: f64 = 0.001;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the SpatialRelaxer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaxConfig {
    /// Target minimum separation between any two points
    pub min_distance: f64,

    /// Hard cap on passes (default: 60)
    pub max_iterations: usize,

    /// Fraction of the overlap each point moves per step (default: 0.25)
    pub push_factor: f64,

    /// Maximum displacement per point per step (default: 1.5)
    pub move_cap: f64,

    /// Pairs within this much of `min_distance` no longer count as colliding
    pub settle_tolerance: f64,

    /// Passes before stall detection may end the run (default: 10)
    pub min_passes: usize,

    /// Minimum fractional drop in collisions per pass before giving up
    pub stall_ratio: f64,

    /// Above this many points the inner loop only visits a neighbour window
    pub window_threshold: usize,

    /// Neighbour window size (in x-sorted order)
    pub window: usize,

    /// Above this many points relaxation is skipped entirely
    pub skip_above: usize,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            min_distance: 8.0,
            max_iterations: 60,
            push_factor: 0.25,
            move_cap: 1.5,
            settle_tolerance: 0.05,
            min_passes: 10,
            stall_ratio: 0.005,
            window_threshold: 2_000,
            window: 150,
            skip_above: 20_000,
        }
    }
}

impl RelaxConfig {
    pub fn with_min_distance(mut self, min_distance: f64) -> Self {
        self.min_distance = min_distance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// How a relaxation run ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RelaxOutcome {
    /// A full pass found no colliding pairs
    Converged { passes: usize },

    /// Collisions stopped going down
    Stalled { passes: usize, collisions: usize },

    /// `max_iterations` reached with collisions left
    BudgetExhausted { passes: usize, collisions: usize },

    /// Input too large (or relaxation disabled); points untouched
    Skipped { points: usize },
}

impl RelaxOutcome {
    pub fn passes(&self) -> usize {
        match *self {
            RelaxOutcome::Converged { passes }
            | RelaxOutcome::Stalled { passes, .. }
            | RelaxOutcome::BudgetExhausted { passes, .. } => passes,
            RelaxOutcome::Skipped { .. } => 0,
        }
    }

    /// Colliding pairs counted in the last pass.
    pub fn remaining_collisions(&self) -> usize {
        match *self {
            RelaxOutcome::Stalled { collisions, .. }
            | RelaxOutcome::BudgetExhausted { collisions, .. } => collisions,
            _ => 0,
        }
    }
}

/// Result of one cooperative slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelaxProgress {
    /// More work remains
    Pending { pass: usize, pair_checks: u64 },

    /// Finished
    Done(RelaxOutcome),
}

// ============================================================================
// RELAXER
// ============================================================================

/// Builds relaxation jobs from a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct SpatialRelaxer {
    config: RelaxConfig,
}

impl SpatialRelaxer {
    pub fn new(config: RelaxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelaxConfig {
        &self.config
    }

    /// Starts a resumable job over `points`.
    pub fn start(&self, points: Vec<Vector3<f64>>, rng: ChaCha8Rng) -> RelaxJob {
        RelaxJob::new(points, self.config.clone(), rng)
    }

    /// Runs to completion on the calling thread.
    pub fn relax(&self, points: Vec<Vector3<f64>>, rng: ChaCha8Rng) -> (Vec<Vector3<f64>>, RelaxOutcome) {
        let mut job = self.start(points, rng);
        let outcome = job.run_to_end();
        (job.into_points(), outcome)
    }
}

/// Relaxes `points` in place with default push/cap/stall settings.
pub fn relax(
    points: &mut [Vector3<f64>],
    min_distance: f64,
    max_iterations: usize,
    rng: ChaCha8Rng,
) -> RelaxOutcome {
    let config = RelaxConfig::default()
        .with_min_distance(min_distance)
        .with_max_iterations(max_iterations);
    let mut job = RelaxJob::new(points.to_vec(), config, rng);
    let outcome = job.run_to_end();
    points.copy_from_slice(&job.points);
    outcome
}

/// A relaxation run that can be advanced in bounded slices.
///
/// The pair cursor survives between calls to [`RelaxJob::step`], so the
/// result is the same whatever slice sizes the host uses.
pub struct RelaxJob {
    points: Vec<Vector3<f64>>,

    /// Visit order (x-sorted when windowed)
    order: Vec<usize>,

    config: RelaxConfig,
    rng: ChaCha8Rng,
    windowed: bool,

    /// Completed passes
    pass: usize,

    /// Pair cursor into `order`
    cursor_i: usize,
    cursor_j: usize,

    /// Collisions in the pass in progress
    collisions: usize,

    /// Collisions in the previous pass
    previous: Option<usize>,

    pair_checks: u64,
    outcome: Option<RelaxOutcome>,
}

impl RelaxJob {
    pub fn new(points: Vec<Vector3<f64>>, config: RelaxConfig, rng: ChaCha8Rng) -> Self {
        let n = points.len();
        let windowed = n > config.window_threshold;

        let mut order: Vec<usize> = (0..n).collect();
        if windowed {
            order.sort_by(|&a, &b| points[a].x.total_cmp(&points[b].x));
        }

        let outcome = if n > config.skip_above || config.max_iterations == 0 {
            debug!("Relaxation skipped for {} points", n);
            Some(RelaxOutcome::Skipped { points: n })
        } else if n < 2 {
            Some(RelaxOutcome::Converged { passes: 0 })
        } else {
            None
        };

        Self {
            points,
            order,
            config,
            rng,
            windowed,
            pass: 0,
            cursor_i: 0,
            cursor_j: 1,
            collisions: 0,
            previous: None,
            pair_checks: 0,
            outcome,
        }
    }

    /// Processes at most `pair_budget` pair comparisons.
    pub fn step(&mut self, pair_budget: usize) -> RelaxProgress {
        let n = self.order.len();
        let mut remaining = pair_budget;

        while remaining > 0 {
            if let Some(outcome) = self.outcome {
                return RelaxProgress::Done(outcome);
            }

            if self.cursor_i + 1 >= n {
                self.finish_pass();
                continue;
            }

            let upper = self.inner_upper(self.cursor_i, n);
            if self.cursor_j >= upper {
                self.cursor_i += 1;
                self.cursor_j = self.cursor_i + 1;
                continue;
            }

            let (a, b) = (self.order[self.cursor_i], self.order[self.cursor_j]);
            self.resolve_pair(a, b);
            self.cursor_j += 1;
            self.pair_checks += 1;
            remaining -= 1;
        }

        match self.outcome {
            Some(outcome) => RelaxProgress::Done(outcome),
            None => RelaxProgress::Pending {
                pass: self.pass,
                pair_checks: self.pair_checks,
            },
        }
    }

    /// Steps until the job finishes.
    pub fn run_to_end(&mut self) -> RelaxOutcome {
        loop {
            if let RelaxProgress::Done(outcome) = self.step(usize::MAX) {
                return outcome;
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<RelaxOutcome> {
        self.outcome
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Vector3<f64>> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn inner_upper(&self, i: usize, n: usize) -> usize {
        if self.windowed {
            n.min(i + 1 + self.config.window)
        } else {
            n
        }
    }

    /// Pushes one pair apart if it overlaps.
    fn resolve_pair(&mut self, a: usize, b: usize) {
        let min_distance = self.config.min_distance;
        let delta = self.points[a] - self.points[b];
        let distance = delta.norm();
        if distance >= min_distance {
            return;
        }

        let direction = if distance > COINCIDENT_DISTANCE {
            delta / distance
        } else {
            random_unit_vector(&mut self.rng)
        };
        let step = ((min_distance - distance) * self.config.push_factor).min(self.config.move_cap);

        self.points[a] += direction * step;
        self.points[b] -= direction * step;

        if distance < min_distance - self.config.settle_tolerance {
            self.collisions += 1;
        }
    }

    /// Closes the pass in progress and decides whether to continue.
    fn finish_pass(&mut self) {
        self.pass += 1;
        let collisions = self.collisions;
        let passes = self.pass;

        if collisions == 0 {
            debug!("Relaxation converged after {} passes", passes);
            self.outcome = Some(RelaxOutcome::Converged { passes });
            return;
        }

        if passes >= self.config.max_iterations {
            warn!(
                "Relaxation budget exhausted: {} passes, {} colliding pairs left",
                passes, collisions
            );
            self.outcome = Some(RelaxOutcome::BudgetExhausted { passes, collisions });
            return;
        }

        if let Some(previous) = self.previous.filter(|&p| p > 0) {
            let reduction = (previous as f64 - collisions as f64) / previous as f64;
            if passes >= self.config.min_passes && reduction < self.config.stall_ratio {
                debug!(
                    "Relaxation stalled after {} passes ({} -> {} collisions)",
                    passes, previous, collisions
                );
                self.outcome = Some(RelaxOutcome::Stalled { passes, collisions });
                return;
            }
        }

        self.previous = Some(collisions);
        self.collisions = 0;
        self.cursor_i = 0;
        self.cursor_j = 1;

        // Windows are taken over the x order as of the start of each pass
        if self.windowed {
            let points = &self.points;
            self.order.sort_by(|&a, &b| points[a].x.total_cmp(&points[b].x));
        }
    }
}

/// Uniformly distributed unit vector (rejection sampling in the unit ball).
fn random_unit_vector(rng: &mut ChaCha8Rng) -> Vector3<f64> {
    for _ in 0..16 {
        let candidate = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let norm = candidate.norm();
        if norm > 1e-3 && norm <= 1.0 {
            return candidate / norm;
        }
    }
    Vector3::x()
}
