//! Viewer - orchestrates the engines against the host environment.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            Viewer                             │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │  Context: ViewerContext   Labels: LabelFactory          │  │
//! │  │  • now() → motion time    Animator: AnimationRunner     │  │
//! │  │  • derive_rng() → relax                                 │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │                                                               │
//! │  frame(): RELAX(slice) → ORBIT → BLINK → TOUR → LABELS → AIM  │
//! │  input:   PICKING → NAVIGATION → BLINK + PROXIMITY            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The viewer owns the particle index; the orbital model and category
//! filtering are the only paths that write particle state.

use crate::blink::{BlinkController, BlinkState};
use crate::config::ViewerConfig;
use crate::index::{CategoryToggle, IndexError, LegendEntry, ParticleIndex};
use crate::input::{translate, InputEvent, InputIntent};
use crate::labels::{ReconcileReport, VisibilityLabelManager};
use crate::navigation::{CameraNavigator, NavigationComplete, NavigationId, NavigationTicket};
use crate::orbit::{MotionStats, OrbitalMotionModel};
use crate::palette::Palette;
use crate::particle::{validate_records, DatasetError, ParticleRecord};
use crate::picking::{PickingEngine, TargetChange};
use crate::proximity::{rank_nearest, RankedNeighbor};
use crate::relax::{RelaxJob, RelaxOutcome, RelaxProgress, SpatialRelaxer};
use crate::tour::{GuidedTour, TourPlan, TourStep};
use nalgebra::Vector3;
use orrery_env::{AnimationId, AnimationRunner, CameraState, EnvError, LabelFactory, Ray, ViewerContext};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// RNG stream for relaxation jitter; offset by the load count.
const RELAX_STREAM: u64 = 0x7265_6c61_7800;

/// Errors surfaced to the host UI.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("No such particle: {0}")]
    NotFound(String),

    #[error("No such category: {0}")]
    UnknownCategory(String),

    #[error("Invalid dataset: {0}")]
    Dataset(#[from] DatasetError),

    #[error("No navigation is active")]
    NoActiveNavigation,

    #[error("Engine error: {0}")]
    Engine(#[from] EnvError),
}

impl From<IndexError> for ViewerError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::ParticleNotFound(id) => ViewerError::NotFound(id),
            IndexError::CategoryNotFound(category) => ViewerError::UnknownCategory(category),
        }
    }
}

/// State of a dataset load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadStatus {
    /// Relaxation still running across frames
    Relaxing { pass: usize, pair_checks: u64 },

    /// New scene swapped in
    Committed { particles: usize, relax: RelaxOutcome },
}

/// A started selection: the navigation plus the refreshed proximity panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub ticket: NavigationTicket,
    pub neighbors: Vec<RankedNeighbor>,
}

/// What an input event led to.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    AimUpdated,
    AimCleared,
    Selected(Selection),

    /// A select gesture hit nothing
    Missed,

    /// Host should translate the camera
    MoveCamera(Vector3<f64>),

    Ignored,
}

/// Everything that happened in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub motion: MotionStats,

    /// Set on reconciliation frames
    pub labels: Option<ReconcileReport>,

    /// Highlight change from continuous targeting
    pub target: Option<TargetChange>,

    /// Blinks that returned to Idle this frame
    pub blinks_finished: Vec<String>,

    pub tour: Option<TourStep>,

    /// Progress of a cooperative load
    pub load: Option<LoadStatus>,
}

struct PendingLoad {
    records: Vec<ParticleRecord>,
    job: RelaxJob,
}

/// The particle viewer core.
///
/// Generic over the context, label factory and animation runner, so the same
/// code runs in a renderer or in the headless harness.
pub struct Viewer<Ctx, L, A>
where
    Ctx: ViewerContext,
    L: LabelFactory,
    A: AnimationRunner,
{
    context: Arc<Ctx>,
    label_factory: L,
    animator: A,
    config: ViewerConfig,

    palette: Palette,
    relaxer: SpatialRelaxer,
    index: ParticleIndex,
    motion: OrbitalMotionModel,
    labels: VisibilityLabelManager,
    picking: PickingEngine,
    navigator: CameraNavigator,
    blinks: BlinkController,
    tour: GuidedTour,

    pending: Option<PendingLoad>,

    /// Latest pointer/controller ray
    aim: Option<Ray>,

    frame_count: u64,
    load_count: u64,
}

impl<Ctx, L, A> Viewer<Ctx, L, A>
where
    Ctx: ViewerContext,
    L: LabelFactory,
    A: AnimationRunner,
{
    pub fn new(context: Arc<Ctx>, label_factory: L, animator: A, config: ViewerConfig) -> Self {
        let palette = Palette::new(config.palette.clone(), context.seed());
        Self {
            relaxer: SpatialRelaxer::new(config.relax.clone()),
            motion: OrbitalMotionModel::new(config.motion.clone()),
            labels: VisibilityLabelManager::new(config.labels.clone()),
            picking: PickingEngine::new(config.picking.clone()),
            navigator: CameraNavigator::new(config.navigation.clone()),
            blinks: BlinkController::new(config.blink.clone()),
            tour: GuidedTour::new(config.tour.clone()),
            index: ParticleIndex::default(),
            palette,
            context,
            label_factory,
            animator,
            config,
            pending: None,
            aim: None,
            frame_count: 0,
            load_count: 0,
        }
    }

    // ========================================================================
    // DATASET
    // ========================================================================

    /// Validates and loads a dataset.
    ///
    /// Invalid input is rejected before anything is torn down. Small datasets
    /// are relaxed and committed immediately; larger ones are relaxed over
    /// the following frames and committed when done.
    pub fn load_dataset(&mut self, records: Vec<ParticleRecord>) -> Result<LoadStatus, ViewerError> {
        validate_records(&records)?;

        self.load_count += 1;
        let rng = self.context.derive_rng(RELAX_STREAM + self.load_count);
        let positions = records.iter().map(ParticleRecord::position).collect();
        let mut job = self.relaxer.start(positions, rng);

        if self.pending.take().is_some() {
            debug!("Previous cooperative load superseded");
        }

        if records.len() <= self.config.sync_relax_limit {
            let outcome = job.run_to_end();
            return self.commit(records, job, outcome);
        }

        info!(
            "[{}] Relaxing {} particles across frames",
            self.config.name,
            records.len()
        );
        self.pending = Some(PendingLoad { records, job });
        Ok(LoadStatus::Relaxing {
            pass: 0,
            pair_checks: 0,
        })
    }

    /// Builds the new index, then tears down everything tied to the old one.
    fn commit(
        &mut self,
        records: Vec<ParticleRecord>,
        job: RelaxJob,
        outcome: RelaxOutcome,
    ) -> Result<LoadStatus, ViewerError> {
        let index = ParticleIndex::build(&records, job.points(), &self.palette)?;

        let labels = self.labels.clear(&mut self.label_factory);
        let blinks = self.blinks.clear();
        self.navigator.cancel(&mut self.animator);
        self.tour.cancel();
        self.picking.reset();
        self.motion.reset();
        self.aim = None;

        self.index = index;
        info!(
            "[{}] Loaded {} particles ({:?}); released {} labels, {} blinks",
            self.config.name,
            self.index.len(),
            outcome,
            labels,
            blinks
        );
        Ok(LoadStatus::Committed {
            particles: self.index.len(),
            relax: outcome,
        })
    }

    fn step_pending_load(&mut self) -> Option<LoadStatus> {
        let mut pending = self.pending.take()?;
        match pending.job.step(self.config.relax_pairs_per_frame) {
            RelaxProgress::Pending { pass, pair_checks } => {
                self.pending = Some(pending);
                Some(LoadStatus::Relaxing { pass, pair_checks })
            }
            RelaxProgress::Done(outcome) => match self.commit(pending.records, pending.job, outcome) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("[{}] Dataset load failed after relaxation: {}", self.config.name, e);
                    None
                }
            },
        }
    }

    // ========================================================================
    // FRAME
    // ========================================================================

    /// Runs one frame: motion, blinks, tour, labels, then targeting.
    pub fn frame(&mut self, camera: &CameraState) -> FrameReport {
        let frame = self.frame_count;
        self.frame_count += 1;

        let mut report = FrameReport {
            frame,
            load: self.step_pending_load(),
            ..Default::default()
        };

        let now = self.context.now();
        report.motion = self.motion.update(&mut self.index, camera, now.as_secs_f64());
        report.blinks_finished = self.blinks.tick();

        if let Some(step) = self.tour.tick() {
            if let TourStep::Next(id) = &step {
                self.continue_tour(id, camera);
            }
            report.tour = Some(step);
        }

        report.labels = self
            .labels
            .tick(frame, &self.index, camera, &mut self.label_factory);
        report.target = self
            .picking
            .track(frame, now, &self.index, camera, self.aim.as_ref());
        report
    }

    fn continue_tour(&mut self, id: &str, camera: &CameraState) {
        match self.navigate(id, camera) {
            Ok(selection) => self.tour.departed(selection.ticket.id),
            Err(e) => {
                warn!("[{}] Tour stop {} unreachable: {}", self.config.name, id, e);
                self.tour.cancel();
            }
        }
    }

    // ========================================================================
    // SELECTION & NAVIGATION
    // ========================================================================

    /// Flies to a particle by name (search box).
    ///
    /// An unknown name leaves the camera and any running navigation alone.
    pub fn select_by_name(&mut self, id: &str, camera: &CameraState) -> Result<Selection, ViewerError> {
        if self.index.by_name(id).is_none() {
            return Err(ViewerError::NotFound(id.to_string()));
        }
        self.tour.cancel();
        self.navigate(id, camera)
    }

    fn navigate(&mut self, id: &str, camera: &CameraState) -> Result<Selection, ViewerError> {
        let target = *self
            .index
            .by_name(id)
            .ok_or_else(|| ViewerError::NotFound(id.to_string()))?
            .current_position();

        let ticket = self.navigator.fly_to(camera, id, target, &mut self.animator)?;
        self.blinks.start(id);
        let neighbors = rank_nearest(&self.index, id, self.config.proximity_limit)?;
        Ok(Selection { ticket, neighbors })
    }

    /// Engine callback for a finished animation.
    pub fn on_animation_complete(&mut self, animation: AnimationId) -> Option<NavigationComplete> {
        let complete = self.navigator.on_animation_complete(animation)?;
        info!("[{}] Arrived at {}", self.config.name, complete.target_id);
        self.tour.on_arrival(&complete);
        Some(complete)
    }

    /// Stops the camera where it is.
    pub fn cancel_navigation(&mut self) -> Result<NavigationId, ViewerError> {
        self.tour.cancel();
        self.navigator
            .cancel(&mut self.animator)
            .ok_or(ViewerError::NoActiveNavigation)
    }

    /// Starts a guided tour and flies to its first stop.
    pub fn start_tour(&mut self, plan: &TourPlan, camera: &CameraState) -> Result<Option<Selection>, ViewerError> {
        let Some(first) = self.tour.start(plan, &self.index)? else {
            return Ok(None);
        };
        match self.navigate(&first, camera) {
            Ok(selection) => {
                self.tour.departed(selection.ticket.id);
                Ok(Some(selection))
            }
            Err(e) => {
                self.tour.cancel();
                Err(e)
            }
        }
    }

    // ========================================================================
    // FILTERING & PANELS
    // ========================================================================

    pub fn toggle_category(&mut self, category: &str) -> Result<CategoryToggle, ViewerError> {
        let toggle = self.index.toggle_category(category)?;
        self.picking.invalidate_cache();
        info!(
            "[{}] Category {} now {}",
            self.config.name,
            category,
            if toggle.visible { "shown" } else { "hidden" }
        );
        Ok(toggle)
    }

    /// Proximity panel for a particle.
    pub fn nearest(&self, id: &str) -> Result<Vec<RankedNeighbor>, ViewerError> {
        Ok(rank_nearest(&self.index, id, self.config.proximity_limit)?)
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.index.legend(&self.palette)
    }

    /// Search datalist.
    pub fn visible_names(&self) -> Vec<&str> {
        self.index.visible_names()
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    pub fn handle_input(&mut self, event: &InputEvent, camera: &CameraState) -> Result<InputOutcome, ViewerError> {
        let now = self.context.now();
        let picked = match translate(event, camera, &self.config.input) {
            InputIntent::Aim(ray) => {
                self.aim = Some(ray);
                return Ok(InputOutcome::AimUpdated);
            }
            InputIntent::ClearAim => {
                self.aim = None;
                return Ok(InputOutcome::AimCleared);
            }
            InputIntent::Move(delta) => return Ok(InputOutcome::MoveCamera(delta)),
            InputIntent::Ignore => return Ok(InputOutcome::Ignored),
            InputIntent::SelectRay(ray) => self
                .picking
                .pick_ray(now, &self.index, camera, &ray)
                .map(|hit| hit.index),
            InputIntent::SelectCenter => self
                .picking
                .pick_center(now, &self.index, camera)
                .map(|hit| hit.index),
        };

        let Some(id) = picked.and_then(|i| self.index.get(i)).map(|p| p.id().to_string()) else {
            return Ok(InputOutcome::Missed);
        };
        self.select_by_name(&id, camera).map(InputOutcome::Selected)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn index(&self) -> &ParticleIndex {
        &self.index
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn label_factory(&self) -> &L {
        &self.label_factory
    }

    pub fn label_factory_mut(&mut self) -> &mut L {
        &mut self.label_factory
    }

    pub fn animator(&self) -> &A {
        &self.animator
    }

    pub fn animator_mut(&mut self) -> &mut A {
        &mut self.animator
    }

    pub fn labels(&self) -> &VisibilityLabelManager {
        &self.labels
    }

    pub fn navigator(&self) -> &CameraNavigator {
        &self.navigator
    }

    pub fn tour(&self) -> &GuidedTour {
        &self.tour
    }

    pub fn blink_state(&self, id: &str) -> BlinkState {
        self.blinks.state(id)
    }

    pub fn is_blink_lit(&self, id: &str) -> bool {
        self.blinks.is_lit(id)
    }

    pub fn active_blinks(&self) -> usize {
        self.blinks.active_count()
    }

    pub fn current_target(&self) -> Option<&str> {
        self.picking.current_target()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relax::RelaxConfig;
    use crate::testing::{MockAnimator, MockContext, MockLabels};
    use orrery_env::{ScreenPoint, Viewport};

    type TestViewer = Viewer<MockContext, MockLabels, MockAnimator>;

    fn config() -> ViewerConfig {
        ViewerConfig::default().with_relax(RelaxConfig::default().with_min_distance(1.0))
    }

    fn viewer() -> TestViewer {
        Viewer::new(
            Arc::new(MockContext::new(7)),
            MockLabels::default(),
            MockAnimator::default(),
            config(),
        )
    }

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
            Viewport::new(800.0, 600.0),
        )
    }

    fn records() -> Vec<ParticleRecord> {
        vec![
            ParticleRecord::new("Rust", "Language", Vector3::new(0.0, 0.0, -6.0)).with_level(1),
            ParticleRecord::new("Cargo", "Tool", Vector3::new(1.5, 0.0, -8.0)).with_level(3),
            ParticleRecord::new("Go", "Language", Vector3::new(-2.0, 0.5, -9.0)).with_level(2),
            ParticleRecord::new("Distant", "Concept", Vector3::new(0.0, 0.0, -300.0)),
        ]
    }

    fn loaded() -> TestViewer {
        let mut viewer = viewer();
        viewer.load_dataset(records()).unwrap();
        viewer
    }

    #[test]
    fn test_unknown_name_reports_not_found_without_motion() {
        let mut viewer = loaded();
        let err = viewer.select_by_name("Foo", &camera()).unwrap_err();
        assert!(matches!(err, ViewerError::NotFound(ref id) if id == "Foo"));
        assert!(viewer.animator().started.is_empty());
        assert!(!viewer.navigator().is_animating());
    }

    #[test]
    fn test_selection_starts_navigation_blink_and_proximity() {
        let mut viewer = loaded();
        let selection = viewer.select_by_name("Rust", &camera()).unwrap();

        assert_eq!(selection.ticket.target_id, "Rust");
        assert_eq!(viewer.animator().started.len(), 1);
        assert_eq!(viewer.blink_state("Rust"), BlinkState::Blinking { step: 0 });
        assert_eq!(selection.neighbors[0].id, "Cargo");
        assert!(selection.neighbors.iter().all(|n| n.id != "Rust"));

        let done = viewer.on_animation_complete(selection.ticket.animation).unwrap();
        assert_eq!(done.target_id, "Rust");
        assert!(viewer.on_animation_complete(selection.ticket.animation).is_none());
    }

    #[test]
    fn test_invalid_load_keeps_previous_scene() {
        let mut viewer = loaded();
        let mut bad = records();
        bad[1].x = f64::NAN;

        let err = viewer.load_dataset(bad).unwrap_err();
        assert!(matches!(err, ViewerError::Dataset(DatasetError::NonFiniteCoordinate { index: 1, .. })));
        assert_eq!(viewer.index().len(), 4);
        assert!(viewer.index().by_name("Cargo").is_some());
    }

    #[test]
    fn test_frame_creates_labels_for_nearby_particles() {
        let mut viewer = loaded();
        let report = viewer.frame(&camera());

        let labels = report.labels.unwrap();
        assert_eq!(labels.created, 3);
        assert!(viewer.labels().has_label("Rust"));
        assert!(!viewer.labels().has_label("Distant"));

        // Off-cadence frame does not reconcile
        assert!(viewer.frame(&camera()).labels.is_none());
    }

    #[test]
    fn test_reload_releases_labels_blinks_and_navigation() {
        let mut viewer = loaded();
        viewer.frame(&camera());
        let selection = viewer.select_by_name("Go", &camera()).unwrap();
        assert!(viewer.labels().live_count() > 0);

        let status = viewer
            .load_dataset(vec![ParticleRecord::new("Zig", "Language", Vector3::new(0.0, 0.0, -5.0))])
            .unwrap();
        assert!(matches!(status, LoadStatus::Committed { particles: 1, .. }));

        assert_eq!(viewer.labels().live_count(), 0);
        assert!(viewer.label_factory().live.is_empty());
        assert_eq!(viewer.active_blinks(), 0);
        assert_eq!(viewer.animator().stopped, vec![selection.ticket.animation]);
        assert!(viewer.on_animation_complete(selection.ticket.animation).is_none());
        assert!(viewer.index().by_name("Go").is_none());
    }

    #[test]
    fn test_large_dataset_relaxes_across_frames() {
        let mut viewer = Viewer::new(
            Arc::new(MockContext::new(1)),
            MockLabels::default(),
            MockAnimator::default(),
            config().with_sync_relax_limit(2),
        );
        viewer.config.relax_pairs_per_frame = 2;

        let status = viewer.load_dataset(records()).unwrap();
        assert!(matches!(status, LoadStatus::Relaxing { .. }));
        assert!(viewer.is_loading());
        assert!(viewer.index().is_empty());

        let mut committed = None;
        for _ in 0..1_000 {
            if let Some(LoadStatus::Committed { particles, .. }) = viewer.frame(&camera()).load {
                committed = Some(particles);
                break;
            }
        }
        assert_eq!(committed, Some(4));
        assert!(!viewer.is_loading());
    }

    #[test]
    fn test_toggle_updates_legend_and_datalist() {
        let mut viewer = loaded();
        let toggle = viewer.toggle_category("Language").unwrap();
        assert_eq!(toggle.affected, 2);
        assert_eq!(viewer.visible_names(), vec!["Cargo", "Distant"]);

        let legend = viewer.legend();
        let language = legend.iter().find(|e| e.category == "Language").unwrap();
        assert!(!language.visible);

        assert!(matches!(
            viewer.toggle_category("Hardware"),
            Err(ViewerError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_click_selects_and_miss_is_reported() {
        let mut viewer = loaded();
        let outcome = viewer
            .handle_input(
                &InputEvent::Click {
                    screen: ScreenPoint::new(400.0, 300.0),
                },
                &camera(),
            )
            .unwrap();
        match outcome {
            InputOutcome::Selected(selection) => assert_eq!(selection.ticket.target_id, "Rust"),
            other => panic!("unexpected outcome {:?}", other),
        }

        let outcome = viewer
            .handle_input(
                &InputEvent::Click {
                    screen: ScreenPoint::new(5.0, 5.0),
                },
                &camera(),
            )
            .unwrap();
        assert_eq!(outcome, InputOutcome::Missed);
    }

    #[test]
    fn test_aim_drives_continuous_targeting() {
        let mut viewer = loaded();
        let aim = camera().center_ray();
        viewer
            .handle_input(&InputEvent::ControllerAim { ray: aim }, &camera())
            .unwrap();

        let report = viewer.frame(&camera());
        assert_eq!(report.target.unwrap().current.as_deref(), Some("Rust"));
        assert_eq!(viewer.current_target(), Some("Rust"));
    }

    #[test]
    fn test_tour_advances_on_completion() {
        let mut viewer = loaded();
        viewer.config.tour.dwell_frames = 1;
        viewer.tour = GuidedTour::new(viewer.config.tour.clone());

        let plan = TourPlan::Stops(vec!["Cargo".into(), "Go".into()]);
        let first = viewer.start_tour(&plan, &camera()).unwrap().unwrap();
        viewer.on_animation_complete(first.ticket.animation).unwrap();

        let report = viewer.frame(&camera());
        assert_eq!(report.tour, Some(TourStep::Next("Go".to_string())));
        let second = viewer.navigator().active().unwrap().clone();
        assert_eq!(second.target_id, "Go");

        viewer.on_animation_complete(second.animation).unwrap();
        assert_eq!(viewer.frame(&camera()).tour, Some(TourStep::Finished));
        assert_eq!(viewer.tour().visited(), &["Cargo".to_string(), "Go".to_string()]);
    }

    #[test]
    fn test_cancel_without_navigation_fails() {
        let mut viewer = loaded();
        assert!(matches!(
            viewer.cancel_navigation(),
            Err(ViewerError::NoActiveNavigation)
        ));
    }
}
