//! Scenario runner - executes deterministic viewer scenarios.

use crate::dataset::{self, DatasetGenerator};
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use nalgebra::Vector3;
use orrery_core::relax::RelaxOutcome;
use orrery_core::{
    FrameReport, InputEvent, InputOutcome, LoadStatus, ParticleRecord, TourPlan, TourStep,
    ViewerConfig, ViewerError,
};
use orrery_env::Ray;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Particles stacked on the origin in the declump scenario.
const STACK_SIZE: usize = 12;

/// Frames allowed for a cooperative load to commit.
const LOAD_BUDGET_TICKS: u64 = 20_000;

/// Dataset seed stream, kept apart from the viewer's own streams.
const DATA_STREAM: u64 = 0x6461_7461;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total frames executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Particles in the scene at the end
    pub final_particle_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Relaxation passes of the last load
    pub relax_passes: usize,

    /// Pairs still closer than the minimum distance after the last load
    pub remaining_collisions: usize,

    pub labels_created: u64,
    pub labels_destroyed: u64,
    pub peak_labels: usize,

    /// Creations the label factory rejected
    pub label_failures: u64,

    /// Labels whose mesh went before its texture or material
    pub leaked_resources: u64,

    pub navigations_started: u64,
    pub navigations_completed: u64,
    pub navigations_cancelled: u64,
    pub target_changes: u64,
    pub tour_stops_visited: usize,
}

/// Runs viewer scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Particles in generated datasets
    particles: usize,

    /// Tick rate in Hz
    tick_rate_hz: u32,

    /// Free-running duration in seconds
    max_duration_secs: f64,

    viewer_config: ViewerConfig,

    /// Replaces the generated dataset when set
    dataset: Option<Vec<ParticleRecord>>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, particles: usize) -> Self {
        Self {
            seed,
            particles,
            tick_rate_hz: 60,
            max_duration_secs: 10.0,
            viewer_config: ViewerConfig::default(),
            dataset: None,
        }
    }

    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    /// Sets the free-running duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs.max(0.0);
        self
    }

    pub fn with_viewer_config(mut self, config: ViewerConfig) -> Self {
        self.viewer_config = config;
        self
    }

    /// Runs every scenario against this dataset instead of a generated one.
    pub fn with_dataset(mut self, records: Vec<ParticleRecord>) -> Self {
        self.dataset = Some(records);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, false).0
    }

    /// Runs a scenario and returns the result plus a frame log.
    pub fn run_exported(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        let (result, export) = self.execute(scenario, true);
        let mut export = export.unwrap_or_else(|| SimExport::new(scenario.name(), self.seed));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    fn execute(&self, scenario: ScenarioId, record: bool) -> (ScenarioResult, Option<SimExport>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        if scenario.is_stress() {
            warn!("Stress scenario: {}", scenario.description());
        }

        let viewer_config = self
            .viewer_config
            .clone()
            .with_name(format!("sim-{}", scenario.name()));
        let mut world = SimWorld::new(self.sim_config(), viewer_config);
        if record {
            world.record(scenario.name());
        }
        let mut metrics = ScenarioMetrics::default();

        let outcome = match scenario {
            ScenarioId::Declump => self.run_declump(&mut world, &mut metrics),
            ScenarioId::LabelSweep => self.run_label_sweep(&mut world, &mut metrics),
            ScenarioId::FlyCancel => self.run_fly_cancel(&mut world, &mut metrics),
            ScenarioId::GuidedTour => self.run_guided_tour(&mut world, &mut metrics),
            ScenarioId::CategoryFilter => self.run_category_filter(&mut world, &mut metrics),
            ScenarioId::ControllerSweep => self.run_controller_sweep(&mut world, &mut metrics),
            ScenarioId::Reload => self.run_reload(&mut world, &mut metrics),
            ScenarioId::LargeLoad => self.run_large_load(&mut world, &mut metrics),
            ScenarioId::LabelFaults => self.run_label_faults(&mut world, &mut metrics),
        };
        let failures = outcome.unwrap_or_else(|e| vec![format!("viewer error: {}", e)]);

        let result = self.finish(scenario, &world, metrics, failures);
        (result, world.take_export())
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            seed: self.seed,
            particles: self.particles,
            tick_rate_hz: self.tick_rate_hz,
            max_duration_secs: self.max_duration_secs,
            ..SimConfig::default()
        }
    }

    fn max_ticks(&self) -> u64 {
        self.sim_config().max_ticks()
    }

    fn records(&self, count: usize, stream: u64) -> Vec<ParticleRecord> {
        match &self.dataset {
            Some(records) => records.clone(),
            None => DatasetGenerator::new(self.seed ^ DATA_STREAM ^ stream).generate(count),
        }
    }

    /// Longest possible flight plus slack.
    fn flight_budget(world: &SimWorld) -> u64 {
        world.viewer.config().navigation.max_frames as u64 + 2
    }

    /// Loads records and drives frames until the scene is committed.
    fn load(
        &self,
        world: &mut SimWorld,
        records: Vec<ParticleRecord>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Option<RelaxOutcome>, ViewerError> {
        let mut status = world.viewer.load_dataset(records)?;
        let mut ticks = 0;
        while let LoadStatus::Relaxing { pass, pair_checks } = status {
            if ticks >= LOAD_BUDGET_TICKS {
                warn!("Load still relaxing after {} frames", ticks);
                return Ok(None);
            }
            if ticks % 50 == 0 {
                debug!("  relaxing: pass={} pair_checks={}", pass, pair_checks);
            }
            if let Some(next) = observe(world, metrics, &mut Vec::new()).load {
                status = next;
            }
            ticks += 1;
        }

        match status {
            LoadStatus::Committed { relax, .. } => {
                metrics.relax_passes = relax.passes();
                Ok(Some(relax))
            }
            LoadStatus::Relaxing { .. } => Ok(None),
        }
    }

    fn load_generated(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
        failures: &mut Vec<String>,
    ) -> Result<bool, ViewerError> {
        let records = self.records(self.particles, 0);
        match self.load(world, records, metrics)? {
            Some(_) => Ok(true),
            None => {
                failures.push("dataset never committed".to_string());
                Ok(false)
            }
        }
    }

    /// SIM-001: Declump - stacked and clustered points pushed apart.
    ///
    /// **Assertion**: collisions drop, and a converged run leaves no pair
    /// far inside the minimum distance. Motion never rewrites rest positions.
    fn run_declump(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-001: Declump - minimum distance relaxation");
        let mut failures = Vec::new();

        let mut records = dataset::coincident(STACK_SIZE, Vector3::zeros());
        records.extend(self.records(self.particles, 0));
        let min_distance = world.viewer.config().relax.min_distance;
        let window_threshold = world.viewer.config().relax.window_threshold;

        let input: Vec<Vector3<f64>> = records.iter().map(ParticleRecord::position).collect();
        let before = count_collisions(&input, min_distance);

        let Some(outcome) = self.load(world, records, metrics)? else {
            failures.push("dataset never committed".to_string());
            return Ok(failures);
        };

        let relaxed = rest_positions(world);
        let after = count_collisions(&relaxed, min_distance);
        metrics.remaining_collisions = after;
        info!(
            "  relaxation {:?}: {} -> {} colliding pairs",
            outcome, before, after
        );

        if let RelaxOutcome::Skipped { points } = outcome {
            failures.push(format!("relaxation skipped for {} points", points));
        }
        if before > 0 && after >= before {
            failures.push(format!("collisions did not drop ({} -> {})", before, after));
        }
        if matches!(outcome, RelaxOutcome::Converged { .. }) && relaxed.len() <= window_threshold {
            let deep = count_collisions(&relaxed, min_distance * 0.9);
            if deep > 0 {
                failures.push(format!("converged with {} pairs inside 90% of min distance", deep));
            }
        }

        for _ in 0..self.max_ticks() {
            observe(world, metrics, &mut failures);
        }
        if rest_positions(world) != relaxed {
            failures.push("orbital motion changed rest positions".to_string());
        }

        info!("✓ Declump complete: {} passes", metrics.relax_passes);
        Ok(failures)
    }

    /// SIM-002: LabelSweep - fly from hub to hub and watch the label set.
    ///
    /// **Assertion**: after every reconciliation the labeled set equals the
    /// eligible set; no label resource leaks.
    fn run_label_sweep(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-002: LabelSweep - label reconciliation under motion");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        let dwell = world.viewer.config().labels.cadence * 2;
        for hub in primary_ids(world) {
            let camera = world.camera();
            world.viewer.select_by_name(&hub, &camera)?;
            for _ in 0..Self::flight_budget(world) {
                if !world.viewer.navigator().is_animating() {
                    break;
                }
                observe(world, metrics, &mut failures);
            }
            for _ in 0..dwell {
                observe(world, metrics, &mut failures);
            }
            debug!("  at {} | labels={}", hub, world.viewer.labels().live_count());
        }

        info!("✓ LabelSweep complete: peak {} labels", metrics.peak_labels);
        Ok(failures)
    }

    /// SIM-003: FlyCancel - interrupt a flight with a second selection.
    ///
    /// **Assertion**: only the second flight arrives; an explicit cancel
    /// leaves the camera where it stopped.
    fn run_fly_cancel(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-003: FlyCancel - interrupted navigation");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        let hubs = primary_ids(world);
        if hubs.len() < 3 {
            failures.push(format!("need 3 primary particles, found {}", hubs.len()));
            return Ok(failures);
        }

        let camera = world.camera();
        let first = world.viewer.select_by_name(&hubs[0], &camera)?;
        for _ in 0..10 {
            observe(world, metrics, &mut failures);
        }

        let camera = world.camera();
        let second = world.viewer.select_by_name(&hubs[1], &camera)?;
        if second.ticket.cancelled != Some(first.ticket.id) {
            failures.push("second selection did not cancel the first flight".to_string());
        }
        if !world.run_until_idle() {
            failures.push("second flight never arrived".to_string());
        }

        let arrivals: Vec<&str> = world
            .completions()
            .iter()
            .map(|c| c.target_id.as_str())
            .collect();
        if arrivals != [hubs[1].as_str()] {
            failures.push(format!("expected one arrival at {}, got {:?}", hubs[1], arrivals));
        }
        let offset = (world.camera().position - second.ticket.destination).norm();
        if offset > 1e-6 {
            failures.push(format!(
                "camera stopped {:.4} away from the stand-off point of {}",
                offset, hubs[1]
            ));
        }

        // Explicit cancel mid-flight
        let camera = world.camera();
        let third = world.viewer.select_by_name(&hubs[2], &camera)?;
        for _ in 0..5 {
            observe(world, metrics, &mut failures);
        }
        if world.viewer.cancel_navigation()? != third.ticket.id {
            failures.push("cancel stopped the wrong navigation".to_string());
        }
        let stopped_at = world.camera().position;
        for _ in 0..Self::flight_budget(world) {
            observe(world, metrics, &mut failures);
        }
        if world.camera().position != stopped_at {
            failures.push("camera kept moving after cancel".to_string());
        }
        if world.completions().len() != 1 {
            failures.push(format!("cancelled flight completed ({} arrivals)", world.completions().len()));
        }
        if !matches!(world.viewer.cancel_navigation(), Err(ViewerError::NoActiveNavigation)) {
            failures.push("cancel while idle did not report NoActiveNavigation".to_string());
        }

        let started = world.viewer.animator().started;
        let camera = world.camera();
        if !matches!(
            world.viewer.select_by_name("no-such-particle", &camera),
            Err(ViewerError::NotFound(_))
        ) {
            failures.push("unknown name was not reported".to_string());
        }
        if world.viewer.animator().started != started {
            failures.push("unknown name started an animation".to_string());
        }

        info!(
            "✓ FlyCancel complete: {} cancellations",
            world.viewer.navigator().cancellations()
        );
        Ok(failures)
    }

    /// SIM-004: GuidedTour - visit the most important particles.
    ///
    /// **Assertion**: stops are reached in plan order, each exactly once; a
    /// manual selection ends the tour.
    fn run_guided_tour(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-004: GuidedTour - sequenced navigation");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        let plan = TourPlan::MostImportant { limit: 4 };
        let camera = world.camera();
        if world.viewer.start_tour(&plan, &camera)?.is_none() {
            failures.push("tour had no stops".to_string());
            return Ok(failures);
        }
        let stops = world.viewer.tour().stops().to_vec();

        let per_stop = Self::flight_budget(world) + world.viewer.config().tour.dwell_frames as u64 + 2;
        let budget = stops.len() as u64 * per_stop + 10;
        let mut finished = false;
        for _ in 0..budget {
            if observe(world, metrics, &mut failures).tour == Some(TourStep::Finished) {
                finished = true;
                break;
            }
        }
        if !finished {
            failures.push(format!("tour did not finish within {} frames", budget));
        }

        metrics.tour_stops_visited = world.viewer.tour().visited().len();
        if world.viewer.tour().visited() != stops.as_slice() {
            failures.push(format!(
                "visited {:?}, planned {:?}",
                world.viewer.tour().visited(),
                stops
            ));
        }
        let arrivals: Vec<String> = world.completions().iter().map(|c| c.target_id.clone()).collect();
        if arrivals != stops {
            failures.push(format!("arrivals {:?} differ from stops {:?}", arrivals, stops));
        }

        // A manual selection ends a running tour
        let camera = world.camera();
        world.viewer.start_tour(&plan, &camera)?;
        for _ in 0..3 {
            observe(world, metrics, &mut failures);
        }
        let camera = world.camera();
        world.viewer.select_by_name(&stops[0], &camera)?;
        if world.viewer.tour().is_active() {
            failures.push("manual selection left the tour running".to_string());
        }

        info!("✓ GuidedTour complete: {} stops", metrics.tour_stops_visited);
        Ok(failures)
    }

    /// SIM-005: CategoryFilter - hide the category under the camera.
    ///
    /// **Assertion**: hidden particles are never labeled, targeted or
    /// listed; showing the category restores them.
    fn run_category_filter(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Vec<String>, ViewerError> {
        info!("SIM-005: CategoryFilter - hide and show a category");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        let Some(hub) = primary_ids(world).into_iter().next() else {
            failures.push("no primary particle".to_string());
            return Ok(failures);
        };
        let category = world
            .viewer
            .index()
            .by_name(&hub)
            .map(|p| p.category().to_string())
            .unwrap_or_default();

        let camera = world.camera();
        world.viewer.select_by_name(&hub, &camera)?;
        world.run_until_idle();

        let toggle = world.viewer.toggle_category(&category)?;
        if toggle.visible {
            failures.push(format!("{} still visible after toggle", category));
        }
        let aim = world.camera().center_ray();
        world.input(InputEvent::ControllerAim { ray: aim })?;

        let settle = world.viewer.config().labels.cadence * 2 + world.viewer.config().picking.target_every_n_frames;
        for _ in 0..settle {
            observe(world, metrics, &mut failures);
        }

        let hidden: BTreeSet<String> = world
            .viewer
            .index()
            .all()
            .iter()
            .filter(|p| p.category() == category)
            .map(|p| p.id().to_string())
            .collect();
        if world.viewer.labels().labeled_ids().any(|id| hidden.contains(id)) {
            failures.push(format!("hidden {} particle still labeled", category));
        }
        if world.viewer.current_target().is_some_and(|id| hidden.contains(id)) {
            failures.push(format!("hidden {} particle targeted", category));
        }
        if world.viewer.visible_names().iter().any(|id| hidden.contains(*id)) {
            failures.push(format!("hidden {} particle offered in search", category));
        }
        if world
            .viewer
            .legend()
            .iter()
            .any(|e| e.category == category && e.visible)
        {
            failures.push("legend still shows the category as visible".to_string());
        }

        let toggle = world.viewer.toggle_category(&category)?;
        if !toggle.visible {
            failures.push(format!("{} still hidden after second toggle", category));
        }
        if world.viewer.visible_names().len() != world.viewer.index().len() {
            failures.push("search list incomplete after showing the category".to_string());
        }
        if !matches!(
            world.viewer.toggle_category("no-such-category"),
            Err(ViewerError::UnknownCategory(_))
        ) {
            failures.push("unknown category was not reported".to_string());
        }

        info!("✓ CategoryFilter complete: {} toggled twice", category);
        Ok(failures)
    }

    /// SIM-006: ControllerSweep - sweep the controller ray across the view.
    ///
    /// **Assertion**: every highlighted target exists and is visible;
    /// locomotion moves the camera and the deadzone swallows small input.
    fn run_controller_sweep(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Vec<String>, ViewerError> {
        info!("SIM-006: ControllerSweep - continuous targeting");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        if let Some(hub) = primary_ids(world).into_iter().next() {
            let camera = world.camera();
            world.viewer.select_by_name(&hub, &camera)?;
            world.run_until_idle();
        }

        let sweep = self.max_ticks().max(60);
        for tick in 0..sweep {
            let camera = world.camera();
            let phase = tick as f64 / sweep as f64 * std::f64::consts::TAU;
            let yaw = phase.sin() * camera.fov;
            let (right, _) = camera.basis();
            if let Some(ray) = Ray::new(camera.position, camera.forward * yaw.cos() + right * yaw.sin()) {
                world.input(InputEvent::ControllerAim { ray })?;
            }

            let report = observe(world, metrics, &mut failures);
            if let Some(id) = report.target.and_then(|change| change.current) {
                let visible = world.viewer.index().by_name(&id).is_some_and(|p| p.is_visible());
                if !visible {
                    failures.push(format!("tick {}: targeted missing or hidden {}", tick, id));
                }
            }
        }

        // Locomotion
        let before = world.camera().position;
        if !matches!(world.input(InputEvent::Thumbstick { x: 0.0, y: 1.0 })?, InputOutcome::MoveCamera(_)) {
            failures.push("full deflection did not move the camera".to_string());
        }
        if world.camera().position == before {
            failures.push("camera position unchanged after locomotion".to_string());
        }
        if world.input(InputEvent::Thumbstick { x: 0.05, y: -0.05 })? != InputOutcome::Ignored {
            failures.push("deadzone input was not ignored".to_string());
        }

        // Trigger and gaze both resolve to a selection or a miss
        let ray = world.camera().center_ray();
        for event in [InputEvent::TriggerPressed { ray }, InputEvent::GazeSelect] {
            match world.input(event)? {
                InputOutcome::Selected(selection) => {
                    let visible = world
                        .viewer
                        .index()
                        .by_name(&selection.ticket.target_id)
                        .is_some_and(|p| p.is_visible());
                    if !visible {
                        failures.push(format!("selected hidden {}", selection.ticket.target_id));
                    }
                }
                InputOutcome::Missed => {}
                other => failures.push(format!("unexpected outcome {:?} for {:?}", other, event)),
            }
        }
        if world.input(InputEvent::PointerLeft)? != InputOutcome::AimCleared {
            failures.push("pointer leave did not clear the aim".to_string());
        }

        info!(
            "✓ ControllerSweep complete: {} target changes",
            world.stats().target_changes
        );
        Ok(failures)
    }

    /// SIM-007: Reload - replace the dataset while the scene is busy.
    ///
    /// **Assertion**: labels, blinks and the flight are released; the old
    /// flight never reports arrival.
    fn run_reload(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-007: Reload - teardown on dataset swap");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }

        let hubs = primary_ids(world);
        if let Some(hub) = hubs.first() {
            let camera = world.camera();
            world.viewer.select_by_name(hub, &camera)?;
            world.run_until_idle();
        }
        for _ in 0..world.viewer.config().labels.cadence + 1 {
            observe(world, metrics, &mut failures);
        }
        if let Some(hub) = hubs.last() {
            let camera = world.camera();
            world.viewer.select_by_name(hub, &camera)?;
        }
        observe(world, metrics, &mut failures);
        let arrivals = world.completions().len();
        debug!(
            "  before reload: labels={} blinks={} animating={}",
            world.viewer.labels().live_count(),
            world.viewer.active_blinks(),
            world.viewer.navigator().is_animating()
        );

        let replacement = self.records(self.particles / 2 + 1, 1);
        if self.load(world, replacement, metrics)?.is_none() {
            failures.push("replacement never committed".to_string());
            return Ok(failures);
        }

        if world.viewer.label_factory().live_labels() != 0 {
            failures.push(format!(
                "{} labels survived the reload",
                world.viewer.label_factory().live_labels()
            ));
        }
        if world.viewer.active_blinks() != 0 {
            failures.push("blinks survived the reload".to_string());
        }
        if world.viewer.navigator().is_animating() || world.viewer.animator().running_count() != 0 {
            failures.push("flight survived the reload".to_string());
        }
        if world.viewer.current_target().is_some() {
            failures.push("target survived the reload".to_string());
        }

        for _ in 0..Self::flight_budget(world) {
            observe(world, metrics, &mut failures);
        }
        if world.completions().len() != arrivals {
            failures.push("flight from the old scene reported arrival".to_string());
        }

        info!("✓ Reload complete: {} particles", world.viewer.index().len());
        Ok(failures)
    }

    /// SIM-008: LargeLoad - relax a large dataset across frames.
    ///
    /// **Assertion**: the viewer keeps producing frames while relaxing, and
    /// the scene is committed with every particle.
    fn run_large_load(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-008: LargeLoad - cooperative relaxation");
        let mut failures = Vec::new();

        let count = (self.particles * 10).max(world.viewer.config().sync_relax_limit + 1);
        let records = self.records(count, 2);
        let expected = records.len();
        let frames_before = world.viewer.frame_count();

        let status = world.viewer.load_dataset(records)?;
        if expected > world.viewer.config().sync_relax_limit && !matches!(status, LoadStatus::Relaxing { .. }) {
            failures.push("large dataset was relaxed synchronously".to_string());
        }

        let mut committed = matches!(status, LoadStatus::Committed { .. });
        for _ in 0..LOAD_BUDGET_TICKS {
            if committed {
                break;
            }
            if let Some(LoadStatus::Committed { particles, relax }) = observe(world, metrics, &mut failures).load {
                metrics.relax_passes = relax.passes();
                if particles != expected {
                    failures.push(format!("committed {} of {} particles", particles, expected));
                }
                committed = true;
            } else if !world.viewer.index().is_empty() {
                failures.push("partial scene visible while relaxing".to_string());
                break;
            }
        }
        if !committed {
            failures.push(format!("load not committed within {} frames", LOAD_BUDGET_TICKS));
        }

        let frames = world.viewer.frame_count() - frames_before;
        info!("✓ LargeLoad complete: {} particles over {} frames", expected, frames);
        Ok(failures)
    }

    /// SIM-009: LabelFaults - the engine refuses every label.
    ///
    /// **Assertion**: navigation is unaffected; once creations succeed
    /// again the labeled set catches up with the eligible set.
    fn run_label_faults(&self, world: &mut SimWorld, metrics: &mut ScenarioMetrics) -> Result<Vec<String>, ViewerError> {
        info!("SIM-009: LabelFaults - label creation failures");
        let mut failures = Vec::new();
        if !self.load_generated(world, metrics, &mut failures)? {
            return Ok(failures);
        }
        world.viewer.label_factory_mut().fail_creations = true;

        if let Some(hub) = primary_ids(world).into_iter().next() {
            let camera = world.camera();
            world.viewer.select_by_name(&hub, &camera)?;
            if !world.run_until_idle() {
                failures.push("navigation stalled while labels failed".to_string());
            }
        }

        let cadence = world.viewer.config().labels.cadence;
        for _ in 0..cadence * 2 {
            observe(world, metrics, &mut failures);
        }
        if world.viewer.labels().live_count() != 0 {
            failures.push("labels tracked although every creation failed".to_string());
        }

        // The next reconciliation catches up; `observe` compares it with the eligible set
        world.viewer.label_factory_mut().fail_creations = false;
        let mut recovered = None;
        for _ in 0..cadence {
            if let Some(labels) = observe(world, metrics, &mut failures).labels {
                recovered = Some(labels);
                break;
            }
        }
        match recovered {
            Some(labels) if labels.failed == 0 => {}
            Some(labels) => failures.push(format!("{} creations failed after recovery", labels.failed)),
            None => failures.push("no reconciliation after recovery".to_string()),
        }

        info!("✓ LabelFaults complete: {} rejected creations", metrics.label_failures);
        Ok(failures)
    }

    /// Fills in world-level metrics and checks invariants common to all scenarios.
    fn finish(
        &self,
        scenario: ScenarioId,
        world: &SimWorld,
        mut metrics: ScenarioMetrics,
        mut failures: Vec<String>,
    ) -> ScenarioResult {
        let stats = world.stats();
        let scene = world.viewer.label_factory().stats();
        let animator = world.viewer.animator();

        metrics.labels_created = scene.created;
        metrics.labels_destroyed = scene.removed;
        metrics.leaked_resources = scene.leaked_resources;
        metrics.navigations_started = animator.started;
        metrics.navigations_completed = stats.completions;
        metrics.navigations_cancelled = world.viewer.navigator().cancellations();
        metrics.target_changes = stats.target_changes;

        if scene.leaked_resources > 0 {
            failures.push(format!("{} labels torn down out of order", scene.leaked_resources));
        }
        if scene.unknown_handles > 0 {
            failures.push(format!("{} releases of unknown label handles", scene.unknown_handles));
        }
        if world.viewer.label_factory().live_labels() != world.viewer.labels().live_count() {
            failures.push("label manager and scene disagree on live labels".to_string());
        }
        if stats.completions > animator.started {
            failures.push("more arrivals than flights".to_string());
        }

        let passed = failures.is_empty();
        if passed {
            info!("Scenario {} passed", scenario);
        } else {
            warn!("Scenario {} failed: {}", scenario, failures.join("; "));
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: stats.ticks,
            final_time_secs: world.context.time_ns() as f64 / 1e9,
            final_particle_count: world.viewer.index().len(),
            failure_reason: (!passed).then(|| failures.join("; ")),
            metrics,
        }
    }
}

/// Steps one frame and checks the label set against the eligible set.
fn observe(world: &mut SimWorld, metrics: &mut ScenarioMetrics, failures: &mut Vec<String>) -> FrameReport {
    let report = world.step();
    metrics.peak_labels = metrics.peak_labels.max(world.viewer.labels().live_count());

    if let Some(labels) = report.labels {
        metrics.label_failures += labels.failed as u64;
        if labels.failed == 0 {
            let camera = world.camera();
            let expected: BTreeSet<&str> = world
                .viewer
                .labels()
                .eligible(world.viewer.index(), &camera)
                .into_iter()
                .map(|p| p.id())
                .collect();
            let actual: BTreeSet<&str> = world.viewer.labels().labeled_ids().collect();
            if expected != actual && failures.len() < 16 {
                failures.push(format!(
                    "frame {}: {} labels for {} eligible particles",
                    report.frame,
                    actual.len(),
                    expected.len()
                ));
            }
        }
    }
    report
}

/// Ids of the most important particles, in input order.
fn primary_ids(world: &SimWorld) -> Vec<String> {
    world
        .viewer
        .index()
        .all()
        .iter()
        .filter(|p| p.importance().is_primary())
        .map(|p| p.id().to_string())
        .collect()
}

fn rest_positions(world: &SimWorld) -> Vec<Vector3<f64>> {
    world
        .viewer
        .index()
        .all()
        .iter()
        .map(|p| *p.original_position())
        .collect()
}

/// Pairs closer than `min_distance`.
fn count_collisions(points: &[Vector3<f64>], min_distance: f64) -> usize {
    let mut count = 0;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            if (a - b).norm() < min_distance {
                count += 1;
            }
        }
    }
    count
}
