//! SimWorld - The simulation harness container.

use crate::animator::SimAnimator;
use crate::context::SimContext;
use crate::exporter::{SimEvent, SimExport, SimFrame};
use crate::scene::SimScene;

use nalgebra::Vector3;
use orrery_core::navigation::NavigationComplete;
use orrery_core::{FrameReport, InputEvent, InputOutcome, Viewer, ViewerConfig, ViewerError};
use orrery_env::{CameraState, Viewport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Particles in generated datasets
    pub particles: usize,

    /// Frame rate in Hz
    pub tick_rate_hz: u32,

    /// Maximum simulation duration in seconds
    pub max_duration_secs: f64,

    /// Camera vertical field of view (radians)
    pub fov: f64,

    pub viewport: Viewport,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            particles: 300,
            tick_rate_hz: 60,
            max_duration_secs: 10.0,
            fov: 1.0,
            viewport: Viewport::default(),
        }
    }
}

impl SimConfig {
    /// Frame budget for `max_duration_secs`.
    pub fn max_ticks(&self) -> u64 {
        (self.max_duration_secs * self.tick_rate_hz as f64) as u64
    }
}

/// Aggregate counters over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    pub ticks: u64,
    pub labels_created: u64,
    pub labels_destroyed: u64,
    pub target_changes: u64,
    pub completions: u64,
}

pub type SimViewer = Viewer<SimContext, SimScene, SimAnimator>;

/// The SimWorld - a viewer driven by a virtual clock and a scripted camera.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// The viewer under test
    pub viewer: SimViewer,

    completions: Vec<NavigationComplete>,
    stats: WorldStats,

    /// Frame log, when recording
    recorder: Option<SimExport>,
}

impl SimWorld {
    /// Creates a world with the camera on +Z looking at the origin.
    pub fn new(config: SimConfig, viewer_config: ViewerConfig) -> Self {
        let context = SimContext::shared(config.seed);
        let animator = SimAnimator::new(Vector3::new(0.0, 0.0, 150.0), Vector3::zeros());
        let viewer = Viewer::new(context.clone(), SimScene::new(), animator, viewer_config);
        Self {
            config,
            context,
            viewer,
            completions: Vec::new(),
            stats: WorldStats::default(),
            recorder: None,
        }
    }

    /// The camera as the engine would report it this frame.
    pub fn camera(&self) -> CameraState {
        let animator = self.viewer.animator();
        CameraState::looking_at(
            animator.position(),
            animator.look_at(),
            self.config.fov,
            self.config.viewport,
        )
    }

    /// Advances the clock and animations, then runs one viewer frame.
    pub fn step(&mut self) -> FrameReport {
        let dt = 1.0 / self.config.tick_rate_hz.max(1) as f64;
        self.context.advance_time(Duration::from_secs_f64(dt));

        let mut arrivals = Vec::new();
        for id in self.viewer.animator_mut().advance() {
            if let Some(complete) = self.viewer.on_animation_complete(id) {
                arrivals.push(complete);
            }
        }

        let camera = self.camera();
        let report = self.viewer.frame(&camera);

        self.stats.ticks += 1;
        if let Some(labels) = report.labels {
            self.stats.labels_created += labels.created as u64;
            self.stats.labels_destroyed += labels.destroyed as u64;
        }
        if report.target.is_some() {
            self.stats.target_changes += 1;
        }
        self.stats.completions += arrivals.len() as u64;

        if let Some(recorder) = self.recorder.as_mut() {
            let animator = self.viewer.animator();
            recorder.add_frame(SimFrame {
                time_sec: self.context.time_ns() as f64 / 1e9,
                frame: report.frame,
                camera: animator.position().into(),
                look_at: animator.look_at().into(),
                labels: self.viewer.labels().labeled_ids().map(str::to_string).collect(),
                target: self.viewer.current_target().map(str::to_string),
                events: SimEvent::collect(&arrivals, &report),
            });
        }
        self.completions.extend(arrivals);
        report
    }

    /// Starts logging every frame for export.
    pub fn record(&mut self, scenario: &str) {
        self.recorder = Some(SimExport::new(scenario, self.config.seed));
    }

    /// Takes the frame log, ending the recording.
    pub fn take_export(&mut self) -> Option<SimExport> {
        self.recorder.take()
    }

    /// Runs `ticks` frames.
    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Runs until no navigation is animating, for at most one full flight.
    pub fn run_until_idle(&mut self) -> bool {
        let max_ticks = self.viewer.config().navigation.max_frames as u64 + 2;
        for _ in 0..max_ticks {
            if !self.viewer.navigator().is_animating() {
                return true;
            }
            self.step();
        }
        !self.viewer.navigator().is_animating()
    }

    /// Feeds an input event; locomotion moves the simulated camera.
    pub fn input(&mut self, event: InputEvent) -> Result<InputOutcome, ViewerError> {
        let camera = self.camera();
        let outcome = self.viewer.handle_input(&event, &camera)?;
        if let InputOutcome::MoveCamera(delta) = outcome {
            self.viewer.animator_mut().translate(delta);
        }
        Ok(outcome)
    }

    /// Navigation completions seen so far.
    pub fn completions(&self) -> &[NavigationComplete] {
        &self.completions
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetGenerator;
    use crate::exporter::Position;

    #[test]
    fn test_world_flies_camera_to_selection() {
        let mut world = SimWorld::new(SimConfig::default(), ViewerConfig::default());
        world
            .viewer
            .load_dataset(DatasetGenerator::new(1).generate(40))
            .unwrap();

        let target = world.viewer.index().all()[0].id().to_string();
        let camera = world.camera();
        let selection = world.viewer.select_by_name(&target, &camera).unwrap();

        assert!(world.run_until_idle());
        assert_eq!(world.completions().len(), 1);
        assert_eq!(world.completions()[0].target_id, target);
        assert!((world.camera().position - selection.ticket.destination).norm() < 1e-9);
    }

    #[test]
    fn test_recording_logs_each_frame() {
        let mut world = SimWorld::new(SimConfig::default(), ViewerConfig::default());
        world
            .viewer
            .load_dataset(DatasetGenerator::new(2).generate(30))
            .unwrap();
        world.record("test");
        world.run_ticks(5);

        let export = world.take_export().unwrap();
        assert_eq!(export.frames.len(), 5);
        assert_eq!(export.frames[0].camera, Position::from(Vector3::new(0.0, 0.0, 150.0)));
        assert!(world.take_export().is_none());
    }
}
