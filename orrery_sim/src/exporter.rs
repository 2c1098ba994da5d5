//! JSON exporter for offline replay.
//!
//! Exports simulation frames as JSON: camera pose, live labels, the
//! highlighted target and the events of each frame.

use nalgebra::Vector3;
use orrery_core::navigation::NavigationComplete;
use orrery_core::{FrameReport, LoadStatus, TourStep};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    pub frame: u64,

    pub camera: Position,
    pub look_at: Position,

    /// Particles carrying a label after this frame
    pub labels: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Events (arrivals, tour steps, loads, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Position {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// Simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    Arrived { target: String },
    TargetChanged { previous: Option<String>, current: Option<String> },
    BlinkFinished { particle: String },
    TourNext { stop: String },
    TourFinished,
    Relaxing { pass: usize },
    Loaded { particles: usize },
}

impl SimEvent {
    /// Events carried by a frame report and the arrivals before it.
    pub fn collect(arrivals: &[NavigationComplete], report: &FrameReport) -> Vec<SimEvent> {
        let mut events: Vec<SimEvent> = arrivals
            .iter()
            .map(|a| SimEvent::Arrived {
                target: a.target_id.clone(),
            })
            .collect();

        if let Some(change) = &report.target {
            events.push(SimEvent::TargetChanged {
                previous: change.previous.clone(),
                current: change.current.clone(),
            });
        }
        events.extend(
            report
                .blinks_finished
                .iter()
                .map(|id| SimEvent::BlinkFinished { particle: id.clone() }),
        );
        match &report.tour {
            Some(TourStep::Next(stop)) => events.push(SimEvent::TourNext { stop: stop.clone() }),
            Some(TourStep::Finished) => events.push(SimEvent::TourFinished),
            None => {}
        }
        match report.load {
            Some(LoadStatus::Relaxing { pass, .. }) => events.push(SimEvent::Relaxing { pass }),
            Some(LoadStatus::Committed { particles, .. }) => events.push(SimEvent::Loaded { particles }),
            None => {}
        }
        events
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
