//! Orrery Deterministic Simulation Harness
//!
//! This crate runs the Orrery viewer core without a renderer, under full
//! control of the harness.
//!
//! # Core Principle: Explicit Context
//!
//! All sources of non-determinism are replaced:
//! - **Time**: Virtual clock advances one frame per step
//! - **Engine**: Labels and camera animations are simulated in memory
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (Virtual Clock + Seeded Streams)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼──────────────────────────────────────────────┐      │
//! │  │                    Viewer                         │      │
//! │  └────┬───────────────────────────────┬──────────────┘      │
//! │       │ LabelFactory                  │ AnimationRunner     │
//! │  ┌────▼────┐                     ┌────▼──────┐              │
//! │  │SimScene │                     │SimAnimator│ (camera pose)│
//! │  └─────────┘                     └───────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use orrery_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 300).run(ScenarioId::FlyCancel);
//! assert!(result.passed);
//! ```

mod animator;
mod context;
mod dataset;
mod exporter;
mod runner;
mod scene;
mod world;
pub mod scenarios;

pub use animator::SimAnimator;
pub use context::SimContext;
pub use dataset::{coincident, load_json, DatasetGenerator, SimError};
pub use exporter::{Position, SimEvent, SimExport, SimFrame};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scene::{SceneStats, SimLabel, SimScene};
pub use world::{SimConfig, SimViewer, SimWorld, WorldStats};
