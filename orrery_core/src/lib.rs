//! Orrery Core - Interactive 3D Particle Visualization Engine
//!
//! This library turns a flat list of labeled taxonomy points into a
//! navigable star field:
//! 1. **Clumping Problem**: raw coordinates overlap, solved by iterative
//!    minimum-distance relaxation
//! 2. **Label Flood Problem**: thousands of names cannot all be drawn, solved
//!    by reconciling labels against a near/in-view eligible set
//! 3. **Distant Target Problem**: pointing error grows with range, solved by
//!    a range-widening pick tolerance over a cached candidate set
//!
//! The [`Viewer`] ties the engines together against the host environment
//! described in `orrery_env`.

pub mod blink;
pub mod config;
pub mod index;
pub mod input;
pub mod labels;
pub mod navigation;
pub mod orbit;
pub mod palette;
pub mod particle;
pub mod picking;
pub mod proximity;
pub mod relax;
pub mod tour;
pub mod viewer;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use config::ViewerConfig;
pub use index::{CategoryToggle, IndexError, LegendEntry, ParticleIndex};
pub use input::InputEvent;
pub use navigation::{CameraNavigator, NavigationComplete, NavigationTicket};
pub use particle::{DatasetError, ImportanceLevel, Particle, ParticleRecord};
pub use picking::{PickingEngine, TargetChange, ToleranceCurve};
pub use relax::{RelaxOutcome, SpatialRelaxer};
pub use tour::{TourPlan, TourStep};
pub use viewer::{FrameReport, InputOutcome, LoadStatus, Selection, Viewer, ViewerError};
