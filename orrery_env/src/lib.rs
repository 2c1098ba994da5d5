//! Orrery Environment Abstraction Layer
//!
//! This crate describes everything the Orrery core consumes from the host
//! 3D engine, so the same core code runs inside a real renderer or inside the
//! deterministic headless harness (`orrery_sim`).
//!
//! # Core Concept: Explicit Context
//!
//! The core never reaches for global scene state. Every call receives:
//! - Time and seeded randomness through [`ViewerContext`]
//! - The camera as a plain [`CameraState`] value
//! - Label resources through a [`LabelFactory`]
//! - Camera animations through an [`AnimationRunner`]
//!
//! Deriving all randomness from one 64-bit seed makes relaxation jitter and
//! session colors reproducible from the seed alone.
//!
//! # Example
//!
//! ```ignore
//! use orrery_env::{CameraState, SystemContext, ViewerContext};
//!
//! let ctx = SystemContext::shared();
//! let camera = CameraState::looking_at(eye, target, fov, viewport);
//! viewer.frame(&camera);
//! ```

mod animation;
mod context;
mod error;
mod labels;
mod system_impl;
mod types;

pub use animation::{AnimationId, AnimationRunner, CameraAnimation, Keyframe};
pub use context::ViewerContext;
pub use error::EnvError;
pub use labels::{LabelFactory, LabelHandle, LabelKey, LabelSpec, LabelStyle};
pub use system_impl::SystemContext;
pub use types::{CameraState, Ray, Rgb, ScreenPoint, Viewport};
