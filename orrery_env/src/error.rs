//! Error types for the Orrery environment abstraction.

use thiserror::Error;

/// Errors reported by engine collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The engine could not build a label texture or mesh
    #[error("Label creation failed: {0}")]
    LabelCreation(String),

    /// The engine rejected a camera animation
    #[error("Animation rejected: {0}")]
    AnimationRejected(String),

    /// The engine has no active camera to drive
    #[error("No active camera")]
    NoCamera,
}

impl EnvError {
    /// Creates a label creation error.
    pub fn label(msg: impl Into<String>) -> Self {
        Self::LabelCreation(msg.into())
    }

    /// Creates an animation error.
    pub fn animation(msg: impl Into<String>) -> Self {
        Self::AnimationRejected(msg.into())
    }
}
