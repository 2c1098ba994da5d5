//! Label resource interface.
//!
//! A label is a billboard mesh carrying a generated texture with the
//! particle's name. The core decides when labels exist; the engine owns the
//! GPU-side texture, material and mesh behind a [`LabelHandle`].

use crate::error::EnvError;
use crate::types::Rgb;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace for label keys (UUID v5).
const LABEL_NAMESPACE: Uuid = Uuid::from_u128(0x6f72_7265_7279_4c61_6265_6c4b_6579_0001);

/// Deterministic identity of a label, derived from its particle id.
///
/// The same derivation is used when checking "does this label exist" and
/// "is its particle still eligible", so the two sides always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelKey(pub Uuid);

impl LabelKey {
    /// Derives the key for a particle id.
    pub fn for_particle(particle_id: &str) -> Self {
        Self(Uuid::new_v5(&LABEL_NAMESPACE, particle_id.as_bytes()))
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label-{}", &self.0.to_string()[..8])
    }
}

/// Engine-side handle of a materialized label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelHandle(pub u64);

/// How the label texture is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelStyle {
    /// Texture size in pixels
    pub texture_width: u32,
    pub texture_height: u32,

    /// Glyph size in pixels
    pub font_px: u32,

    /// Draw `[ ]` ornamentation around the name
    pub bracketed: bool,

    /// World-space height of the billboard
    pub world_height: f64,
}

/// Everything the engine needs to build one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub key: LabelKey,
    pub text: String,
    pub position: Vector3<f64>,
    pub color: Rgb,
    pub style: LabelStyle,
}

impl LabelSpec {
    /// The string drawn into the texture.
    pub fn display_text(&self) -> String {
        if self.style.bracketed {
            format!("[ {} ]", self.text)
        } else {
            self.text.clone()
        }
    }
}

/// Creates and destroys label resources on the engine side.
///
/// Labels are always billboarded to face the camera. Teardown happens in
/// three calls so the caller controls the order: texture and material are
/// released before the mesh is removed.
pub trait LabelFactory {
    /// Builds the texture, material and billboard mesh for a label.
    fn create_label(&mut self, spec: &LabelSpec) -> Result<LabelHandle, EnvError>;

    /// Releases the generated texture.
    fn release_texture(&mut self, label: LabelHandle);

    /// Releases the material that referenced the texture.
    fn release_material(&mut self, label: LabelHandle);

    /// Removes the billboard mesh from the scene.
    fn remove_mesh(&mut self, label: LabelHandle);
}
