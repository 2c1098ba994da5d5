//! Particles - the labeled points of the dataset.
//!
//! Input records arrive as loosely typed JSON rows (`x, y, z, subType,
//! prefLabel, level?, imageFile?`). They are validated once at load time so
//! that nothing malformed is discovered mid-frame.

use nalgebra::Vector3;
use orrery_env::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// IMPORTANCE
// ============================================================================

/// Integer rank of a particle; lower values are more central.
///
/// Always clamped to `MIN..=MAX`, whatever the input says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportanceLevel(u8);

impl ImportanceLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 13;
    pub const DEFAULT: u8 = 5;

    /// Clamps a raw level into the valid range.
    pub fn new(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    /// Clamps an optional level, defaulting when absent.
    pub fn from_optional(raw: Option<i64>) -> Self {
        raw.map(Self::new).unwrap_or_default()
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// True for the most important level.
    pub fn is_primary(&self) -> bool {
        self.0 == Self::MIN
    }

    /// 0.0 for the most important level, 1.0 for the least.
    pub fn rank_fraction(&self) -> f64 {
        (self.0 - Self::MIN) as f64 / (Self::MAX - Self::MIN) as f64
    }
}

impl Default for ImportanceLevel {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

// ============================================================================
// INPUT RECORD
// ============================================================================

/// One row of the input dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Category tag (`subType` in taxonomy exports)
    #[serde(alias = "subType", default)]
    pub category: String,

    /// Unique display name (`prefLabel` in taxonomy exports)
    #[serde(alias = "prefLabel", alias = "label", default)]
    pub id: String,

    /// Optional importance level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,

    /// Optional billboard image overriding the importance tier default
    #[serde(rename = "imageFile", alias = "image_file", default, skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
}

impl ParticleRecord {
    pub fn new(id: &str, category: &str, position: Vector3<f64>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            category: category.to_string(),
            id: id.to_string(),
            level: None,
            image_file: None,
        }
    }

    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Errors that reject a dataset before anything is rebuilt.
#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("Dataset is empty")]
    Empty,

    #[error("Record {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Record {index} ({id}) has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize, id: String },

    #[error("Duplicate particle id: {0}")]
    DuplicateId(String),

    #[error("Expected {expected} positions, got {actual}")]
    PositionCountMismatch { expected: usize, actual: usize },
}

/// Checks every record; the first problem found is returned.
pub fn validate_records(records: &[ParticleRecord]) -> Result<(), DatasetError> {
    if records.is_empty() {
        return Err(DatasetError::Empty);
    }

    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        if record.id.trim().is_empty() {
            return Err(DatasetError::MissingField { index, field: "id" });
        }
        if record.category.trim().is_empty() {
            return Err(DatasetError::MissingField { index, field: "category" });
        }
        if !(record.x.is_finite() && record.y.is_finite() && record.z.is_finite()) {
            return Err(DatasetError::NonFiniteCoordinate {
                index,
                id: record.id.clone(),
            });
        }
        if !seen.insert(record.id.as_str()) {
            return Err(DatasetError::DuplicateId(record.id.clone()));
        }
    }
    Ok(())
}

// ============================================================================
// PARTICLE
// ============================================================================

/// One visual entity of the point cloud.
///
/// Position and visibility have crate-private setters: only the orbital
/// motion model writes `current_position` and only category filtering writes
/// `visible`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    id: String,
    original_position: Vector3<f64>,
    current_position: Vector3<f64>,
    category: String,
    importance: ImportanceLevel,
    color: Rgb,
    sprite_image: String,
    visible: bool,
}

impl Particle {
    pub(crate) fn new(
        id: String,
        position: Vector3<f64>,
        category: String,
        importance: ImportanceLevel,
        color: Rgb,
        sprite_image: String,
    ) -> Self {
        Self {
            id,
            original_position: position,
            current_position: position,
            category,
            importance,
            color,
            sprite_image,
            visible: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position after relaxation; never changes afterwards.
    pub fn original_position(&self) -> &Vector3<f64> {
        &self.original_position
    }

    /// Animated position for the current frame.
    pub fn current_position(&self) -> &Vector3<f64> {
        &self.current_position
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn importance(&self) -> ImportanceLevel {
        self.importance
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn sprite_image(&self) -> &str {
        &self.sprite_image
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_current_position(&mut self, position: Vector3<f64>) {
        self.current_position = position;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ParticleRecord {
        ParticleRecord::new(id, "Language", Vector3::new(1.0, 2.0, 3.0))
    }

    #[test]
    fn test_importance_clamping() {
        assert_eq!(ImportanceLevel::new(0).get(), 1);
        assert_eq!(ImportanceLevel::new(-4).get(), 1);
        assert_eq!(ImportanceLevel::new(99).get(), 13);
        assert_eq!(ImportanceLevel::from_optional(None).get(), 5);
        assert_eq!(ImportanceLevel::from_optional(Some(3)).get(), 3);
        assert!(ImportanceLevel::new(1).is_primary());
    }

    #[test]
    fn test_rank_fraction_bounds() {
        assert_eq!(ImportanceLevel::new(1).rank_fraction(), 0.0);
        assert_eq!(ImportanceLevel::new(13).rank_fraction(), 1.0);
    }

    #[test]
    fn test_record_accepts_taxonomy_field_names() {
        let json = r#"{"x": 1.0, "y": 2.0, "z": 3.0, "subType": "Framework",
                       "prefLabel": "Actix", "level": 2, "imageFile": "major.png"}"#;
        let record: ParticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "Actix");
        assert_eq!(record.category, "Framework");
        assert_eq!(record.level, Some(2));
        assert_eq!(record.image_file.as_deref(), Some("major.png"));
    }

    #[test]
    fn test_validate_rejects_bad_records() {
        assert_eq!(validate_records(&[]), Err(DatasetError::Empty));

        let mut nan = record("a");
        nan.y = f64::NAN;
        assert!(matches!(
            validate_records(&[nan]),
            Err(DatasetError::NonFiniteCoordinate { index: 0, .. })
        ));

        let unnamed = record("  ");
        assert_eq!(
            validate_records(&[unnamed]),
            Err(DatasetError::MissingField { index: 0, field: "id" })
        );

        assert_eq!(
            validate_records(&[record("a"), record("a")]),
            Err(DatasetError::DuplicateId("a".to_string()))
        );

        assert!(validate_records(&[record("a"), record("b")]).is_ok());
    }
}
