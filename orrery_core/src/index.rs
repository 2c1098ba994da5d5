//! ParticleIndex - the canonical particle set.
//!
//! Built once per dataset load. Lookups by name are O(1); `visible()` is a
//! plain filter over the visibility flags so it always reflects the latest
//! category toggle.

use crate::palette::Palette;
use crate::particle::{validate_records, DatasetError, ImportanceLevel, Particle, ParticleRecord};
use nalgebra::Vector3;
use orrery_env::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors from index queries.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("No such particle: {0}")]
    ParticleNotFound(String),

    #[error("No such category: {0}")]
    CategoryNotFound(String),
}

/// Result of flipping a category filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryToggle {
    pub category: String,

    /// Visibility of the category after the toggle
    pub visible: bool,

    /// Number of particles whose flag changed
    pub affected: usize,
}

/// One row of the legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub category: String,
    pub color: Rgb,
    pub count: usize,
    pub visible: bool,
}

/// The particle set of the current dataset.
#[derive(Debug, Clone, Default)]
pub struct ParticleIndex {
    /// Particles in input order
    particles: Vec<Particle>,

    /// id -> position in `particles`
    by_id: HashMap<String, usize>,

    /// Category -> particle count
    categories: BTreeMap<String, usize>,

    /// Categories switched off in the legend
    hidden_categories: BTreeSet<String>,
}

impl ParticleIndex {
    /// Builds the index from records using their own coordinates.
    pub fn from_records(records: &[ParticleRecord], palette: &Palette) -> Result<Self, DatasetError> {
        let positions: Vec<Vector3<f64>> = records.iter().map(ParticleRecord::position).collect();
        Self::build(records, &positions, palette)
    }

    /// Builds the index from records and relaxed positions (same order).
    pub fn build(
        records: &[ParticleRecord],
        positions: &[Vector3<f64>],
        palette: &Palette,
    ) -> Result<Self, DatasetError> {
        validate_records(records)?;
        if positions.len() != records.len() {
            return Err(DatasetError::PositionCountMismatch {
                expected: records.len(),
                actual: positions.len(),
            });
        }
        if let Some(index) = positions
            .iter()
            .position(|p| !p.iter().all(|c| c.is_finite()))
        {
            return Err(DatasetError::NonFiniteCoordinate {
                index,
                id: records[index].id.clone(),
            });
        }

        let mut particles = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        let mut categories = BTreeMap::new();

        for (i, (record, position)) in records.iter().zip(positions).enumerate() {
            let importance = ImportanceLevel::from_optional(record.level);
            let color = palette.color_for(&record.category, importance);
            let sprite = palette.sprite_for(importance, record.image_file.as_deref());

            particles.push(Particle::new(
                record.id.clone(),
                *position,
                record.category.clone(),
                importance,
                color,
                sprite,
            ));
            by_id.insert(record.id.clone(), i);
            *categories.entry(record.category.clone()).or_insert(0) += 1;
        }

        Ok(Self {
            particles,
            by_id,
            categories,
            hidden_categories: BTreeSet::new(),
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// All particles in input order.
    pub fn all(&self) -> &[Particle] {
        &self.particles
    }

    /// Particles whose category is switched on.
    pub fn visible(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.is_visible())
    }

    /// Indices of visible particles.
    pub fn visible_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_visible())
            .map(|(i, _)| i)
    }

    /// O(1) lookup by particle id.
    pub fn by_name(&self, id: &str) -> Option<&Particle> {
        self.by_id.get(id).map(|&i| &self.particles[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    // ========================================================================
    // FILTERING
    // ========================================================================

    /// Flips a category between shown and hidden.
    pub fn toggle_category(&mut self, category: &str) -> Result<CategoryToggle, IndexError> {
        if !self.categories.contains_key(category) {
            return Err(IndexError::CategoryNotFound(category.to_string()));
        }

        let visible = if self.hidden_categories.remove(category) {
            true
        } else {
            self.hidden_categories.insert(category.to_string());
            false
        };

        let mut affected = 0;
        for particle in self.particles.iter_mut().filter(|p| p.category() == category) {
            if particle.is_visible() != visible {
                particle.set_visible(visible);
                affected += 1;
            }
        }

        Ok(CategoryToggle {
            category: category.to_string(),
            visible,
            affected,
        })
    }

    pub fn is_category_visible(&self, category: &str) -> bool {
        self.categories.contains_key(category) && !self.hidden_categories.contains(category)
    }

    /// Legend rows sorted by category name.
    pub fn legend(&self, palette: &Palette) -> Vec<LegendEntry> {
        self.categories
            .iter()
            .map(|(category, &count)| LegendEntry {
                category: category.clone(),
                color: palette.category_color(category),
                count,
                visible: !self.hidden_categories.contains(category),
            })
            .collect()
    }

    /// Sorted names of visible particles (search datalist).
    pub fn visible_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.visible().map(Particle::id).collect();
        names.sort_unstable();
        names
    }

    // ========================================================================
    // MOTION WRITES
    // ========================================================================

    pub(crate) fn set_current_position(&mut self, index: usize, position: Vector3<f64>) {
        if let Some(particle) = self.particles.get_mut(index) {
            particle.set_current_position(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteConfig;

    fn sample_records() -> Vec<ParticleRecord> {
        vec![
            ParticleRecord::new("Rust", "Language", Vector3::new(0.0, 0.0, 0.0)).with_level(1),
            ParticleRecord::new("Go", "Language", Vector3::new(5.0, 0.0, 0.0)).with_level(2),
            ParticleRecord::new("Tokio", "Framework", Vector3::new(0.0, 5.0, 0.0)),
            ParticleRecord::new("Cargo", "Tool", Vector3::new(0.0, 0.0, 5.0)).with_level(40),
        ]
    }

    fn palette() -> Palette {
        Palette::new(PaletteConfig::default(), 7)
    }

    #[test]
    fn test_by_name_returns_created_particle() {
        let records = sample_records();
        let index = ParticleIndex::from_records(&records, &palette()).unwrap();

        for (i, record) in records.iter().enumerate() {
            let particle = index.by_name(&record.id).unwrap();
            assert!(std::ptr::eq(particle, &index.all()[i]));
            assert_eq!(particle.original_position(), &record.position());
        }
        assert!(index.by_name("Haskell").is_none());
    }

    #[test]
    fn test_levels_are_clamped_and_defaulted() {
        let index = ParticleIndex::from_records(&sample_records(), &palette()).unwrap();
        assert_eq!(index.by_name("Tokio").unwrap().importance().get(), 5);
        assert_eq!(index.by_name("Cargo").unwrap().importance().get(), 13);
    }

    #[test]
    fn test_toggle_twice_restores_visibility() {
        let mut index = ParticleIndex::from_records(&sample_records(), &palette()).unwrap();
        let before: Vec<bool> = index.all().iter().map(Particle::is_visible).collect();

        let first = index.toggle_category("Language").unwrap();
        assert!(!first.visible);
        assert_eq!(first.affected, 2);
        assert_eq!(index.visible().count(), 2);
        assert!(!index.is_category_visible("Language"));

        let second = index.toggle_category("Language").unwrap();
        assert!(second.visible);
        let after: Vec<bool> = index.all().iter().map(Particle::is_visible).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_unknown_category_toggle_fails() {
        let mut index = ParticleIndex::from_records(&sample_records(), &palette()).unwrap();
        assert_eq!(
            index.toggle_category("Hardware"),
            Err(IndexError::CategoryNotFound("Hardware".to_string()))
        );
    }

    #[test]
    fn test_legend_and_datalist() {
        let mut index = ParticleIndex::from_records(&sample_records(), &palette()).unwrap();
        index.toggle_category("Tool").unwrap();

        let legend = index.legend(&palette());
        let names: Vec<&str> = legend.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(names, vec!["Framework", "Language", "Tool"]);
        assert_eq!(legend[1].count, 2);
        assert!(!legend[2].visible);

        assert_eq!(index.visible_names(), vec!["Go", "Rust", "Tokio"]);
    }

    #[test]
    fn test_build_rejects_mismatched_positions() {
        let records = sample_records();
        let err = ParticleIndex::build(&records, &[Vector3::zeros()], &palette()).unwrap_err();
        assert_eq!(
            err,
            DatasetError::PositionCountMismatch {
                expected: 4,
                actual: 1
            }
        );
    }
}
