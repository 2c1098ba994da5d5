//! Synthetic taxonomy datasets and JSON dataset loading.

use nalgebra::Vector3;
use orrery_core::particle::validate_records;
use orrery_core::{DatasetError, ParticleRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Categories used for generated particles.
const CATEGORIES: &[&str] = &["Technology", "Platform", "Framework", "Language", "Tool", "Concept"];

#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid dataset: {0}")]
    Dataset(#[from] DatasetError),
}

/// Generates clustered datasets: a level-1 hub per cluster with satellites
/// scattered around it.
pub struct DatasetGenerator {
    rng: ChaCha8Rng,

    /// Number of clusters
    pub clusters: usize,

    /// Standard deviation of satellite offsets
    pub spread: f64,

    /// Cluster centres lie in [-extent, extent]³
    pub extent: f64,
}

impl DatasetGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            clusters: 6,
            spread: 6.0,
            extent: 60.0,
        }
    }

    pub fn with_clusters(mut self, clusters: usize) -> Self {
        self.clusters = clusters.max(1);
        self
    }

    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread.abs();
        self
    }

    /// Generates `count` records.
    pub fn generate(&mut self, count: usize) -> Vec<ParticleRecord> {
        let extent = self.extent;
        let centers: Vec<Vector3<f64>> = (0..self.clusters)
            .map(|_| {
                Vector3::new(
                    self.rng.gen_range(-extent..=extent),
                    self.rng.gen_range(-extent..=extent),
                    self.rng.gen_range(-extent..=extent),
                )
            })
            .collect();

        (0..count)
            .map(|i| {
                let cluster = i % centers.len();
                let category = CATEGORIES[cluster % CATEGORIES.len()];
                let id = format!("{}-{:04}", category.to_lowercase(), i);

                if i < centers.len() {
                    return ParticleRecord::new(&id, category, centers[cluster]).with_level(1);
                }

                let offset = Vector3::new(self.normal(), self.normal(), self.normal()) * self.spread;
                let record = ParticleRecord::new(&id, category, centers[cluster] + offset);
                // Some records carry no level and fall back to the default
                if i % 10 == 0 {
                    record
                } else {
                    record.with_level(self.rng.gen_range(2..=9))
                }
            })
            .collect()
    }

    fn normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

/// `count` records stacked on one point.
pub fn coincident(count: usize, position: Vector3<f64>) -> Vec<ParticleRecord> {
    (0..count)
        .map(|i| ParticleRecord::new(&format!("stack-{:02}", i), "Concept", position))
        .collect()
}

/// Reads and validates a JSON array of records.
pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<ParticleRecord>, SimError> {
    let text = fs::read_to_string(path)?;
    let records: Vec<ParticleRecord> = serde_json::from_str(&text)?;
    validate_records(&records)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generation_is_deterministic_and_valid() {
        let a = DatasetGenerator::new(42).generate(120);
        let b = DatasetGenerator::new(42).generate(120);
        assert_eq!(a, b);
        assert!(validate_records(&a).is_ok());

        let hubs = a.iter().filter(|r| r.level == Some(1)).count();
        assert_eq!(hubs, 6);
    }

    #[test]
    fn test_load_json_validates() {
        let dir = std::env::temp_dir();
        let good = dir.join("orrery_sim_dataset_good.json");
        fs::write(
            &good,
            r#"[{"x": 0, "y": 1, "z": 2, "subType": "Tool", "prefLabel": "cargo", "level": 2}]"#,
        )
        .unwrap();
        let records = load_json(&good).unwrap();
        assert_eq!(records[0].id, "cargo");

        let bad = dir.join("orrery_sim_dataset_bad.json");
        fs::write(&bad, "[]").unwrap();
        assert!(matches!(load_json(&bad), Err(SimError::Dataset(DatasetError::Empty))));

        let _ = fs::remove_file(good);
        let _ = fs::remove_file(bad);
    }

    proptest! {
        #[test]
        fn prop_generated_datasets_load(
            seed in any::<u64>(),
            clusters in 1usize..12,
            count in 1usize..200,
        ) {
            let records = DatasetGenerator::new(seed).with_clusters(clusters).generate(count);

            prop_assert_eq!(records.len(), count);
            prop_assert!(validate_records(&records).is_ok());
            let hubs = records.iter().filter(|r| r.level == Some(1)).count();
            prop_assert_eq!(hubs, clusters.min(count));
        }
    }
}
