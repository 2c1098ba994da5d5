//! Nearest-neighbour ranking for the side panel.

use crate::index::{IndexError, ParticleIndex};
use serde::{Deserialize, Serialize};

/// One row of the proximity panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNeighbor {
    pub id: String,
    pub category: String,
    pub distance: f64,
}

/// Visible particles nearest to `reference_id`, by original position.
///
/// The reference itself is excluded; ties keep input order.
pub fn rank_nearest(
    index: &ParticleIndex,
    reference_id: &str,
    limit: usize,
) -> Result<Vec<RankedNeighbor>, IndexError> {
    let reference = index
        .by_name(reference_id)
        .ok_or_else(|| IndexError::ParticleNotFound(reference_id.to_string()))?;
    let origin = reference.original_position();

    let mut ranked: Vec<RankedNeighbor> = index
        .visible()
        .filter(|p| p.id() != reference_id)
        .map(|p| RankedNeighbor {
            id: p.id().to_string(),
            category: p.category().to_string(),
            distance: (p.original_position() - origin).norm(),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked.truncate(limit);
    Ok(ranked)
}
