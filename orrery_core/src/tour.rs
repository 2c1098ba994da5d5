//! Guided tour - fly through a list of stops, pausing at each.
//!
//! The tour is sequenced by navigation completion: a stop only counts as
//! reached when the navigation started for it completes. Any manual selection
//! cancels the navigation and therefore the tour.

use crate::index::{IndexError, ParticleIndex};
use crate::navigation::{NavigationComplete, NavigationId};
use crate::particle::Particle;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for the GuidedTour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourConfig {
    /// Frames spent at each stop before moving on (default: 90)
    pub dwell_frames: u32,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self { dwell_frames: 90 }
    }
}

/// Which particles a tour visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TourPlan {
    /// These ids, in this order
    Stops(Vec<String>),

    /// The `limit` most important visible particles (ties by name)
    MostImportant { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TourState {
    Inactive,

    /// Waiting for the navigation to `stop` to be started
    Departing { stop: usize },

    Flying { stop: usize, navigation: NavigationId },

    Dwelling { stop: usize, remaining: u32 },
}

/// What the viewer should do after a tour tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourStep {
    /// Fly to the next stop
    Next(String),

    /// Last stop reached and dwelt on
    Finished,
}

#[derive(Debug)]
pub struct GuidedTour {
    config: TourConfig,
    stops: Vec<String>,
    state: TourState,
    visited: Vec<String>,
}

impl Default for GuidedTour {
    fn default() -> Self {
        Self::new(TourConfig::default())
    }
}

impl GuidedTour {
    pub fn new(config: TourConfig) -> Self {
        Self {
            config,
            stops: Vec::new(),
            state: TourState::Inactive,
            visited: Vec::new(),
        }
    }

    /// Resolves a plan and returns the first stop to fly to.
    ///
    /// Returns `Ok(None)` for a plan with no stops.
    pub fn start(&mut self, plan: &TourPlan, index: &ParticleIndex) -> Result<Option<String>, IndexError> {
        let stops = resolve_stops(plan, index)?;
        self.visited.clear();
        self.stops = stops;

        if self.stops.is_empty() {
            self.state = TourState::Inactive;
            return Ok(None);
        }
        info!("Guided tour started with {} stops", self.stops.len());
        self.state = TourState::Departing { stop: 0 };
        Ok(self.stops.first().cloned())
    }

    /// Records the navigation started for the current stop.
    pub fn departed(&mut self, navigation: NavigationId) {
        if let TourState::Departing { stop } = self.state {
            self.state = TourState::Flying { stop, navigation };
        }
    }

    /// Handles a navigation completion; true if it was the tour's.
    pub fn on_arrival(&mut self, complete: &NavigationComplete) -> bool {
        match self.state {
            TourState::Flying { stop, navigation } if navigation == complete.id => {
                self.visited.push(complete.target_id.clone());
                self.state = TourState::Dwelling {
                    stop,
                    remaining: self.config.dwell_frames,
                };
                true
            }
            _ => false,
        }
    }

    /// Advances the dwell timer by one frame.
    pub fn tick(&mut self) -> Option<TourStep> {
        let TourState::Dwelling { stop, remaining } = self.state else {
            return None;
        };
        if remaining > 1 {
            self.state = TourState::Dwelling {
                stop,
                remaining: remaining - 1,
            };
            return None;
        }

        let next = stop + 1;
        match self.stops.get(next) {
            Some(id) => {
                self.state = TourState::Departing { stop: next };
                Some(TourStep::Next(id.clone()))
            }
            None => {
                info!("Guided tour finished after {} stops", self.visited.len());
                self.state = TourState::Inactive;
                Some(TourStep::Finished)
            }
        }
    }

    /// Stops the tour; true if one was running.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        if was_active {
            info!("Guided tour cancelled");
        }
        self.state = TourState::Inactive;
        self.stops.clear();
        was_active
    }

    pub fn is_active(&self) -> bool {
        self.state != TourState::Inactive
    }

    pub fn state(&self) -> &TourState {
        &self.state
    }

    pub fn stops(&self) -> &[String] {
        &self.stops
    }

    /// Stops reached so far, in order.
    pub fn visited(&self) -> &[String] {
        &self.visited
    }
}

fn resolve_stops(plan: &TourPlan, index: &ParticleIndex) -> Result<Vec<String>, IndexError> {
    match plan {
        TourPlan::Stops(ids) => ids
            .iter()
            .map(|id| {
                index
                    .by_name(id)
                    .map(|p| p.id().to_string())
                    .ok_or_else(|| IndexError::ParticleNotFound(id.clone()))
            })
            .collect(),
        TourPlan::MostImportant { limit } => {
            let mut particles: Vec<&Particle> = index.visible().collect();
            particles.sort_by(|a, b| a.importance().cmp(&b.importance()).then(a.id().cmp(b.id())));
            Ok(particles
                .into_iter()
                .take(*limit)
                .map(|p| p.id().to_string())
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{Palette, PaletteConfig};
    use crate::particle::ParticleRecord;
    use nalgebra::Vector3;

    fn index() -> ParticleIndex {
        let records = vec![
            ParticleRecord::new("minor", "Tool", Vector3::zeros()).with_level(9),
            ParticleRecord::new("beta", "Tool", Vector3::new(10.0, 0.0, 0.0)).with_level(1),
            ParticleRecord::new("alpha", "Tool", Vector3::new(20.0, 0.0, 0.0)).with_level(1),
            ParticleRecord::new("mid", "Tool", Vector3::new(30.0, 0.0, 0.0)).with_level(4),
        ];
        ParticleIndex::from_records(&records, &Palette::new(PaletteConfig::default(), 0)).unwrap()
    }

    fn arrive(tour: &mut GuidedTour, id: u64, target: &str) -> bool {
        tour.on_arrival(&NavigationComplete {
            id: NavigationId(id),
            target_id: target.to_string(),
            destination: Vector3::zeros(),
        })
    }

    #[test]
    fn test_most_important_plan_orders_by_level_then_name() {
        let stops = resolve_stops(&TourPlan::MostImportant { limit: 3 }, &index()).unwrap();
        assert_eq!(stops, vec!["alpha", "beta", "mid"]);
    }

    #[test]
    fn test_unknown_stop_is_rejected() {
        let mut tour = GuidedTour::default();
        let plan = TourPlan::Stops(vec!["alpha".into(), "ghost".into()]);
        assert_eq!(
            tour.start(&plan, &index()),
            Err(IndexError::ParticleNotFound("ghost".to_string()))
        );
        assert!(!tour.is_active());
    }

    #[test]
    fn test_tour_visits_every_stop_in_order() {
        let mut tour = GuidedTour::new(TourConfig { dwell_frames: 2 });
        let plan = TourPlan::Stops(vec!["mid".into(), "minor".into()]);
        assert_eq!(tour.start(&plan, &index()).unwrap().as_deref(), Some("mid"));

        tour.departed(NavigationId(1));
        assert!(arrive(&mut tour, 1, "mid"));
        assert_eq!(tour.tick(), None);
        assert_eq!(tour.tick(), Some(TourStep::Next("minor".to_string())));

        tour.departed(NavigationId(2));
        // A completion for some other navigation is not an arrival
        assert!(!arrive(&mut tour, 7, "elsewhere"));
        assert!(arrive(&mut tour, 2, "minor"));
        tour.tick();
        assert_eq!(tour.tick(), Some(TourStep::Finished));

        assert_eq!(tour.visited(), &["mid".to_string(), "minor".to_string()]);
        assert!(!tour.is_active());
    }

    #[test]
    fn test_cancel_stops_the_tour() {
        let mut tour = GuidedTour::default();
        tour.start(&TourPlan::MostImportant { limit: 2 }, &index()).unwrap();
        tour.departed(NavigationId(1));
        assert!(tour.cancel());
        assert!(!arrive(&mut tour, 1, "alpha"));
        assert_eq!(tour.tick(), None);
    }
}
