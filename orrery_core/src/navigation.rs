//! Camera fly-to navigation.
//!
//! At most one navigation is active. Starting a new one stops the running
//! animation first, and a stopped navigation never reports completion.

use nalgebra::Vector3;
use orrery_env::{AnimationId, AnimationRunner, CameraAnimation, CameraState, EnvError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for the CameraNavigator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Distance kept between the camera and the target on arrival
    pub standoff: f64,

    /// Animation frames per unit of travel
    pub frames_per_unit: f64,

    pub min_frames: u32,
    pub max_frames: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            standoff: 4.0,
            frames_per_unit: 0.6,
            min_frames: 30,
            max_frames: 240,
        }
    }
}

impl NavigationConfig {
    /// Animation length for a trip of `distance` units.
    pub fn frames_for(&self, distance: f64) -> u32 {
        let raw = (distance * self.frames_per_unit).round();
        let clamped = raw.clamp(self.min_frames as f64, self.max_frames.max(self.min_frames) as f64);
        clamped as u32
    }
}

/// Sequence number of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NavigationId(pub u64);

/// A navigation that has been started.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTicket {
    pub id: NavigationId,
    pub animation: AnimationId,
    pub target_id: String,

    /// Where the camera will stop
    pub destination: Vector3<f64>,
    pub look_at: Vector3<f64>,
    pub frames: u32,

    /// The in-flight navigation this one replaced
    pub cancelled: Option<NavigationId>,
}

/// Completion signal of a navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationComplete {
    pub id: NavigationId,
    pub target_id: String,
    pub destination: Vector3<f64>,
}

/// Navigator state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NavigationState {
    #[default]
    Idle,
    Animating(NavigationTicket),
}

/// Flies the camera to particles.
#[derive(Debug, Default)]
pub struct CameraNavigator {
    config: NavigationConfig,
    state: NavigationState,
    next_id: u64,
    cancellations: u64,
}

impl CameraNavigator {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Stop point short of `target`, seen from `camera`.
    pub fn standoff_point(&self, camera: &CameraState, target: &Vector3<f64>) -> Vector3<f64> {
        let direction = (target - camera.position)
            .try_normalize(1e-9)
            .unwrap_or(camera.forward);
        target - direction * self.config.standoff
    }

    /// Starts a fly-to, cancelling the in-flight one.
    pub fn fly_to<A: AnimationRunner>(
        &mut self,
        camera: &CameraState,
        target_id: &str,
        target: Vector3<f64>,
        runner: &mut A,
    ) -> Result<NavigationTicket, EnvError> {
        let cancelled = self.cancel(runner);

        let destination = self.standoff_point(camera, &target);
        let distance = (destination - camera.position).norm();
        let frames = self.config.frames_for(distance);
        let look_from = camera.look_target(camera.distance_to(&target).max(1.0));

        let animation = CameraAnimation::linear(camera.position, destination, look_from, target, frames);
        let animation = runner.start(animation)?;

        self.next_id += 1;
        let ticket = NavigationTicket {
            id: NavigationId(self.next_id),
            animation,
            target_id: target_id.to_string(),
            destination,
            look_at: target,
            frames,
            cancelled,
        };
        info!(
            "Navigating to {} ({:.1} units, {} frames)",
            target_id, distance, frames
        );
        self.state = NavigationState::Animating(ticket.clone());
        Ok(ticket)
    }

    /// Stops the active navigation, if any. It will never complete.
    pub fn cancel<A: AnimationRunner>(&mut self, runner: &mut A) -> Option<NavigationId> {
        match std::mem::take(&mut self.state) {
            NavigationState::Animating(ticket) => {
                runner.stop(ticket.animation);
                self.cancellations += 1;
                debug!("Navigation {:?} to {} cancelled", ticket.id, ticket.target_id);
                Some(ticket.id)
            }
            NavigationState::Idle => None,
        }
    }

    /// Handles an animation-finished event from the engine.
    ///
    /// Fires at most once, and only for the active navigation's animation.
    pub fn on_animation_complete(&mut self, animation: AnimationId) -> Option<NavigationComplete> {
        match &self.state {
            NavigationState::Animating(ticket) if ticket.animation == animation => {}
            _ => {
                debug!("Ignoring completion of inactive animation {:?}", animation);
                return None;
            }
        }
        match std::mem::take(&mut self.state) {
            NavigationState::Animating(ticket) => Some(NavigationComplete {
                id: ticket.id,
                target_id: ticket.target_id,
                destination: ticket.destination,
            }),
            NavigationState::Idle => None,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, NavigationState::Animating(_))
    }

    /// Active navigation, if any.
    pub fn active(&self) -> Option<&NavigationTicket> {
        match &self.state {
            NavigationState::Animating(ticket) => Some(ticket),
            NavigationState::Idle => None,
        }
    }

    pub fn cancellations(&self) -> u64 {
        self.cancellations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAnimator;
    use approx::assert_relative_eq;
    use orrery_env::Viewport;

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
            Viewport::default(),
        )
    }

    #[test]
    fn test_standoff_stops_short_of_target() {
        let navigator = CameraNavigator::default();
        let point = navigator.standoff_point(&camera(), &Vector3::new(0.0, 0.0, -20.0));
        assert_relative_eq!(point, Vector3::new(0.0, 0.0, -16.0), epsilon = 1e-9);
    }

    #[test]
    fn test_camera_on_target_uses_forward() {
        let navigator = CameraNavigator::default();
        let point = navigator.standoff_point(&camera(), &Vector3::zeros());
        assert_relative_eq!(point, Vector3::new(0.0, 0.0, 4.0), epsilon = 1e-9);
    }

    #[test]
    fn test_frame_count_is_clamped() {
        let config = NavigationConfig::default();
        assert_eq!(config.frames_for(1.0), 30);
        assert_eq!(config.frames_for(100.0), 60);
        assert_eq!(config.frames_for(10_000.0), 240);
    }

    #[test]
    fn test_animation_runs_position_and_look_at_in_lockstep() {
        let mut navigator = CameraNavigator::default();
        let mut runner = MockAnimator::default();
        let ticket = navigator
            .fly_to(&camera(), "A", Vector3::new(0.0, 0.0, -104.0), &mut runner)
            .unwrap();

        let (_, animation) = &runner.started[0];
        assert_eq!(animation.position.last().unwrap().frame, ticket.frames);
        assert_eq!(animation.look_at.last().unwrap().frame, ticket.frames);
        assert_eq!(animation.look_at.last().unwrap().value, Vector3::new(0.0, 0.0, -104.0));
        assert_eq!(ticket.frames, 60);
    }

    #[test]
    fn test_second_fly_to_cancels_first() {
        let mut navigator = CameraNavigator::default();
        let mut runner = MockAnimator::default();

        let a = navigator
            .fly_to(&camera(), "A", Vector3::new(10.0, 0.0, 0.0), &mut runner)
            .unwrap();
        let b = navigator
            .fly_to(&camera(), "B", Vector3::new(0.0, 0.0, -30.0), &mut runner)
            .unwrap();

        assert_eq!(b.cancelled, Some(a.id));
        assert_eq!(runner.stopped, vec![a.animation]);

        // A stale completion for A must not fire
        assert!(navigator.on_animation_complete(a.animation).is_none());

        let done = navigator.on_animation_complete(b.animation).unwrap();
        assert_eq!(done.target_id, "B");
        assert_relative_eq!(done.destination, Vector3::new(0.0, 0.0, -26.0), epsilon = 1e-9);

        // At most once
        assert!(navigator.on_animation_complete(b.animation).is_none());
        assert!(!navigator.is_animating());
        assert_eq!(navigator.cancellations(), 1);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut navigator = CameraNavigator::default();
        let mut runner = MockAnimator::default();
        assert!(navigator.cancel(&mut runner).is_none());
        assert!(runner.stopped.is_empty());
    }
}
