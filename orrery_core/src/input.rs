//! Device input adapters.
//!
//! Desktop and VR events are reduced to a handful of intents before they
//! reach the viewer, so picking and selection have a single code path.

use nalgebra::Vector3;
use orrery_env::{CameraState, Ray, ScreenPoint};
use serde::{Deserialize, Serialize};

/// Raw input from the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Mouse moved over the canvas
    PointerMoved { screen: ScreenPoint },

    /// Mouse left the canvas
    PointerLeft,

    /// Mouse click
    Click { screen: ScreenPoint },

    /// VR controller pose changed
    ControllerAim { ray: Ray },

    /// VR controller trigger
    TriggerPressed { ray: Ray },

    /// Dwell/gaze confirmation: select what is at the screen centre
    GazeSelect,

    /// Thumbstick deflection, each axis in [-1, 1]; +y is forward
    Thumbstick { x: f64, y: f64 },
}

/// What an event asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputIntent {
    /// Replace the aim ray used for continuous targeting
    Aim(Ray),

    /// Nothing is pointed at anymore
    ClearAim,

    /// Immediate ray pick and selection
    SelectRay(Ray),

    /// Immediate screen-centre pick and selection
    SelectCenter,

    /// Host should move the camera by this much
    Move(Vector3<f64>),

    Ignore,
}

/// Configuration for thumbstick locomotion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Axis values below this magnitude are ignored
    pub deadzone: f64,

    /// Units moved per frame at full deflection
    pub move_speed: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.15,
            move_speed: 0.5,
        }
    }
}

/// Maps a device event to an intent.
pub fn translate(event: &InputEvent, camera: &CameraState, config: &InputConfig) -> InputIntent {
    match *event {
        InputEvent::PointerMoved { screen } => match camera.viewport_ray(screen) {
            Some(ray) => InputIntent::Aim(ray),
            None => InputIntent::ClearAim,
        },
        InputEvent::PointerLeft => InputIntent::ClearAim,
        InputEvent::Click { screen } => camera
            .viewport_ray(screen)
            .map_or(InputIntent::Ignore, InputIntent::SelectRay),
        InputEvent::ControllerAim { ray } => InputIntent::Aim(ray),
        InputEvent::TriggerPressed { ray } => InputIntent::SelectRay(ray),
        InputEvent::GazeSelect => InputIntent::SelectCenter,
        InputEvent::Thumbstick { x, y } => {
            let axis = |v: f64| if v.abs() < config.deadzone { 0.0 } else { v.clamp(-1.0, 1.0) };
            let (x, y) = (axis(x), axis(y));
            if x == 0.0 && y == 0.0 {
                return InputIntent::Ignore;
            }
            let (right, _) = camera.basis();
            InputIntent::Move((camera.forward * y + right * x) * config.move_speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orrery_env::Viewport;

    fn camera() -> CameraState {
        CameraState::looking_at(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            1.0,
            Viewport::new(800.0, 600.0),
        )
    }

    #[test]
    fn test_click_at_center_selects_along_forward() {
        let intent = translate(
            &InputEvent::Click {
                screen: ScreenPoint::new(400.0, 300.0),
            },
            &camera(),
            &InputConfig::default(),
        );
        match intent {
            InputIntent::SelectRay(ray) => {
                assert_relative_eq!(ray.direction, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-9)
            }
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_thumbstick_deadzone_and_direction() {
        let config = InputConfig::default();
        assert_eq!(
            translate(&InputEvent::Thumbstick { x: 0.1, y: -0.05 }, &camera(), &config),
            InputIntent::Ignore
        );

        match translate(&InputEvent::Thumbstick { x: 0.0, y: 1.0 }, &camera(), &config) {
            InputIntent::Move(delta) => assert_relative_eq!(delta, Vector3::new(0.0, 0.0, -0.5), epsilon = 1e-9),
            other => panic!("unexpected intent {:?}", other),
        }
    }

    #[test]
    fn test_vr_events_pass_rays_through() {
        let ray = Ray::new(Vector3::new(1.0, 2.0, 3.0), Vector3::x()).unwrap();
        let config = InputConfig::default();
        assert_eq!(
            translate(&InputEvent::ControllerAim { ray }, &camera(), &config),
            InputIntent::Aim(ray)
        );
        assert_eq!(
            translate(&InputEvent::TriggerPressed { ray }, &camera(), &config),
            InputIntent::SelectRay(ray)
        );
        assert_eq!(
            translate(&InputEvent::GazeSelect, &camera(), &config),
            InputIntent::SelectCenter
        );
    }
}
