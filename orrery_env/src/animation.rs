//! Keyframe animation interface for camera moves.
//!
//! The engine interpolates the camera position and look-at target linearly
//! between keyframes and reports completion by [`AnimationId`].

use crate::error::EnvError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Identifier of a running animation, unique per runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

/// A vector value at a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: u32,
    pub value: Vector3<f64>,
}

/// Camera position and look-at target animated in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraAnimation {
    pub position: Vec<Keyframe>,
    pub look_at: Vec<Keyframe>,
}

impl CameraAnimation {
    /// A single linear segment from frame 0 to `frames`.
    pub fn linear(
        from: Vector3<f64>,
        to: Vector3<f64>,
        look_from: Vector3<f64>,
        look_to: Vector3<f64>,
        frames: u32,
    ) -> Self {
        Self {
            position: vec![
                Keyframe { frame: 0, value: from },
                Keyframe { frame: frames, value: to },
            ],
            look_at: vec![
                Keyframe { frame: 0, value: look_from },
                Keyframe { frame: frames, value: look_to },
            ],
        }
    }

    /// Last frame of the animation.
    pub fn end_frame(&self) -> u32 {
        self.position
            .iter()
            .chain(self.look_at.iter())
            .map(|k| k.frame)
            .max()
            .unwrap_or(0)
    }

    /// Samples a keyframe track at `frame`, clamping outside its range.
    pub fn sample(track: &[Keyframe], frame: f64) -> Option<Vector3<f64>> {
        let first = track.first()?;
        if frame <= first.frame as f64 {
            return Some(first.value);
        }
        for pair in track.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if frame <= b.frame as f64 {
                let span = b.frame as f64 - a.frame as f64;
                if span <= 0.0 {
                    return Some(b.value);
                }
                let t = (frame - a.frame as f64) / span;
                return Some(a.value.lerp(&b.value, t));
            }
        }
        track.last().map(|k| k.value)
    }
}

/// Runs camera animations.
///
/// Implementations must never report completion for a stopped animation.
pub trait AnimationRunner {
    /// Starts an animation and returns its id.
    fn start(&mut self, animation: CameraAnimation) -> Result<AnimationId, EnvError>;

    /// Stops an animation; the camera stays where the last frame left it.
    fn stop(&mut self, id: AnimationId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_sampling() {
        let anim = CameraAnimation::linear(
            Vector3::zeros(),
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::zeros(),
            10,
        );
        assert_eq!(anim.end_frame(), 10);

        let mid = CameraAnimation::sample(&anim.position, 5.0).unwrap();
        assert_relative_eq!(mid.x, 5.0);

        let past = CameraAnimation::sample(&anim.position, 25.0).unwrap();
        assert_relative_eq!(past.x, 10.0);

        let before = CameraAnimation::sample(&anim.position, -3.0).unwrap();
        assert_relative_eq!(before.x, 0.0);
    }

    #[test]
    fn test_out_of_order_keyframes_do_not_panic() {
        let track = [
            Keyframe {
                frame: 0,
                value: Vector3::zeros(),
            },
            Keyframe {
                frame: 10,
                value: Vector3::new(10.0, 0.0, 0.0),
            },
            Keyframe {
                frame: 4,
                value: Vector3::new(4.0, 0.0, 0.0),
            },
        ];
        for frame in [0.0, 3.0, 7.0, 10.0, 12.0] {
            let value = CameraAnimation::sample(&track, frame).unwrap();
            assert!(value.x.is_finite());
        }
        assert_relative_eq!(CameraAnimation::sample(&track, 12.0).unwrap().x, 4.0);
    }

    #[test]
    fn test_empty_track_samples_none() {
        assert!(CameraAnimation::sample(&[], 1.0).is_none());
    }
}
