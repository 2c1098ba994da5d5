//! Headless animation runner that owns the simulated camera pose.

use nalgebra::Vector3;
use orrery_env::{AnimationId, AnimationRunner, CameraAnimation, EnvError};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Running {
    animation: CameraAnimation,
    frame: u32,
}

/// Plays camera animations one frame per [`SimAnimator::advance`].
#[derive(Debug)]
pub struct SimAnimator {
    running: BTreeMap<AnimationId, Running>,
    next_id: u64,
    position: Vector3<f64>,
    look_at: Vector3<f64>,

    pub started: u64,
    pub stopped: u64,
    pub completed: u64,
}

impl SimAnimator {
    pub fn new(position: Vector3<f64>, look_at: Vector3<f64>) -> Self {
        Self {
            running: BTreeMap::new(),
            next_id: 0,
            position,
            look_at,
            started: 0,
            stopped: 0,
            completed: 0,
        }
    }

    /// Steps every running animation; returns the ones that finished.
    pub fn advance(&mut self) -> Vec<AnimationId> {
        let mut finished = Vec::new();
        for (id, running) in self.running.iter_mut() {
            running.frame += 1;
            let frame = running.frame as f64;
            if let Some(position) = CameraAnimation::sample(&running.animation.position, frame) {
                self.position = position;
            }
            if let Some(look_at) = CameraAnimation::sample(&running.animation.look_at, frame) {
                self.look_at = look_at;
            }
            if running.frame >= running.animation.end_frame() {
                finished.push(*id);
            }
        }
        for id in &finished {
            self.running.remove(id);
        }
        self.completed += finished.len() as u64;
        finished
    }

    /// Moves the camera directly (locomotion).
    pub fn translate(&mut self, delta: Vector3<f64>) {
        self.position += delta;
        self.look_at += delta;
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn look_at(&self) -> Vector3<f64> {
        self.look_at
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}

impl AnimationRunner for SimAnimator {
    fn start(&mut self, animation: CameraAnimation) -> Result<AnimationId, EnvError> {
        if animation.position.is_empty() || animation.look_at.is_empty() {
            return Err(EnvError::animation("animation has an empty track"));
        }
        self.next_id += 1;
        let id = AnimationId(self.next_id);
        self.running.insert(id, Running { animation, frame: 0 });
        self.started += 1;
        Ok(id)
    }

    fn stop(&mut self, id: AnimationId) {
        if self.running.remove(&id).is_some() {
            self.stopped += 1;
        }
    }
}
