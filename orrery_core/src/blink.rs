//! Selection blink, as a per-particle state machine.
//!
//! `Idle -> Blinking(step) -> Idle`, advanced by the frame tick. A blink
//! alternates lit/unlit phases of `frames_per_phase` frames for `cycles`
//! cycles. Starting a blink on a particle that is already blinking restarts
//! it rather than stacking a second one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for the BlinkController
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkConfig {
    pub frames_per_phase: u32,
    pub cycles: u32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            frames_per_phase: 8,
            cycles: 3,
        }
    }
}

impl BlinkConfig {
    /// Frames from start to Idle.
    pub fn total_steps(&self) -> u32 {
        self.frames_per_phase.max(1) * 2 * self.cycles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlinkState {
    Idle,
    Blinking { step: u32 },
}

/// Blink state for every particle currently blinking.
#[derive(Debug, Default)]
pub struct BlinkController {
    config: BlinkConfig,
    active: BTreeMap<String, u32>,
}

impl BlinkController {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
        }
    }

    /// Starts (or restarts) a blink on a particle.
    pub fn start(&mut self, particle_id: &str) {
        if self.config.total_steps() == 0 {
            return;
        }
        self.active.insert(particle_id.to_string(), 0);
    }

    /// Advances every blink by one frame; returns ids that went back to Idle.
    pub fn tick(&mut self) -> Vec<String> {
        let total = self.config.total_steps();
        let mut finished = Vec::new();
        self.active.retain(|id, step| {
            *step += 1;
            if *step >= total {
                finished.push(id.clone());
                false
            } else {
                true
            }
        });
        finished
    }

    pub fn state(&self, particle_id: &str) -> BlinkState {
        match self.active.get(particle_id) {
            Some(&step) => BlinkState::Blinking { step },
            None => BlinkState::Idle,
        }
    }

    /// True during the lit phase of a blink.
    pub fn is_lit(&self, particle_id: &str) -> bool {
        match self.state(particle_id) {
            BlinkState::Blinking { step } => (step / self.config.frames_per_phase.max(1)) % 2 == 0,
            BlinkState::Idle => false,
        }
    }

    /// Drops every blink (reload); returns how many were running.
    pub fn clear(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
