//! Production implementation of ViewerContext backed by the system clock.

use crate::ViewerContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by `Instant` and a per-session random seed.
///
/// The seed is drawn from OS entropy once at construction, so a session's
/// colors stay stable while it runs but differ between sessions.
pub struct SystemContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Session seed
    seed: u64,
}

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            seed: rand::random(),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerContext for SystemContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x9e3779b97f4a7c15) ^ stream)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_system_context_time_advances() {
        let ctx = SystemContext::new();
        let t1 = ctx.now();
        std::thread::sleep(Duration::from_millis(2));
        assert!(ctx.now() > t1);
    }

    #[test]
    fn test_streams_are_stable_within_session() {
        let ctx = SystemContext::new();
        let a: u64 = ctx.derive_rng(7).gen();
        let b: u64 = ctx.derive_rng(7).gen();
        let c: u64 = ctx.derive_rng(8).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
