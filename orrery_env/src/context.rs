//! Core environment context trait for the Orrery viewer.

use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// The central interface for clock and entropy.
///
/// This trait abstracts the host so that the viewer core can run in both a
/// real render loop and the headless simulation harness.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - wraps `std::time::Instant`, random seed
/// - **Simulation**: `SimContext` - virtual clock, fixed seed
///
/// # Determinism
///
/// Every consumer of randomness (relaxation fallback directions, session
/// colors for unknown categories) asks for its own stream through
/// [`ViewerContext::derive_rng`], so adding a consumer never shifts the
/// values another consumer sees.
pub trait ViewerContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// Drives orbital motion and frame cache expiry.
    fn now(&self) -> Duration;

    /// Returns a random stream derived from the context seed.
    ///
    /// # Arguments
    /// * `stream` - Identifies the consumer; equal streams yield equal sequences
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    fn seed(&self) -> u64;
}
