//! Turmoil-based Environment implementation for deterministic testing.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use droneauth_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Simulation environment using Turmoil's virtual time and seeded RNG.
///
/// - **Virtual Time**: `now()` returns the simulated clock, which advances
///   instantly across `sleep()`.
/// - **Seeded RNG**: `random_bytes()` draws from a `ChaCha20Rng`, so every
///   challenge nonce and shard key is reproducible from the seed.
///
/// Clones share one RNG, so a ground station and the tests inspecting it see
/// a single sequence.
///
/// # Panics
///
/// `sleep()` must be awaited inside a Turmoil (or Tokio) runtime.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Create a SimEnv with the default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a SimEnv with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))) }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(dest);
    }
}
