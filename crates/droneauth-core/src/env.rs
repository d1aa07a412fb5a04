//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples protocol logic from system resources
//! (time, randomness). This enables:
//!
//! - Deterministic Simulation: Turmoil provides a virtual clock and a seeded
//!   RNG, so a failing handshake can be replayed exactly.
//!
//! - Production Runtime: a system implementation uses the real clock and OS
//!   entropy without any change to the protocol logic.
//!
//! # Design Philosophy: "The Hollow Shell"
//!
//! State machines in `droneauth-core`:
//!
//! - MUST NOT call `std::time::Instant::now()` themselves; time is a parameter
//! - MUST NOT use `rand::thread_rng()` or system entropy directly
//! - draw every nonce from an `Environment`
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

use droneauth_proto::{NONCE_LEN, Nonce};

/// Abstract environment providing time, randomness, and sleeping.
///
/// # Implementations
///
/// - Simulation (`droneauth-harness::SimEnv`): Virtual time that can be
///   advanced instantly, seeded RNG for reproducibility.
///
/// - Production: Real system clock, crypto-secure RNG from the OS entropy
///   pool.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. RNG quality: `random_bytes()` uses cryptographically secure entropy in
///    production. Nonce freshness depends on it.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Only drivers call this. State machines receive `now` as a parameter.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// Used by drivers for retry pacing. Protocol logic never sleeps.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Successive calls should not repeat. The authenticator redraws a nonce
    /// that matches a peer's previous one only a bounded number of times.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a fresh challenge nonce.
    fn random_nonce(&self) -> Nonce {
        let mut bytes = [0u8; NONCE_LEN];
        self.random_bytes(&mut bytes);
        Nonce::new(bytes)
    }
}
