//! Sharded registry of verifier-side handshake sessions.
//!
//! Sessions are plain data addressed by peer key. Callers never hold a
//! reference to a session outside a closure, so no handle can outlive its
//! entry.
//!
//! # Sharding
//!
//! Entries are spread over `N` shards, each a `Mutex<HashMap>`. The shard is
//! picked with SipHash-2-4 keyed from the [`Environment`], so a peer cannot
//! craft addresses that all collide into one shard. Work on one peer runs
//! entirely under its shard lock; peers on different shards proceed in
//! parallel.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use droneauth_proto::AuthFailureReason;
use siphasher::sip::SipHasher24;

use crate::{env::Environment, session::HandshakeSession};

/// Default number of shards
pub const DEFAULT_SHARDS: usize = 16;

/// Concurrent map from peer to [`HandshakeSession`].
pub struct SessionRegistry<P, const N: usize = DEFAULT_SHARDS> {
    shards: [Mutex<HashMap<P, HandshakeSession<P>>>; N],
    key0: u64,
    key1: u64,
}

impl<P, const N: usize> SessionRegistry<P, N>
where
    P: Clone + Eq + Hash,
{
    /// Create an empty registry with shard keys drawn from `env`.
    pub fn new<E: Environment>(env: &E) -> Self {
        Self::with_key(env.random_u64(), env.random_u64())
    }

    /// Create an empty registry with explicit SipHash keys.
    #[must_use]
    pub fn with_key(key0: u64, key1: u64) -> Self {
        const { assert!(N > 0, "registry needs at least one shard") };

        Self { shards: std::array::from_fn(|_| Mutex::new(HashMap::new())), key0, key1 }
    }

    /// Number of shards
    #[must_use]
    pub const fn shard_count(&self) -> usize {
        N
    }

    fn shard_index(&self, peer: &P) -> usize {
        let mut hasher = SipHasher24::new_with_keys(self.key0, self.key1);
        peer.hash(&mut hasher);
        (hasher.finish() % N as u64) as usize
    }

    // A panic while holding a shard lock leaves at most one session
    // half-updated; the map itself stays valid, so keep serving.
    fn lock_shard(&self, peer: &P) -> MutexGuard<'_, HashMap<P, HandshakeSession<P>>> {
        self.shards[self.shard_index(peer)].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the session for `peer`, creating an `Idle` one first if
    /// none exists.
    ///
    /// `f` receives `true` as its second argument when the session was just
    /// created.
    pub fn get_or_create<R>(
        &self,
        peer: &P,
        now: Instant,
        f: impl FnOnce(&mut HandshakeSession<P>, bool) -> R,
    ) -> R {
        let mut shard = self.lock_shard(peer);

        let mut created = false;
        let session = shard.entry(peer.clone()).or_insert_with(|| {
            created = true;
            HandshakeSession::new(peer.clone(), now)
        });

        f(session, created)
    }

    /// Run `f` on the session for `peer` if one exists.
    pub fn with_session<R>(
        &self,
        peer: &P,
        f: impl FnOnce(&mut HandshakeSession<P>) -> R,
    ) -> Option<R> {
        self.lock_shard(peer).get_mut(peer).map(f)
    }

    /// Snapshot of the session for `peer`
    pub fn get(&self, peer: &P) -> Option<HandshakeSession<P>> {
        self.lock_shard(peer).get(peer).cloned()
    }

    /// Whether a session exists for `peer`
    pub fn contains(&self, peer: &P) -> bool {
        self.lock_shard(peer).contains_key(peer)
    }

    /// Remove the session for `peer`.
    ///
    /// Idempotent: removing a missing session returns `None`.
    pub fn remove(&self, peer: &P) -> Option<HandshakeSession<P>> {
        self.lock_shard(peer).remove(peer)
    }

    /// Remove every non-terminal session idle for longer than `timeout`.
    ///
    /// Removed sessions are returned marked `Rejected { Timeout }`. Terminal
    /// sessions are left to [`reap_terminal`](Self::reap_terminal).
    pub fn sweep(&self, now: Instant, timeout: Duration) -> Vec<HandshakeSession<P>> {
        let mut expired = Vec::new();

        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);

            let stale: Vec<P> = shard
                .iter()
                .filter(|(_, session)| session.check_timeout(now, timeout).is_some())
                .map(|(peer, _)| peer.clone())
                .collect();

            for peer in stale {
                if let Some(mut session) = shard.remove(&peer) {
                    session.reject(AuthFailureReason::Timeout, now);
                    expired.push(session);
                }
            }
        }

        expired
    }

    /// Drop terminal sessions settled for longer than `retention`.
    ///
    /// Returns how many were dropped.
    pub fn reap_terminal(&self, now: Instant, retention: Duration) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
                let before = shard.len();
                shard.retain(|_, session| !session.past_retention(now, retention));
                before - shard.len()
            })
            .sum()
    }

    /// Total number of sessions across all shards
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Whether the registry holds no sessions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
