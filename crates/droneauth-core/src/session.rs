//! Per-peer handshake session record.
//!
//! A [`HandshakeSession`] is plain data. On the authenticator it lives inside
//! the [`SessionRegistry`](crate::registry::SessionRegistry) and is reached by
//! peer key; on the drone it occupies the single active-session slot of
//! [`ClientHandshake`](crate::client::ClientHandshake).
//!
//! # State Machine
//!
//! ```text
//! Client:   Idle ─start─> RequestSent ─Challenge─> ChallengeReceived ─sign─> ResponseSent
//!                              │                                               │
//!                              └──AuthFailure──> Rejected <──AuthFailure───────┤
//!                                                                AuthSuccess ──┴─> Authenticated
//!
//! Verifier: (none) ─AuthRequest─> ChallengeIssued ─Response ok─> Authenticated
//!                                       │
//!                                       └─Response bad / sweep─> Rejected
//! ```
//!
//! `Authenticated` and `Rejected` are terminal: a session enters one of them
//! at most once and never leaves.

use std::time::{Duration, Instant};

use droneauth_proto::{AuthFailureReason, IdentityToken, Nonce};

/// Authentication state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Nothing sent or received yet
    Idle,
    /// Client: AuthRequest sent, waiting for a Challenge
    RequestSent,
    /// Verifier: Challenge sent, waiting for a Response
    ChallengeIssued,
    /// Client: Challenge accepted, response being produced
    ChallengeReceived,
    /// Client: Response sent, waiting for the outcome
    ResponseSent,
    /// Handshake succeeded (terminal)
    Authenticated,
    /// Handshake failed (terminal)
    Rejected,
}

impl AuthState {
    /// Whether no further transitions are accepted from this state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Rejected)
    }
}

/// One authentication attempt for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSession<P> {
    peer: P,
    state: AuthState,
    nonce: Option<Nonce>,
    identity: Option<IdentityToken>,
    rejection: Option<AuthFailureReason>,
    created_at: Instant,
    last_activity: Instant,
    retry_count: u32,
}

impl<P> HandshakeSession<P> {
    /// Create a new session in [`AuthState::Idle`]
    pub fn new(peer: P, now: Instant) -> Self {
        Self {
            peer,
            state: AuthState::Idle,
            nonce: None,
            identity: None,
            rejection: None,
            created_at: now,
            last_activity: now,
            retry_count: 0,
        }
    }

    /// Peer this session belongs to
    pub fn peer(&self) -> &P {
        &self.peer
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Challenge nonce issued (verifier) or received (client), if any
    #[must_use]
    pub fn nonce(&self) -> Option<&Nonce> {
        self.nonce.as_ref()
    }

    /// Identity claimed for this session, if known
    #[must_use]
    pub fn identity(&self) -> Option<&IdentityToken> {
        self.identity.as_ref()
    }

    /// Why the session was rejected, if it was
    #[must_use]
    pub fn rejection(&self) -> Option<AuthFailureReason> {
        self.rejection
    }

    /// When the session was created
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last time the session saw a transition or restart
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// How many times the handshake was restarted within this session
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether the session is terminal
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns `Some(elapsed)` if this non-terminal session has been idle for
    /// longer than `timeout`.
    ///
    /// Terminal sessions never expire.
    #[must_use]
    pub fn check_timeout(&self, now: Instant, timeout: Duration) -> Option<Duration> {
        if self.is_terminal() {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.last_activity);
        if elapsed > timeout { Some(elapsed) } else { None }
    }

    /// Whether this terminal session has been kept for longer than
    /// `retention` since it settled.
    ///
    /// Live sessions are never past retention; they expire through
    /// [`check_timeout`](Self::check_timeout) instead.
    #[must_use]
    pub fn past_retention(&self, now: Instant, retention: Duration) -> bool {
        self.is_terminal() && now.saturating_duration_since(self.last_activity) > retention
    }

    /// Move to `next`, unless the session is already terminal.
    ///
    /// Returns whether the transition happened.
    pub(crate) fn advance(&mut self, next: AuthState, now: Instant) -> bool {
        if self.is_terminal() {
            return false;
        }

        self.state = next;
        self.last_activity = now;
        true
    }

    /// Move to [`AuthState::Rejected`] recording `reason`.
    pub(crate) fn reject(&mut self, reason: AuthFailureReason, now: Instant) -> bool {
        let rejected = self.advance(AuthState::Rejected, now);
        if rejected {
            self.rejection = Some(reason);
        }
        rejected
    }

    /// Restart the handshake in place: count a retry and forget the old
    /// nonce.
    pub(crate) fn restart(&mut self, state: AuthState, now: Instant) {
        debug_assert!(!self.is_terminal(), "terminal sessions are replaced, not restarted");

        self.retry_count = self.retry_count.saturating_add(1);
        self.nonce = None;
        self.state = state;
        self.last_activity = now;
    }

    pub(crate) fn set_nonce(&mut self, nonce: Nonce) {
        self.nonce = Some(nonce);
    }

    pub(crate) fn set_identity(&mut self, identity: IdentityToken) {
        self.identity = Some(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_idle() {
        let now = Instant::now();
        let session = HandshakeSession::new("ground", now);

        assert_eq!(session.state(), AuthState::Idle);
        assert_eq!(session.retry_count(), 0);
        assert!(session.nonce().is_none());
        assert_eq!(session.created_at(), now);
    }

    #[test]
    fn terminal_session_refuses_transitions() {
        let now = Instant::now();
        let mut session = HandshakeSession::new("ground", now);

        assert!(session.advance(AuthState::Authenticated, now));
        assert!(!session.advance(AuthState::Rejected, now));
        assert!(!session.reject(AuthFailureReason::Timeout, now));

        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.rejection(), None);
    }

    #[test]
    fn reject_records_reason() {
        let now = Instant::now();
        let mut session = HandshakeSession::new("ground", now);
        session.advance(AuthState::ChallengeIssued, now);

        assert!(session.reject(AuthFailureReason::BadSignature, now));
        assert_eq!(session.state(), AuthState::Rejected);
        assert_eq!(session.rejection(), Some(AuthFailureReason::BadSignature));
    }

    #[test]
    fn timeout_only_for_live_sessions() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(10);
        let mut session = HandshakeSession::new("ground", t0);
        session.advance(AuthState::ChallengeIssued, t0);

        assert!(session.check_timeout(t0 + Duration::from_secs(10), timeout).is_none());
        assert!(session.check_timeout(t0 + Duration::from_secs(11), timeout).is_some());

        session.advance(AuthState::Authenticated, t0);
        assert!(session.check_timeout(t0 + Duration::from_secs(100), timeout).is_none());
    }

    #[test]
    fn retention_only_for_terminal_sessions() {
        let t0 = Instant::now();
        let retention = Duration::from_secs(60);
        let mut session = HandshakeSession::new("ground", t0);
        session.advance(AuthState::ChallengeIssued, t0);

        assert!(!session.past_retention(t0 + Duration::from_secs(600), retention));

        let settled = t0 + Duration::from_secs(5);
        session.advance(AuthState::Authenticated, settled);
        assert!(!session.past_retention(settled + retention, retention));
        assert!(session.past_retention(settled + Duration::from_secs(61), retention));
    }

    #[test]
    fn restart_counts_retry_and_clears_nonce() {
        let t0 = Instant::now();
        let mut session = HandshakeSession::new("ground", t0);
        session.advance(AuthState::ChallengeIssued, t0);
        session.set_nonce(Nonce::new([1; droneauth_proto::NONCE_LEN]));

        let t1 = t0 + Duration::from_secs(1);
        session.restart(AuthState::ChallengeIssued, t1);

        assert_eq!(session.retry_count(), 1);
        assert!(session.nonce().is_none());
        assert_eq!(session.last_activity(), t1);
    }
}
