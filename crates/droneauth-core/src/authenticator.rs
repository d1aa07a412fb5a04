//! Ground-station-side handshake over many drones.
//!
//! The [`Authenticator`] issues challenges, verifies responses through an
//! injected [`SignatureVerifier`], and keeps one [`HandshakeSession`] per peer
//! in a [`SessionRegistry`].
//!
//! All methods take `&self`: the authenticator is `Sync` whenever its
//! environment and verifier are, so it can be shared via `Arc` among workers.
//! Messages for one peer are handled entirely under that peer's shard lock.

use std::{fmt, hash::Hash, time::Duration, time::Instant};

use droneauth_proto::{
    AuthFailureReason, IdentityToken, Message, MessageTag, NONCE_LEN, Nonce, Signature,
};

use crate::{
    action::HandshakeAction,
    capability::SignatureVerifier,
    env::Environment,
    error::ProtocolError,
    registry::SessionRegistry,
    session::{AuthState, HandshakeSession},
};

/// Authenticator configuration
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// How long a live session may sit idle before [`Authenticator::sweep`]
    /// expires it
    pub session_timeout: Duration,

    /// Whether expiry sends `AuthFailure { Timeout }` to the peer
    pub notify_on_timeout: bool,

    /// How long an Authenticated or Rejected session is kept to absorb late
    /// duplicates before [`Authenticator::sweep`] drops it
    pub terminal_retention: Duration,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(30),
            notify_on_timeout: false,
            terminal_retention: Duration::from_secs(60),
        }
    }
}

/// Redraws allowed when the environment repeats a peer's previous nonce
const MAX_NONCE_DRAWS: usize = 8;

/// Verifier role of the handshake.
pub struct Authenticator<E, V, P> {
    env: E,
    verifier: V,
    config: AuthenticatorConfig,
    registry: SessionRegistry<P>,
}

impl<E, V, P> Authenticator<E, V, P>
where
    E: Environment,
    V: SignatureVerifier,
    P: Clone + Eq + Hash + fmt::Debug,
{
    /// Create an authenticator with an empty registry
    pub fn new(env: E, verifier: V, config: AuthenticatorConfig) -> Self {
        let registry = SessionRegistry::new(&env);
        Self { env, verifier, config, registry }
    }

    /// Configuration in use
    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Underlying session registry
    pub fn registry(&self) -> &SessionRegistry<P> {
        &self.registry
    }

    /// Snapshot of the session for `peer`
    pub fn session(&self, peer: &P) -> Option<HandshakeSession<P>> {
        self.registry.get(peer)
    }

    /// Number of tracked sessions
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Drop the session for `peer`. Idempotent.
    pub fn remove(&self, peer: &P) -> Option<HandshakeSession<P>> {
        self.registry.remove(peer)
    }

    /// Process a message from `peer` and return actions.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when the message is ignored. No session is
    /// created or changed in that case.
    pub fn handle_message(
        &self,
        peer: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        match message {
            Message::AuthRequest { identity } => Ok(self.handle_auth_request(peer, identity, now)),

            Message::Response { nonce, signature } => {
                match self.handle_response(peer, &nonce, &signature, now) {
                    Err(err @ (ProtocolError::UnknownSession | ProtocolError::NonceMismatch)) => {
                        tracing::debug!(?peer, error = %err, "rejecting unmatched response");

                        Ok(vec![HandshakeAction::Send {
                            peer: peer.clone(),
                            message: Message::AuthFailure {
                                reason: AuthFailureReason::UnknownSession,
                            },
                        }])
                    },
                    other => other,
                }
            },

            // Client-bound messages
            Message::Challenge { .. } | Message::AuthSuccess | Message::AuthFailure { .. } => {
                let state = self.registry.get(peer).map_or(AuthState::Idle, |s| s.state());
                Err(ProtocolError::StaleMessage { state, tag: message.tag() })
            },
        }
    }

    /// Expire live sessions idle past `session_timeout` and drop terminal
    /// sessions settled longer than `terminal_retention`.
    ///
    /// Each expired session yields `Rejected { Timeout }`, preceded by a
    /// `Send` of `AuthFailure { Timeout }` when `notify_on_timeout` is set.
    /// Dropping a terminal session yields nothing.
    pub fn sweep(&self, now: Instant) -> Vec<HandshakeAction<P>> {
        let expired = self.registry.sweep(now, self.config.session_timeout);

        let reaped = self.registry.reap_terminal(now, self.config.terminal_retention);
        if reaped > 0 {
            tracing::debug!(reaped, "dropped settled sessions");
        }

        let mut actions = Vec::new();
        for session in expired {
            let peer = session.peer().clone();
            tracing::debug!(?peer, retries = session.retry_count(), "handshake session expired");

            if self.config.notify_on_timeout {
                actions.push(HandshakeAction::Send {
                    peer: peer.clone(),
                    message: Message::AuthFailure { reason: AuthFailureReason::Timeout },
                });
            }
            actions.push(HandshakeAction::Rejected { peer, reason: AuthFailureReason::Timeout });
        }

        actions
    }

    fn handle_auth_request(
        &self,
        peer: &P,
        identity: IdentityToken,
        now: Instant,
    ) -> Vec<HandshakeAction<P>> {
        let nonce = self.registry.get_or_create(peer, now, |session, created| {
            let previous = session.nonce().copied();

            if session.is_terminal() {
                *session = HandshakeSession::new(peer.clone(), now);
            } else if !created {
                session.restart(AuthState::ChallengeIssued, now);
            }

            let nonce = self.fresh_nonce(previous.as_ref());
            session.set_identity(identity.clone());
            session.set_nonce(nonce);
            session.advance(AuthState::ChallengeIssued, now);

            tracing::debug!(
                ?peer,
                %identity,
                retry = session.retry_count(),
                "issued challenge"
            );

            nonce
        });

        vec![HandshakeAction::Send { peer: peer.clone(), message: Message::Challenge { nonce } }]
    }

    fn handle_response(
        &self,
        peer: &P,
        nonce: &Nonce,
        signature: &Signature,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        self.registry
            .with_session(peer, |session| {
                // A foreign nonce is answered even after the session settled
                if session.nonce() != Some(nonce) {
                    return Err(ProtocolError::NonceMismatch);
                }

                let state = session.state();
                if state != AuthState::ChallengeIssued {
                    return Err(ProtocolError::StaleMessage { state, tag: MessageTag::Response });
                }

                let identity = session.identity().cloned().ok_or(ProtocolError::UnknownSession)?;

                if self.verifier.verify(nonce, signature, &identity) {
                    session.advance(AuthState::Authenticated, now);
                    tracing::info!(?peer, %identity, "drone authenticated");

                    Ok(vec![
                        HandshakeAction::Send { peer: peer.clone(), message: Message::AuthSuccess },
                        HandshakeAction::Authenticated { peer: peer.clone(), identity },
                    ])
                } else {
                    let reason = AuthFailureReason::BadSignature;
                    session.reject(reason, now);
                    tracing::warn!(?peer, %identity, %reason, "drone rejected");

                    Ok(vec![
                        HandshakeAction::Send {
                            peer: peer.clone(),
                            message: Message::AuthFailure { reason },
                        },
                        HandshakeAction::Rejected { peer: peer.clone(), reason },
                    ])
                }
            })
            .unwrap_or(Err(ProtocolError::UnknownSession))
    }

    /// Draw a nonce that differs from the one last issued to this peer.
    ///
    /// Gives up on the environment after [`MAX_NONCE_DRAWS`] repeats and
    /// flips a bit of the last draw instead.
    fn fresh_nonce(&self, previous: Option<&Nonce>) -> Nonce {
        let mut nonce = self.env.random_nonce();
        for _ in 1..MAX_NONCE_DRAWS {
            if previous != Some(&nonce) {
                return nonce;
            }
            nonce = self.env.random_nonce();
        }

        if previous == Some(&nonce) {
            tracing::error!(
                draws = MAX_NONCE_DRAWS,
                "environment keeps repeating the previous nonce"
            );
            let mut bytes = *nonce.as_bytes();
            bytes[NONCE_LEN - 1] ^= 0x01;
            nonce = Nonce::new(bytes);
        }
        nonce
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;

    /// Counter-driven environment: every nonce is distinct.
    #[derive(Clone, Default)]
    struct CountingEnv {
        counter: Arc<AtomicU64>,
    }

    impl Environment for CountingEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            let value = self.counter.fetch_add(1, Ordering::Relaxed).to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = value[i % value.len()];
            }
        }
    }

    type Verifier = fn(&Nonce, &Signature, &IdentityToken) -> bool;

    fn accept_echo(nonce: &Nonce, signature: &Signature, _identity: &IdentityToken) -> bool {
        signature.as_bytes() == nonce.as_bytes()
    }

    fn authenticator(config: AuthenticatorConfig) -> Authenticator<CountingEnv, Verifier, u32> {
        Authenticator::new(CountingEnv::default(), accept_echo as Verifier, config)
    }

    fn request() -> Message {
        Message::AuthRequest { identity: IdentityToken::new("drone-1").unwrap() }
    }

    fn issued_nonce(actions: &[HandshakeAction<u32>]) -> Nonce {
        match actions {
            [HandshakeAction::Send { message: Message::Challenge { nonce }, .. }] => *nonce,
            other => panic!("expected a single Challenge, got {other:?}"),
        }
    }

    fn echo_response(nonce: Nonce) -> Message {
        Message::Response { nonce, signature: Signature::new(nonce.as_bytes().to_vec()).unwrap() }
    }

    #[test]
    fn auth_request_issues_challenge() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());

        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());

        let session = auth.session(&1).unwrap();
        assert_eq!(session.state(), AuthState::ChallengeIssued);
        assert_eq!(session.nonce(), Some(&nonce));
        assert_eq!(session.identity().map(|i| i.as_bytes()), Some(&b"drone-1"[..]));
    }

    #[test]
    fn valid_response_authenticates() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());

        let actions = auth.handle_message(&1, echo_response(nonce), now).unwrap();

        assert_eq!(actions[0].message(), Some(&Message::AuthSuccess));
        assert!(matches!(actions[1], HandshakeAction::Authenticated { peer: 1, .. }));
        assert_eq!(auth.session(&1).unwrap().state(), AuthState::Authenticated);
    }

    #[test]
    fn bad_signature_rejects() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());

        let forged = Message::Response { nonce, signature: Signature::new(vec![0; 4]).unwrap() };
        let actions = auth.handle_message(&1, forged, now).unwrap();

        assert_eq!(
            actions[0].message(),
            Some(&Message::AuthFailure { reason: AuthFailureReason::BadSignature })
        );
        let session = auth.session(&1).unwrap();
        assert_eq!(session.state(), AuthState::Rejected);
        assert_eq!(session.rejection(), Some(AuthFailureReason::BadSignature));
    }

    #[test]
    fn response_without_session_is_unknown() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());

        let actions =
            auth.handle_message(&9, echo_response(Nonce::new([0; 32])), now).unwrap();

        assert_eq!(
            actions,
            vec![HandshakeAction::Send {
                peer: 9,
                message: Message::AuthFailure { reason: AuthFailureReason::UnknownSession },
            }]
        );
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn mismatched_nonce_leaves_session_untouched() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());
        let before = auth.session(&1).unwrap();

        let stale = Nonce::new([0xFF; 32]);
        assert_ne!(stale, nonce);
        let actions = auth.handle_message(&1, echo_response(stale), now).unwrap();

        assert_eq!(
            actions[0].message(),
            Some(&Message::AuthFailure { reason: AuthFailureReason::UnknownSession })
        );
        assert_eq!(auth.session(&1).unwrap(), before);
    }

    #[test]
    fn repeated_request_restarts_with_fresh_nonce() {
        let t0 = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let first = issued_nonce(&auth.handle_message(&1, request(), t0).unwrap());

        let t1 = t0 + Duration::from_secs(1);
        let second = issued_nonce(&auth.handle_message(&1, request(), t1).unwrap());

        assert_ne!(first, second);
        let session = auth.session(&1).unwrap();
        assert_eq!(session.retry_count(), 1);
        assert_eq!(session.nonce(), Some(&second));

        // The old nonce no longer matches
        let actions = auth.handle_message(&1, echo_response(first), t1).unwrap();
        assert_eq!(
            actions[0].message(),
            Some(&Message::AuthFailure { reason: AuthFailureReason::UnknownSession })
        );
    }

    #[test]
    fn request_after_terminal_replaces_session() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());
        auth.handle_message(&1, echo_response(nonce), now).unwrap();

        let later = now + Duration::from_secs(5);
        issued_nonce(&auth.handle_message(&1, request(), later).unwrap());

        let session = auth.session(&1).unwrap();
        assert_eq!(session.state(), AuthState::ChallengeIssued);
        assert_eq!(session.retry_count(), 0);
        assert_eq!(session.created_at(), later);
    }

    #[test]
    fn response_after_terminal_is_ignored() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());
        auth.handle_message(&1, echo_response(nonce), now).unwrap();

        let err = auth.handle_message(&1, echo_response(nonce), now).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::StaleMessage { state: AuthState::Authenticated, tag: MessageTag::Response }
        );
    }

    #[test]
    fn foreign_nonce_after_terminal_is_unknown() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        let nonce = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());
        auth.handle_message(&1, echo_response(nonce), now).unwrap();
        let settled = auth.session(&1).unwrap();

        let actions = auth.handle_message(&1, echo_response(Nonce::new([0xAB; 32])), now).unwrap();

        assert_eq!(
            actions,
            vec![HandshakeAction::Send {
                peer: 1,
                message: Message::AuthFailure { reason: AuthFailureReason::UnknownSession },
            }]
        );
        assert_eq!(auth.session(&1).unwrap(), settled);
    }

    #[test]
    fn client_bound_messages_are_ignored() {
        let now = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());

        for message in [
            Message::Challenge { nonce: Nonce::new([1; 32]) },
            Message::AuthSuccess,
            Message::AuthFailure { reason: AuthFailureReason::Timeout },
        ] {
            assert!(auth.handle_message(&1, message, now).is_err());
        }
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn sweep_is_silent_by_default() {
        let t0 = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());
        auth.handle_message(&1, request(), t0).unwrap();

        assert!(auth.sweep(t0 + Duration::from_secs(10)).is_empty());

        let actions = auth.sweep(t0 + Duration::from_secs(31));
        assert_eq!(
            actions,
            vec![HandshakeAction::Rejected { peer: 1, reason: AuthFailureReason::Timeout }]
        );
        assert_eq!(auth.session_count(), 0);
    }

    #[test]
    fn sweep_can_notify_peer() {
        let t0 = Instant::now();
        let config = AuthenticatorConfig { notify_on_timeout: true, ..Default::default() };
        let auth = authenticator(config);
        auth.handle_message(&1, request(), t0).unwrap();

        let actions = auth.sweep(t0 + Duration::from_secs(31));
        assert_eq!(
            actions[0].message(),
            Some(&Message::AuthFailure { reason: AuthFailureReason::Timeout })
        );
        assert!(matches!(actions[1], HandshakeAction::Rejected { peer: 1, .. }));
    }

    #[test]
    fn sweep_drops_settled_sessions_after_retention() {
        let t0 = Instant::now();
        let auth = authenticator(AuthenticatorConfig::default());

        for peer in 0..1000 {
            let nonce = issued_nonce(&auth.handle_message(&peer, request(), t0).unwrap());
            auth.handle_message(&peer, echo_response(nonce), t0).unwrap();
        }
        assert_eq!(auth.session_count(), 1000);

        // Settled sessions linger to absorb duplicates, silently
        assert!(auth.sweep(t0 + Duration::from_secs(59)).is_empty());
        assert_eq!(auth.session_count(), 1000);

        assert!(auth.sweep(t0 + Duration::from_secs(365 * 24 * 3600)).is_empty());
        assert_eq!(auth.session_count(), 0);
    }

    /// Environment whose RNG is stuck on one value.
    #[derive(Clone)]
    struct StuckEnv;

    impl Environment for StuckEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, _duration: Duration) {}

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x42);
        }
    }

    #[test]
    fn stuck_rng_still_yields_a_fresh_nonce() {
        let now = Instant::now();
        let auth =
            Authenticator::new(StuckEnv, accept_echo as Verifier, AuthenticatorConfig::default());

        let first = issued_nonce(&auth.handle_message(&1u32, request(), now).unwrap());
        let second = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());
        let third = issued_nonce(&auth.handle_message(&1, request(), now).unwrap());

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(auth.session(&1).unwrap().nonce(), Some(&third));
    }
}
