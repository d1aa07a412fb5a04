//! Async drivers that run the state machines over a [`Transport`].
//!
//! The core never performs I/O; these loops do. They receive events from the
//! transport, feed them through a [`Dispatcher`], and send what comes back.
//!
//! - [`serve_ground`]: ground station loop with periodic session sweeping
//! - [`authenticate`]: drone loop with bounded retries

use std::{io, sync::Arc, time::Duration};

use droneauth_core::{
    Authenticator, ClientHandshake, DispatchAction, Dispatcher, Environment, HandshakeError,
    SignatureVerifier, Signer, Transport,
};
use droneauth_proto::{AuthFailureReason, IdentityToken};
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};

/// Ground station loop settings
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// How often expired sessions are swept, however busy the socket is
    pub sweep_interval: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { sweep_interval: Duration::from_secs(1) }
    }
}

/// Drone retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before giving up (at least one is always made)
    pub max_attempts: u32,
    /// How often the handshake is ticked, however busy the socket is
    pub poll_interval: Duration,
    /// Pause between a failed attempt and the next one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval: Duration::from_millis(250),
            backoff: Duration::from_millis(500),
        }
    }
}

/// Why a drone failed to authenticate
#[derive(Error, Debug)]
pub enum DriveError {
    /// The ground station rejected the drone for a non-retryable reason
    #[error("rejected by ground station: {0}")]
    Rejected(AuthFailureReason),

    /// Every attempt failed
    #[error("gave up after {attempts} attempts (last failure: {last})")]
    AttemptsExhausted {
        /// Attempts made
        attempts: u32,
        /// Why the final attempt failed
        last: AuthFailureReason,
    },

    /// The handshake could not be started
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The transport could not send
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Run a ground station on `transport` until the task is dropped.
///
/// Send failures are logged and do not stop the loop.
pub async fn serve_ground<T, E, V>(
    transport: T,
    authenticator: Arc<Authenticator<E, V, T::Peer>>,
    env: E,
    config: ServeConfig,
) where
    T: Transport,
    E: Environment,
    V: SignatureVerifier,
{
    let mut dispatcher = Dispatcher::new(authenticator);
    let mut sweep = periodic(config.sweep_interval).await;

    loop {
        let actions = tokio::select! {
            event = transport.recv() => dispatcher.dispatch(event, env.now()),
            _ = sweep.tick() => {
                let expired = dispatcher.endpoint().sweep(env.now());
                dispatcher.execute(expired)
            },
        };

        for action in actions {
            match action {
                DispatchAction::Send { peer, bytes } => {
                    if let Err(err) = transport.send(&peer, &bytes).await {
                        tracing::warn!(?peer, error = %err, "failed to send frame");
                    }
                },
                DispatchAction::Authenticated { peer, identity } => {
                    tracing::info!(?peer, %identity, "ground: drone authenticated");
                },
                DispatchAction::Rejected { peer, reason } => {
                    tracing::info!(?peer, %reason, "ground: handshake failed");
                },
                DispatchAction::TransportError { .. } => {},
            }
        }
    }
}

/// Authenticate a drone, retrying per `policy`.
///
/// A timeout or an `UnknownSession` rejection starts a new attempt; a
/// `BadSignature` rejection is final.
///
/// # Errors
///
/// Returns [`DriveError`] if the drone is rejected, runs out of attempts, or
/// cannot send.
pub async fn authenticate<T, E, S>(
    transport: &T,
    client: &mut Dispatcher<ClientHandshake<S, T::Peer>>,
    env: &E,
    policy: &RetryPolicy,
) -> Result<IdentityToken, DriveError>
where
    T: Transport,
    E: Environment,
    S: Signer,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = AuthFailureReason::Timeout;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            env.sleep(policy.backoff).await;
        }

        let now = env.now();
        if client.endpoint().state().is_terminal() {
            client.endpoint_mut().reset(now);
        }

        let actions = client.endpoint_mut().start(now)?;
        let actions = client.execute(actions);
        tracing::debug!(attempt, peer = ?client.endpoint().authenticator(), "starting handshake");

        match run_attempt(transport, client, env, policy, actions).await? {
            Ok(identity) => return Ok(identity),
            Err(AuthFailureReason::BadSignature) => {
                return Err(DriveError::Rejected(AuthFailureReason::BadSignature));
            },
            Err(reason) => {
                tracing::debug!(attempt, %reason, "handshake attempt failed");
                last = reason;
            },
        }
    }

    Err(DriveError::AttemptsExhausted { attempts: max_attempts, last })
}

/// Drive one attempt to a terminal state.
async fn run_attempt<T, E, S>(
    transport: &T,
    client: &mut Dispatcher<ClientHandshake<S, T::Peer>>,
    env: &E,
    policy: &RetryPolicy,
    mut actions: Vec<DispatchAction<T::Peer>>,
) -> io::Result<Result<IdentityToken, AuthFailureReason>>
where
    T: Transport,
    E: Environment,
    S: Signer,
{
    let mut poll = periodic(policy.poll_interval).await;

    loop {
        if let Some(outcome) = flush(transport, actions).await? {
            return Ok(outcome);
        }

        actions = tokio::select! {
            event = transport.recv() => client.dispatch(event, env.now()),
            _ = poll.tick() => {
                let timed_out = client.endpoint_mut().tick(env.now());
                client.execute(timed_out)
            },
        };
    }
}

/// Timer firing every `period`, first one `period` from now.
///
/// Created once per loop so inbound frames cannot postpone it.
async fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;
    interval
}

/// Send every frame in `actions` and report a terminal outcome, if any.
async fn flush<T: Transport>(
    transport: &T,
    actions: Vec<DispatchAction<T::Peer>>,
) -> io::Result<Option<Result<IdentityToken, AuthFailureReason>>> {
    let mut outcome = None;

    for action in actions {
        match action {
            DispatchAction::Send { peer, bytes } => transport.send(&peer, &bytes).await?,
            DispatchAction::Authenticated { identity, .. } => outcome = Some(Ok(identity)),
            DispatchAction::Rejected { reason, .. } => outcome = Some(Err(reason)),
            DispatchAction::TransportError { peer, error } => {
                tracing::warn!(?peer, %error, "drone: transport error");
            },
        }
    }

    Ok(outcome)
}
