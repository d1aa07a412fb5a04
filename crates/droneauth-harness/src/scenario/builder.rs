//! [`Scenario`] configuration and the step loop that drives it.
//!
//! Virtual time advances in fixed steps over a seeded in-memory network, so a
//! run is a pure function of its configuration.

use std::{
    mem,
    time::{Duration, Instant},
};

use bytes::Bytes;
use droneauth_core::{
    AuthState, Authenticator, AuthenticatorConfig, ClientConfig, ClientHandshake, DispatchAction,
    TransportEvent,
};
use droneauth_proto::{AuthFailureReason, IdentityToken};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;

use crate::{
    SimEnv,
    capability::{DroneKey, KeyedSigner, KeyedVerifier},
    scenario::{
        OracleFn, World,
        world::{Node, Outcome},
    },
};

/// Key an impostor drone signs with. Never enrolled.
const IMPOSTOR_KEY: DroneKey = [0xEE; 16];

/// Network faults applied to every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Faults {
    /// Probability that a frame is lost
    pub drop_rate: f64,
    /// Probability that a delivered frame arrives twice
    pub duplicate_rate: f64,
    /// Shuffle frames that are in flight together
    pub reorder: bool,
}

/// Scenario builder.
///
/// Configure drones, faults, and timing, then add an oracle verification
/// function.
pub struct Scenario {
    drones: usize,
    impostors: Vec<usize>,
    seed: u64,
    faults: Faults,
    client_config: ClientConfig,
    authenticator_config: AuthenticatorConfig,
    max_attempts: u32,
    step: Duration,
    duration: Duration,
    time_advance: Option<Duration>,
}

impl Scenario {
    /// Create a scenario with one honest drone and a perfect network.
    pub fn new() -> Self {
        Self {
            drones: 1,
            impostors: Vec::new(),
            seed: 0,
            faults: Faults::default(),
            client_config: ClientConfig::default(),
            authenticator_config: AuthenticatorConfig::default(),
            max_attempts: 1,
            step: Duration::from_millis(100),
            duration: Duration::from_secs(600),
            time_advance: None,
        }
    }

    /// Number of drones authenticating against the ground station.
    pub fn with_drones(mut self, count: usize) -> Self {
        self.drones = count;
        self
    }

    /// Make drone `index` sign with a key the ground station does not know.
    pub fn with_impostor(mut self, index: usize) -> Self {
        self.impostors.push(index);
        self
    }

    /// Seed for the nonce RNG and fault decisions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Network faults. Rates are clamped to `[0, 1]`.
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = Faults {
            drop_rate: faults.drop_rate.clamp(0.0, 1.0),
            duplicate_rate: faults.duplicate_rate.clamp(0.0, 1.0),
            reorder: faults.reorder,
        };
        self
    }

    /// Configure every drone.
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Configure the ground station.
    pub fn with_authenticator_config(mut self, config: AuthenticatorConfig) -> Self {
        self.authenticator_config = config;
        self
    }

    /// Handshake attempts each drone may make.
    ///
    /// A drone retries after a timeout or an `UnknownSession` rejection,
    /// never after `BadSignature`.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Advance virtual time once the handshakes have settled.
    ///
    /// The scenario will tick every drone and sweep the ground station at the
    /// advanced time before running the oracle.
    pub fn with_time_advance(mut self, duration: Duration) -> Self {
        self.time_advance = Some(duration);
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// Only a [`RunnableScenario`] can run, so every run ends in a check.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Every drone starts a handshake, then virtual time advances in fixed
    /// steps. Each step delivers all frames in flight (subject to faults),
    /// ticks every drone, sweeps the ground station, and restarts drones that
    /// may retry. The run ends when every drone has settled or the virtual
    /// duration is exhausted; then the oracle is invoked.
    pub fn run(self) -> Result<(), String> {
        let scenario = &self.scenario;
        let mut now = Instant::now();

        let mut verifier = KeyedVerifier::new();
        let mut drones = Vec::with_capacity(scenario.drones);
        for index in 0..scenario.drones {
            let identity = drone_identity(index)?;
            verifier = verifier.enroll(identity.clone(), drone_key(index));

            let key =
                if scenario.impostors.contains(&index) { IMPOSTOR_KEY } else { drone_key(index) };
            drones.push(ClientHandshake::new(
                identity,
                Node::Ground,
                KeyedSigner::new(key),
                scenario.client_config.clone(),
                now,
            ));
        }

        let ground = Authenticator::new(
            SimEnv::with_seed(scenario.seed),
            verifier,
            scenario.authenticator_config.clone(),
        );
        let mut world = World::new(ground, drones);
        let mut network = Network::new(scenario.faults, scenario.seed);

        for index in 0..scenario.drones {
            start_drone(&mut world, &mut network, index, now)?;
        }

        let deadline = now + scenario.duration;
        while now < deadline {
            network.deliver(&mut world, now);
            self.retry_drones(&mut world, &mut network, now)?;

            if world.all_settled() && network.is_idle() {
                break;
            }

            now += scenario.step;
            tick(&mut world, &mut network, now);
        }

        if let Some(advance) = scenario.time_advance {
            now += advance;
            tick(&mut world, &mut network, now);
            network.deliver(&mut world, now);
        }

        (self.oracle)(&world)
    }

    /// Restart drones whose last attempt failed in a way worth retrying.
    fn retry_drones(
        &self,
        world: &mut World,
        network: &mut Network,
        now: Instant,
    ) -> Result<(), String> {
        for index in 0..world.drone_count() {
            let drone = world.drone(index);
            let retryable = drone.state() == AuthState::Rejected
                && matches!(
                    drone.rejection(),
                    Some(AuthFailureReason::Timeout | AuthFailureReason::UnknownSession)
                );

            if retryable && world.attempts(index) < self.scenario.max_attempts {
                world.drone_mut(index).endpoint_mut().reset(now);
                start_drone(world, network, index, now)?;
            }
        }
        Ok(())
    }
}

fn drone_identity(index: usize) -> Result<IdentityToken, String> {
    IdentityToken::new(format!("drone-{index}")).map_err(|e| e.to_string())
}

fn drone_key(index: usize) -> DroneKey {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&(index as u64).to_be_bytes());
    key[8..].copy_from_slice(b"dronekey");
    key
}

fn start_drone(
    world: &mut World,
    network: &mut Network,
    index: usize,
    now: Instant,
) -> Result<(), String> {
    let actions = world
        .drone_mut(index)
        .endpoint_mut()
        .start(now)
        .map_err(|e| format!("drone {index} failed to start: {e}"))?;
    world.record_attempt(index);

    let actions = world.drone_mut(index).execute(actions);
    network.collect(world, Node::Drone(index), actions);
    Ok(())
}

/// Tick every drone and sweep the ground station.
fn tick(world: &mut World, network: &mut Network, now: Instant) {
    for index in 0..world.drone_count() {
        let drone = world.drone_mut(index);
        let actions = drone.endpoint_mut().tick(now);
        let actions = drone.execute(actions);
        network.collect(world, Node::Drone(index), actions);
    }

    let actions = world.ground().sweep(now);
    let actions = world.ground_mut().execute(actions);
    network.collect(world, Node::Ground, actions);
}

struct InFlight {
    from: Node,
    to: Node,
    bytes: Bytes,
}

/// Lossy in-memory network between the ground station and drones.
struct Network {
    faults: Faults,
    rng: ChaCha20Rng,
    in_flight: Vec<InFlight>,
}

impl Network {
    fn new(faults: Faults, seed: u64) -> Self {
        Self { faults, rng: ChaCha20Rng::seed_from_u64(seed), in_flight: Vec::new() }
    }

    fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Queue sends and record outcomes produced by `from`.
    fn collect(&mut self, world: &mut World, from: Node, actions: Vec<DispatchAction<Node>>) {
        for action in actions {
            match action {
                DispatchAction::Send { peer, bytes } => {
                    world.record_frame_sent();
                    self.in_flight.push(InFlight { from, to: peer, bytes });
                },
                DispatchAction::Authenticated { peer, .. } => {
                    world.record_outcome(Outcome::Authenticated { node: from, peer });
                },
                DispatchAction::Rejected { peer, reason } => {
                    world.record_outcome(Outcome::Rejected { node: from, peer, reason });
                },
                DispatchAction::TransportError { .. } => {},
            }
        }
    }

    /// Deliver everything currently in flight. Replies are queued for the
    /// next delivery.
    fn deliver(&mut self, world: &mut World, now: Instant) {
        let mut batch = mem::take(&mut self.in_flight);
        if self.faults.reorder {
            batch.shuffle(&mut self.rng);
        }

        for frame in batch {
            if self.rng.gen_bool(self.faults.drop_rate) {
                world.record_frame_dropped();
                continue;
            }

            let copies = if self.rng.gen_bool(self.faults.duplicate_rate) {
                world.record_frame_duplicated();
                2
            } else {
                1
            };

            for _ in 0..copies {
                world.record_frame_delivered();
                let event = TransportEvent::Frame { peer: frame.from, bytes: frame.bytes.clone() };
                let actions = match frame.to {
                    Node::Ground => world.ground_mut().dispatch(event, now),
                    Node::Drone(index) => world.drone_mut(index).dispatch(event, now),
                };
                self.collect(world, frame.to, actions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::oracle;

    #[test]
    fn combined_oracle_names_the_failure() {
        let result = Scenario::new()
            .oracle(oracle::all_of(vec![
                oracle::all_authenticated(),
                Box::new(|_: &World| Err("forced".to_string())),
            ]))
            .run();

        assert_eq!(result, Err("oracle 1: forced".to_string()));
    }

    #[test]
    fn scenario_creates_actors() {
        let scenario = Scenario::new().with_drones(3).oracle(Box::new(|world| {
            if world.drone_count() != 3 {
                return Err(format!("expected 3 drones, got {}", world.drone_count()));
            }
            Ok(())
        }));

        scenario.run().expect("scenario should succeed");
    }

    #[test]
    fn drone_keys_are_distinct() {
        assert_ne!(drone_key(0), drone_key(1));
        assert_ne!(drone_key(0), IMPOSTOR_KEY);
    }

    #[test]
    fn perfect_network_counts_every_frame() {
        Scenario::new()
            .oracle(Box::new(|world| {
                // AuthRequest, Challenge, Response, AuthSuccess
                if world.frames_sent() != 4 || world.frames_delivered() != 4 {
                    return Err(format!(
                        "expected 4 frames sent and delivered, got {} / {}",
                        world.frames_sent(),
                        world.frames_delivered()
                    ));
                }
                Ok(())
            }))
            .run()
            .expect("scenario should succeed");
    }
}
