//! World state for scenario execution.
//!
//! The World holds one ground station and any number of drones, tracks
//! delivery metrics, and provides oracle verification helpers.

use droneauth_core::{
    AuthState, Authenticator, ClientHandshake, DispatchStats, Dispatcher, HandshakeSession,
};
use droneauth_proto::AuthFailureReason;

use crate::{
    SimEnv,
    capability::{KeyedSigner, KeyedVerifier},
};

/// Node address inside a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    /// The ground station
    Ground,
    /// Drone with this index
    Drone(usize),
}

/// Ground station endpoint used by scenarios
pub type GroundStation = Authenticator<SimEnv, KeyedVerifier, Node>;

/// Drone endpoint used by scenarios
pub type Drone = ClientHandshake<KeyedSigner, Node>;

/// How a handshake ended, as observed by one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `node` saw the handshake with `peer` succeed
    Authenticated {
        /// Observer
        node: Node,
        /// Other side
        peer: Node,
    },
    /// `node` saw the handshake with `peer` fail
    Rejected {
        /// Observer
        node: Node,
        /// Other side
        peer: Node,
        /// Why
        reason: AuthFailureReason,
    },
}

/// World state: ground station, drones, and metrics.
pub struct World {
    ground: Dispatcher<GroundStation>,
    drones: Vec<Dispatcher<Drone>>,
    attempts: Vec<u32>,
    outcomes: Vec<Outcome>,
    frames_sent: usize,
    frames_delivered: usize,
    frames_dropped: usize,
    frames_duplicated: usize,
}

impl World {
    pub(crate) fn new(ground: GroundStation, drones: Vec<Drone>) -> Self {
        let attempts = vec![0; drones.len()];
        Self {
            ground: Dispatcher::new(ground),
            drones: drones.into_iter().map(Dispatcher::new).collect(),
            attempts,
            outcomes: Vec::new(),
            frames_sent: 0,
            frames_delivered: 0,
            frames_dropped: 0,
            frames_duplicated: 0,
        }
    }

    /// The ground station
    pub fn ground(&self) -> &GroundStation {
        self.ground.endpoint()
    }

    /// Dispatch counters of the ground station
    pub fn ground_stats(&self) -> DispatchStats {
        self.ground.stats()
    }

    /// Ground-side session for drone `index`
    pub fn ground_session(&self, index: usize) -> Option<HandshakeSession<Node>> {
        self.ground().session(&Node::Drone(index))
    }

    /// Drone `index`.
    ///
    /// Panics if there is no such drone.
    pub fn drone(&self, index: usize) -> &Drone {
        self.drones[index].endpoint()
    }

    /// Dispatch counters of drone `index`
    pub fn drone_stats(&self, index: usize) -> DispatchStats {
        self.drones[index].stats()
    }

    /// Number of drones
    pub fn drone_count(&self) -> usize {
        self.drones.len()
    }

    /// Handshake attempts made by drone `index`
    pub fn attempts(&self, index: usize) -> u32 {
        self.attempts[index]
    }

    /// Every outcome in the order it was observed
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Frames handed to the network
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Frames that reached their destination (duplicates counted)
    pub fn frames_delivered(&self) -> usize {
        self.frames_delivered
    }

    /// Frames the network dropped
    pub fn frames_dropped(&self) -> usize {
        self.frames_dropped
    }

    /// Frames the network delivered twice
    pub fn frames_duplicated(&self) -> usize {
        self.frames_duplicated
    }

    /// Check if every drone is Authenticated and the ground station agrees.
    ///
    /// The ground station agrees when its last outcome for the drone is
    /// Authenticated and any session it still holds is too. A settled session
    /// may already have been dropped after its retention period.
    pub fn all_authenticated(&self) -> bool {
        (0..self.drone_count()).all(|i| {
            self.drone(i).state() == AuthState::Authenticated
                && matches!(self.ground_outcome(i), Some(Outcome::Authenticated { .. }))
                && self
                    .ground_session(i)
                    .is_none_or(|session| session.state() == AuthState::Authenticated)
        })
    }

    /// Last outcome the ground station reported for drone `index`
    pub fn ground_outcome(&self, index: usize) -> Option<&Outcome> {
        let drone = Node::Drone(index);
        self.outcomes.iter().rev().find(|outcome| {
            matches!(outcome,
                Outcome::Authenticated { node: Node::Ground, peer }
                | Outcome::Rejected { node: Node::Ground, peer, .. } if *peer == drone)
        })
    }

    /// Check if every drone has reached a terminal state.
    pub fn all_settled(&self) -> bool {
        (0..self.drone_count()).all(|i| self.drone(i).state().is_terminal())
    }

    pub(crate) fn ground_mut(&mut self) -> &mut Dispatcher<GroundStation> {
        &mut self.ground
    }

    pub(crate) fn drone_mut(&mut self, index: usize) -> &mut Dispatcher<Drone> {
        &mut self.drones[index]
    }

    pub(crate) fn record_attempt(&mut self, index: usize) {
        self.attempts[index] += 1;
    }

    pub(crate) fn record_outcome(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn record_frame_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub(crate) fn record_frame_delivered(&mut self) {
        self.frames_delivered += 1;
    }

    pub(crate) fn record_frame_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    pub(crate) fn record_frame_duplicated(&mut self) {
        self.frames_duplicated += 1;
    }
}
