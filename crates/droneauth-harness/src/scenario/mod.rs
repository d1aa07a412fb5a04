//! Seeded fault-injection scenarios for the handshake.
//!
//! A [`Scenario`] runs one ground station and a set of drones over an
//! in-memory network that drops, duplicates, and reorders frames from a seed.
//! Each run ends by handing the [`World`] to an [`OracleFn`].

mod builder;
pub mod oracle;
mod world;

pub use builder::{Faults, RunnableScenario, Scenario};
pub use oracle::OracleFn;
pub use world::{Drone, GroundStation, Node, Outcome, World};
