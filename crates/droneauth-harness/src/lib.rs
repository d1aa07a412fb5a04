//! Deterministic simulation harness for the drone authentication handshake.
//!
//! This crate provides Turmoil-based implementations of the `Environment`
//! and `Transport` traits, async drivers for both roles, keyed-MAC
//! capabilities, and a scenario framework for fault-injection tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod driver;
pub mod scenario;
pub mod sim_env;
pub mod sim_transport;

pub use capability::{DroneKey, KeyedSigner, KeyedVerifier};
pub use driver::{DriveError, RetryPolicy, ServeConfig, authenticate, serve_ground};
pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
