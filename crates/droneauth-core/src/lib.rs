//! Drone authentication core logic
//!
//! This crate contains the pure state machine logic for the challenge-response
//! handshake between a drone and a ground station. It is completely decoupled
//! from I/O, enabling deterministic testing.
//!
//! # Architecture: "The Hollow Shell"
//!
//! Protocol logic is strictly separated from transport concerns:
//!
//! ```text
//!      ┌────────────────────────────┐
//!      │ droneauth-core             │
//!      │ - Handshake state machines │
//!      │ - Session registry         │
//!      │ - Frame dispatch           │
//!      └────────────────────────────┘
//!         ↓                      ↓
//! ┌──────────────────┐  ┌──────────────────┐
//! │ droneauth-harness│  │ embedding app    │
//! │ (Turmoil)        │  │ (real radio/UDP) │
//! │ - Virtual time   │  │ - System clock   │
//! │ - Seeded RNG     │  │ - Real signer    │
//! │ - Fault inject   │  │                  │
//! └──────────────────┘  └──────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in Core: state machines take `now` as a parameter and return
//!   [`HandshakeAction`]s; the driver performs the sends.
//! - Environment Trait: randomness for nonces comes from [`env::Environment`].
//! - Injected Crypto: signing and verification are opaque capabilities
//!   ([`capability::Signer`], [`capability::SignatureVerifier`]).
//!
//! # Modules
//!
//! - [`client`]: Drone-side handshake (single active session)
//! - [`authenticator`]: Ground-station-side handshake over many peers
//! - [`registry`]: Sharded session registry with timeout sweeping
//! - [`dispatcher`]: Transport event classification and routing
//! - [`session`]: Per-peer session record and [`AuthState`]
//! - [`env`]: Environment abstraction (time, RNG)
//! - [`transport`]: Transport abstraction (datagrams + error signals)
//! - [`error`]: Protocol and API misuse errors

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod authenticator;
pub mod capability;
pub mod client;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod registry;
pub mod session;
pub mod transport;

pub use action::HandshakeAction;
pub use authenticator::{Authenticator, AuthenticatorConfig};
pub use capability::{SignatureVerifier, Signer};
pub use client::{ClientConfig, ClientHandshake};
pub use dispatcher::{DispatchAction, DispatchStats, Dispatcher, Endpoint};
pub use env::Environment;
pub use error::{HandshakeError, ProtocolError};
pub use registry::SessionRegistry;
pub use session::{AuthState, HandshakeSession};
pub use transport::{Transport, TransportError, TransportEvent};
