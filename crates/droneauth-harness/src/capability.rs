//! Keyed-MAC capabilities for simulation.
//!
//! Drones and ground stations share a per-drone 128-bit key; the "signature"
//! is SipHash-2-4-128 of the nonce under that key. Deterministic and cheap,
//! and in no way a substitute for real signatures.

use std::{collections::HashMap, hash::Hasher};

use droneauth_core::{SignatureVerifier, Signer};
use droneauth_proto::{IdentityToken, Nonce, Signature};
use siphasher::sip128::{Hasher128, SipHasher24};

/// Shared secret between one drone and the ground station
pub type DroneKey = [u8; 16];

fn mac(key: &DroneKey, nonce: &Nonce) -> [u8; 16] {
    let mut hasher = SipHasher24::new_with_key(key);
    hasher.write(nonce.as_bytes());
    hasher.finish128().as_bytes()
}

/// Drone-side signer holding one key.
#[derive(Debug, Clone)]
pub struct KeyedSigner {
    key: DroneKey,
}

impl KeyedSigner {
    /// Signer using `key`
    pub fn new(key: DroneKey) -> Self {
        Self { key }
    }
}

impl Signer for KeyedSigner {
    fn sign(&self, nonce: &Nonce) -> Signature {
        Signature::from_array(mac(&self.key, nonce))
    }
}

/// Ground-side verifier holding every enrolled drone's key.
#[derive(Debug, Clone, Default)]
pub struct KeyedVerifier {
    keys: HashMap<IdentityToken, DroneKey>,
}

impl KeyedVerifier {
    /// Verifier with no enrolled drones
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll `identity` with `key`, replacing any previous key
    #[must_use]
    pub fn enroll(mut self, identity: IdentityToken, key: DroneKey) -> Self {
        self.keys.insert(identity, key);
        self
    }
}

impl SignatureVerifier for KeyedVerifier {
    fn verify(&self, nonce: &Nonce, signature: &Signature, identity: &IdentityToken) -> bool {
        // Unknown identities fail verification
        self.keys.get(identity).is_some_and(|key| signature.as_bytes() == mac(key, nonce))
    }
}
