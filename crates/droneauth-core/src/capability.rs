//! Injected cryptographic capabilities.
//!
//! The handshake never touches key material. The embedding application
//! supplies a [`Signer`] on the drone and a [`SignatureVerifier`] on the
//! ground station; the state machines only decide *when* to call them.

use droneauth_proto::{IdentityToken, Nonce, Signature};

/// Produces a signature over a challenge nonce (drone side).
pub trait Signer {
    /// Sign `nonce`.
    fn sign(&self, nonce: &Nonce) -> Signature;
}

/// Checks a drone's signature over a nonce (ground station side).
pub trait SignatureVerifier {
    /// Whether `signature` is a valid signature over `nonce` by `identity`.
    fn verify(&self, nonce: &Nonce, signature: &Signature, identity: &IdentityToken) -> bool;
}

impl<F> Signer for F
where
    F: Fn(&Nonce) -> Signature,
{
    fn sign(&self, nonce: &Nonce) -> Signature {
        self(nonce)
    }
}

impl<F> SignatureVerifier for F
where
    F: Fn(&Nonce, &Signature, &IdentityToken) -> bool,
{
    fn verify(&self, nonce: &Nonce, signature: &Signature, identity: &IdentityToken) -> bool {
        self(nonce, signature, identity)
    }
}
