//! Fuzzer for the ground station dispatcher.
//!
//! The input is split into frames and fed to an authenticator from a handful
//! of peers. Nothing may panic, and every frame must be accounted for.

#![no_main]

use std::time::{Duration, Instant};

use droneauth_core::{
    Authenticator, AuthenticatorConfig, Dispatcher, Environment, TransportEvent,
};
use droneauth_proto::{IdentityToken, Nonce, Signature};
use libfuzzer_sys::fuzz_target;

#[derive(Clone)]
struct FuzzEnv;

impl Environment for FuzzEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, _duration: Duration) {}

    fn random_bytes(&self, buffer: &mut [u8]) {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = i as u8;
        }
    }
}

type Verify = fn(&Nonce, &Signature, &IdentityToken) -> bool;

fn echo_verify(nonce: &Nonce, signature: &Signature, _identity: &IdentityToken) -> bool {
    signature.as_bytes() == nonce.as_bytes()
}

fuzz_target!(|data: &[u8]| {
    let now = Instant::now();
    let authenticator =
        Authenticator::new(FuzzEnv, echo_verify as Verify, AuthenticatorConfig::default());
    let mut dispatcher = Dispatcher::new(authenticator);

    // First byte of each chunk picks the peer, the rest is the frame
    let mut frames = 0;
    for chunk in data.split(|&b| b == 0xFF) {
        let (peer, frame) = match chunk.split_first() {
            Some((&peer, frame)) => (peer % 4, frame),
            None => (0, chunk),
        };
        let event = TransportEvent::Frame { peer, bytes: frame.to_vec().into() };
        let _ = dispatcher.dispatch(event, now);
        frames += 1;
    }

    let stats = dispatcher.stats();
    assert_eq!(stats.frames, frames);
    assert!(stats.decode_failures + stats.absorbed <= stats.frames);
    assert!(dispatcher.endpoint().session_count() <= 4);
});
