//! Post-run checks over a settled [`World`].
//!
//! A scenario hands its world to exactly one oracle once every drone has
//! settled or virtual time ran out. The constructors here cover the common
//! handshake outcomes; tests pass their own closures for anything else.

use droneauth_core::AuthState;
use droneauth_proto::AuthFailureReason;

use crate::scenario::World;

/// Check run against the final world. `Err` carries a description of what
/// went wrong.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;

/// Create an oracle that verifies every handshake succeeded on both sides.
pub fn all_authenticated() -> OracleFn {
    Box::new(|world| {
        if world.all_authenticated() {
            Ok(())
        } else {
            let states: Vec<_> = (0..world.drone_count())
                .map(|i| (world.drone(i).state(), world.ground_outcome(i)))
                .collect();
            Err(format!("not all drones authenticated: {states:?}"))
        }
    })
}

/// Create an oracle that verifies drone `index` was rejected for `reason`.
pub fn drone_rejected(index: usize, reason: AuthFailureReason) -> OracleFn {
    Box::new(move |world| {
        let drone = world.drone(index);
        if drone.state() != AuthState::Rejected {
            return Err(format!("drone {index} should be Rejected, got {:?}", drone.state()));
        }
        if drone.rejection() != Some(reason) {
            return Err(format!(
                "drone {index} should be rejected for {reason}, got {:?}",
                drone.rejection()
            ));
        }
        Ok(())
    })
}

/// Create an oracle that verifies no frame failed to decode anywhere.
///
/// Holds whenever the network only drops, duplicates, or reorders.
pub fn no_decode_failures() -> OracleFn {
    Box::new(|world| {
        let ground = world.ground_stats().decode_failures;
        let drones: u64 = (0..world.drone_count()).map(|i| world.drone_stats(i).decode_failures).sum();

        if ground + drones == 0 {
            Ok(())
        } else {
            Err(format!("decode failures: ground={ground}, drones={drones}"))
        }
    })
}

/// Create an oracle that verifies no drone needed more than `max` attempts.
pub fn attempts_at_most(max: u32) -> OracleFn {
    Box::new(move |world| {
        for i in 0..world.drone_count() {
            if world.attempts(i) > max {
                return Err(format!("drone {i} used {} attempts (max {max})", world.attempts(i)));
            }
        }
        Ok(())
    })
}

/// Run `oracles` in order, failing on the first that fails.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| {
        oracles
            .into_iter()
            .enumerate()
            .try_for_each(|(i, oracle)| oracle(world).map_err(|e| format!("oracle {i}: {e}")))
    })
}
