//! Reusable oracle functions.

use latchkey_core::{CipherSpecState, HandshakeState};

use crate::scenario::{OracleFn, World};

/// Wrap an ad-hoc check.
pub fn custom(check: impl Fn(&World) -> Result<(), String> + 'static) -> OracleFn {
    Box::new(check)
}

/// The handshake ended in `expected`.
pub fn in_state(expected: HandshakeState) -> OracleFn {
    Box::new(move |world| {
        let actual = world.state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected state {expected:?}, found {actual:?}"))
        }
    })
}

/// Every action performed over the whole scenario, in order.
pub fn actions_equal(expected: &[&str]) -> OracleFn {
    let expected: Vec<String> = expected.iter().map(ToString::to_string).collect();
    Box::new(move |world| {
        let actual = world.descriptors();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected actions {expected:?}, performed {actual:?}"))
        }
    })
}

/// No step failed.
pub fn no_errors() -> OracleFn {
    Box::new(|world| match world.errors().next() {
        None => Ok(()),
        Some(record) => Err(format!(
            "step '{}' failed: {}",
            record.step,
            record.result.as_ref().err().map_or("", String::as_str)
        )),
    })
}

/// Exactly `count` steps failed.
pub fn error_count(count: usize) -> OracleFn {
    Box::new(move |world| {
        let actual = world.errors().count();
        if actual == count { Ok(()) } else { Err(format!("expected {count} errors, got {actual}")) }
    })
}

/// The session was (or was not) resumed from the cache.
pub fn resumed(expected: bool) -> OracleFn {
    Box::new(move |world| {
        let actual = world.connection().session().is_resumed();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected resumed = {expected}, got {actual}"))
        }
    })
}

/// The embedded cipher spec machine ended in `expected`.
pub fn cipher_spec(expected: CipherSpecState) -> OracleFn {
    Box::new(move |world| {
        let actual = world.connection().session().cipher_spec_state();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected cipher spec {expected:?}, found {actual:?}"))
        }
    })
}

/// All oracles must pass; the first failure is reported.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| oracles.iter().try_for_each(|oracle| oracle(world)))
}
