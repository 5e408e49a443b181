//! Handshake paths exercised through the scenario framework.

use std::time::Duration;

use latchkey_core::{CipherSpecState, ConnectionConfig, HandshakeState};
use latchkey_harness::scenario::{Scenario, oracle};
use latchkey_proto::RecordError;

const FULL_FLIGHT: [&str; 5] = [
    "server hello",
    "certificate response",
    "server key exchange",
    "certificate request",
    "server hello done",
];

#[test]
fn full_handshake() {
    let mut expected = FULL_FLIGHT.to_vec();
    expected.extend(["change to aes128", "saving cipherspec", "server done", "finished"]);

    let result = Scenario::new("full handshake")
        .hello(b"", "aes128")
        .finished()
        .oracle(oracle::all_of(vec![
            oracle::no_errors(),
            oracle::in_state(HandshakeState::ApplicationData),
            oracle::actions_equal(&expected),
            oracle::resumed(false),
            oracle::cipher_spec(CipherSpecState::Changing),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn full_handshake_stops_before_finished() {
    let result = Scenario::new("awaiting finished")
        .hello(b"unknown-id", "aes128")
        .oracle(oracle::all_of(vec![
            oracle::in_state(HandshakeState::AwaitingFinished),
            oracle::actions_equal(&FULL_FLIGHT),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn resumed_handshake() {
    let result = Scenario::new("resumed handshake")
        .cached_session(b"s1", "spec_change")
        .hello(b"s1", "ignored")
        .finished()
        .oracle(oracle::all_of(vec![
            oracle::no_errors(),
            oracle::in_state(HandshakeState::ApplicationData),
            oracle::resumed(true),
            oracle::actions_equal(&[
                "server hello",
                "change to spec_change",
                "saving cipherspec",
                "server done",
                "finished",
            ]),
            oracle::custom(|world| {
                let finished = &world.steps()[1];
                if finished.state_before == HandshakeState::AwaitingFinishedResumed
                    && finished.result.as_ref().is_ok_and(Vec::is_empty)
                {
                    Ok(())
                } else {
                    Err(format!("client finished after resumption: {finished:?}"))
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn acknowledgement_stabilises_cipher_spec() {
    let result = Scenario::new("acknowledged")
        .hello(b"", "aes128")
        .finished()
        .acknowledge()
        .acknowledge()
        .oracle(oracle::all_of(vec![
            oracle::in_state(HandshakeState::ApplicationData),
            oracle::cipher_spec(CipherSpecState::Stable),
            oracle::error_count(1),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn alert_fails_every_live_state() {
    let prefixes: [(&str, fn(Scenario) -> Scenario); 5] = [
        ("idle", |s| s),
        ("awaiting finished", |s| s.hello(b"", "a")),
        ("awaiting finished resumed", |s| s.cached_session(b"id", "a").hello(b"id", "a")),
        ("application data", |s| s.hello(b"", "a").finished()),
        ("application data resumed", |s| s.cached_session(b"id", "a").hello(b"id", "a").finished()),
    ];

    for (name, prefix) in prefixes {
        let result = prefix(Scenario::new(format!("alert from {name}")))
            .alert()
            .finished()
            .hello(b"", "a")
            .alert()
            .oracle(oracle::all_of(vec![
                oracle::in_state(HandshakeState::Failed),
                oracle::error_count(3),
                oracle::custom(|world| {
                    let tail: Vec<_> = world.steps().iter().rev().take(3).collect();
                    if tail.iter().all(|r| r.state_after == HandshakeState::Failed) {
                        Ok(())
                    } else {
                        Err("failed session moved".into())
                    }
                }),
            ]))
            .run();

        assert!(result.is_ok(), "{name}: {result:?}");
    }
}

#[test]
fn malformed_record_aborts_handshake() {
    let result = Scenario::new("malformed record")
        .hello(b"", "aes128")
        .malformed_record(RecordError::TruncatedInput { needed: 9, available: 5 })
        .oracle(oracle::all_of(vec![
            oracle::no_errors(),
            oracle::in_state(HandshakeState::Failed),
            oracle::custom(|world| match world.descriptors().last().map(String::as_str) {
                Some("alert") => Ok(()),
                other => Err(format!("expected a trailing alert, got {other:?}")),
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn stalled_handshake_times_out() {
    let config = ConnectionConfig { handshake_timeout: Duration::from_secs(5), ..Default::default() };
    let result = Scenario::new("timeout")
        .with_config(config)
        .hello(b"", "aes128")
        .advance(Duration::from_secs(5))
        .advance(Duration::from_secs(1))
        .finished()
        .oracle(oracle::all_of(vec![
            oracle::in_state(HandshakeState::Failed),
            oracle::error_count(1),
            oracle::custom(|world| {
                let ticks: Vec<_> = world.steps()[1..3].iter().map(|r| r.state_after).collect();
                if ticks == [HandshakeState::AwaitingFinished, HandshakeState::Failed] {
                    Ok(())
                } else {
                    Err(format!("unexpected tick states {ticks:?}"))
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn completed_handshake_never_times_out() {
    let result = Scenario::new("no timeout after completion")
        .hello(b"", "aes128")
        .finished()
        .advance(Duration::from_secs(3600))
        .oracle(oracle::all_of(vec![
            oracle::no_errors(),
            oracle::in_state(HandshakeState::ApplicationData),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn oracle_failures_are_reported() {
    let result = Scenario::new("wrong expectation")
        .hello(b"", "aes128")
        .oracle(oracle::in_state(HandshakeState::ApplicationData))
        .run();

    assert_eq!(
        result,
        Err("Scenario 'wrong expectation': expected state ApplicationData, found AwaitingFinished"
            .to_string())
    );
}
