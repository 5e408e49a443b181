//! Server-side handshake machine.
//!
//! ```text
//!  ┌──────┐ client_hello ┌────────────────────────┐ session_not_found ┌───────────────────┐
//!  │ idle │─────────────>│ checking_session_cache │──────────────────>│ awaiting_finished │
//!  └──────┘              └────────────────────────┘                   └───────────────────┘
//!                                     │ session_found                           │ client_finished
//!                                     v                                         v
//!                     ┌───────────────────────────┐ client_finished ┌──────────────────┐
//!                     │ awaiting_finished_resumed │────────────────>│ application_data │
//!                     └───────────────────────────┘                 └──────────────────┘
//!
//!  every state except failed ──alert──> failed (terminal)
//! ```
//!
//! The cache lookup is the resumption decision point: a hit runs the
//! abbreviated handshake (hello, cipher spec change, finished), a miss runs
//! the full one (hello, certificate chain, key exchange, certificate request,
//! hello done). Application data is only reachable after the client's
//! Finished.
//!
//! `run_change_cipher_spec` delegates to the session's own
//! [`ChangeCipherSpec`] instance with `initiate_local`; the sub-machine's
//! outcomes are spliced into the handshake outcomes at that position.

use std::sync::LazyLock;

use latchkey_proto::AlertDescription;

use crate::{
    cipher_spec::{ChangeCipherSpec, CipherSpecState},
    error::{ArgumentError, BoxError, DefinitionError, DispatchError},
    fsm::{Cursor, Definition, Symbol},
    performer::{Action, CipherSpec, Performer},
};

/// Handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Waiting for ClientHello
    Idle,
    /// ClientHello received, session cache being consulted
    CheckingSessionCache,
    /// Full handshake sent, waiting for the client's Finished
    AwaitingFinished,
    /// Abbreviated handshake sent, waiting for the client's Finished
    AwaitingFinishedResumed,
    /// Handshake complete
    ApplicationData,
    /// Aborted by an alert; accepts nothing
    Failed,
}

/// Input identifiers used as table keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeInputKind {
    /// ClientHello received
    ClientHello,
    /// Cache hit
    SessionFound,
    /// Cache miss
    SessionNotFound,
    /// Client Finished received
    ClientFinished,
    /// Abort
    Alert,
}

/// Handshake output identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeOutput {
    /// Send ServerHello
    SendServerHello,
    /// Send the certificate chain
    SendCertificate,
    /// Send ServerKeyExchange
    SendServerKeyExchange,
    /// Send CertificateRequest
    SendCertificateRequest,
    /// Send ServerHelloDone
    SendServerHelloDone,
    /// Delegate to the cipher spec machine with `initiate_local`
    RunChangeCipherSpec,
    /// Send Finished
    SendFinished,
    /// Send an alert
    SendAlert,
}

/// Handshake input with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeInput {
    /// ClientHello received
    ClientHello,
    /// Cache hit; resume with the cached spec
    SessionFound(CipherSpec),
    /// Cache miss; negotiate the given spec
    SessionNotFound(CipherSpec),
    /// Client Finished received
    ClientFinished,
    /// Abort, telling the peer why
    Alert(AlertDescription),
}

impl HandshakeInput {
    /// Table key of this input.
    pub fn kind(&self) -> HandshakeInputKind {
        match self {
            Self::ClientHello => HandshakeInputKind::ClientHello,
            Self::SessionFound(_) => HandshakeInputKind::SessionFound,
            Self::SessionNotFound(_) => HandshakeInputKind::SessionNotFound,
            Self::ClientFinished => HandshakeInputKind::ClientFinished,
            Self::Alert(_) => HandshakeInputKind::Alert,
        }
    }

    fn spec(&self) -> Option<&CipherSpec> {
        match self {
            Self::SessionFound(spec) | Self::SessionNotFound(spec) => Some(spec),
            _ => None,
        }
    }

    fn alert(&self) -> AlertDescription {
        match self {
            Self::Alert(description) => *description,
            _ => AlertDescription::HandshakeFailure,
        }
    }
}

impl Symbol for HandshakeState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingSessionCache => "checking_session_cache",
            Self::AwaitingFinished => "awaiting_finished",
            Self::AwaitingFinishedResumed => "awaiting_finished_resumed",
            Self::ApplicationData => "application_data",
            Self::Failed => "failed",
        }
    }
}

impl Symbol for HandshakeInputKind {
    fn name(self) -> &'static str {
        match self {
            Self::ClientHello => "client_hello",
            Self::SessionFound => "session_found",
            Self::SessionNotFound => "session_not_found",
            Self::ClientFinished => "client_finished",
            Self::Alert => "alert",
        }
    }
}

impl Symbol for HandshakeOutput {
    fn name(self) -> &'static str {
        match self {
            Self::SendServerHello => "send_server_hello",
            Self::SendCertificate => "send_certificate",
            Self::SendServerKeyExchange => "send_server_key_exchange",
            Self::SendCertificateRequest => "send_certificate_request",
            Self::SendServerHelloDone => "send_server_hello_done",
            Self::RunChangeCipherSpec => "run_change_cipher_spec",
            Self::SendFinished => "send_finished",
            Self::SendAlert => "send_alert",
        }
    }
}

/// Transition table of the handshake machine.
pub type HandshakeDefinition = Definition<HandshakeState, HandshakeInputKind, HandshakeOutput>;

static DEFINITION: LazyLock<Result<HandshakeDefinition, DefinitionError>> = LazyLock::new(|| {
    use HandshakeInputKind as I;
    use HandshakeOutput as O;
    use HandshakeState as S;

    Definition::builder("server_handshake", S::Idle)
        .states([
            S::Idle,
            S::CheckingSessionCache,
            S::AwaitingFinished,
            S::AwaitingFinishedResumed,
            S::ApplicationData,
            S::Failed,
        ])
        .transition(S::Idle, I::ClientHello, [], S::CheckingSessionCache)
        .transition(
            S::CheckingSessionCache,
            I::SessionFound,
            [O::SendServerHello, O::RunChangeCipherSpec, O::SendFinished],
            S::AwaitingFinishedResumed,
        )
        .transition(
            S::CheckingSessionCache,
            I::SessionNotFound,
            [
                O::SendServerHello,
                O::SendCertificate,
                O::SendServerKeyExchange,
                O::SendCertificateRequest,
                O::SendServerHelloDone,
            ],
            S::AwaitingFinished,
        )
        .transition(
            S::AwaitingFinished,
            I::ClientFinished,
            [O::RunChangeCipherSpec, O::SendFinished],
            S::ApplicationData,
        )
        .transition(S::AwaitingFinishedResumed, I::ClientFinished, [], S::ApplicationData)
        .transition_from_each(
            [
                S::Idle,
                S::CheckingSessionCache,
                S::AwaitingFinished,
                S::AwaitingFinishedResumed,
                S::ApplicationData,
            ],
            I::Alert,
            [O::SendAlert],
            S::Failed,
        )
        .build()
});

/// Shared handshake table, built on first use.
pub fn definition() -> Result<&'static HandshakeDefinition, DefinitionError> {
    DEFINITION.as_ref().map_err(Clone::clone)
}

/// Per-connection handshake state.
///
/// Owns its cursor, its cipher spec sub-machine and its performer; nothing
/// is shared with other sessions except the immutable tables.
#[derive(Debug)]
pub struct HandshakeSession<P> {
    cursor: Cursor<'static, HandshakeState, HandshakeInputKind, HandshakeOutput>,
    resumed: bool,
    negotiated: Option<CipherSpec>,
    cipher_spec: ChangeCipherSpec,
    performer: P,
}

impl<P: Performer> HandshakeSession<P> {
    /// Session in `idle` that performs actions through `performer`.
    pub fn new(performer: P) -> Result<Self, DefinitionError> {
        Ok(Self {
            cursor: Cursor::new(definition()?),
            resumed: false,
            negotiated: None,
            cipher_spec: ChangeCipherSpec::new()?,
            performer,
        })
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.cursor.state()
    }

    /// True once the session reached a state that accepts no input.
    pub fn is_terminal(&self) -> bool {
        self.cursor.is_terminal()
    }

    /// True when the session was resumed from the cache.
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    /// Spec agreed for this session, once the cache was consulted.
    pub fn negotiated(&self) -> Option<&CipherSpec> {
        self.negotiated.as_ref()
    }

    /// State of the embedded cipher spec machine.
    pub fn cipher_spec_state(&self) -> CipherSpecState {
        self.cipher_spec.state()
    }

    /// Performer used by this session.
    pub fn performer(&self) -> &P {
        &self.performer
    }

    /// Mutable access to the performer.
    pub fn performer_mut(&mut self) -> &mut P {
        &mut self.performer
    }

    /// Feed one input and return the outcomes of every output, in order.
    ///
    /// On error the session, including its cipher spec machine, is exactly
    /// as it was before the call.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if the input is not legal in the current state
    /// - `OutputFailed` if a performer call or the delegated cipher spec
    ///   change failed
    pub fn dispatch(&mut self, input: HandshakeInput) -> Result<Vec<P::Outcome>, DispatchError> {
        let snapshot = self.cipher_spec;
        let spec = input.spec().or(self.negotiated.as_ref()).cloned();
        let alert = input.alert();

        let Self { cursor, cipher_spec, performer, .. } = &mut *self;
        let result = cursor.dispatch(
            input.kind(),
            |output, results: &mut Vec<P::Outcome>| -> Result<(), BoxError> {
                let action = match output {
                    HandshakeOutput::RunChangeCipherSpec => {
                        let spec = spec
                            .clone()
                            .ok_or(ArgumentError::MissingCipherSpec { output: output.name() })?;
                        results.extend(cipher_spec.initiate_local(spec, &mut *performer)?);
                        return Ok(());
                    },
                    HandshakeOutput::SendServerHello => Action::SendServerHello,
                    HandshakeOutput::SendCertificate => Action::SendCertificate,
                    HandshakeOutput::SendServerKeyExchange => Action::SendServerKeyExchange,
                    HandshakeOutput::SendCertificateRequest => Action::SendCertificateRequest,
                    HandshakeOutput::SendServerHelloDone => Action::SendServerHelloDone,
                    HandshakeOutput::SendFinished => Action::SendFinished,
                    HandshakeOutput::SendAlert => Action::SendAlert(alert),
                };
                results.push(performer.perform(action)?);
                Ok(())
            },
        );

        if result.is_err() {
            self.cipher_spec = snapshot;
            return result;
        }

        match input {
            HandshakeInput::SessionFound(spec) => {
                self.resumed = true;
                self.negotiated = Some(spec);
            },
            HandshakeInput::SessionNotFound(spec) => self.negotiated = Some(spec),
            _ => {},
        }
        result
    }

    /// Forward the peer's cipher spec acknowledgement to the sub-machine.
    ///
    /// The handshake state is not affected.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the session failed or no change is pending.
    pub fn acknowledge_cipher_spec(&mut self) -> Result<Vec<P::Outcome>, DispatchError> {
        if self.is_terminal() {
            let machine = self.cursor.definition().name();
            tracing::debug!(machine, "cipher spec acknowledgement after termination");
            return Err(DispatchError::InvalidTransition {
                machine,
                state: self.state().name(),
                input: "peer_acknowledged",
            });
        }
        self.cipher_spec.peer_acknowledged(&mut self.performer)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use proptest::prelude::*;

    use super::*;
    use crate::{fsm::Transition, performer::IdentityPerformer};

    const FAILURE: AlertDescription = AlertDescription::HandshakeFailure;

    const ALL_STATES: [HandshakeState; 6] = [
        HandshakeState::Idle,
        HandshakeState::CheckingSessionCache,
        HandshakeState::AwaitingFinished,
        HandshakeState::AwaitingFinishedResumed,
        HandshakeState::ApplicationData,
        HandshakeState::Failed,
    ];

    fn spec() -> CipherSpec {
        CipherSpec::new("spec_change")
    }

    fn all_inputs() -> [HandshakeInput; 5] {
        [
            HandshakeInput::ClientHello,
            HandshakeInput::SessionFound(spec()),
            HandshakeInput::SessionNotFound(spec()),
            HandshakeInput::ClientFinished,
            HandshakeInput::Alert(FAILURE),
        ]
    }

    fn session() -> HandshakeSession<IdentityPerformer> {
        HandshakeSession::new(IdentityPerformer).unwrap()
    }

    fn session_in(state: HandshakeState) -> HandshakeSession<IdentityPerformer> {
        let path = match state {
            HandshakeState::Idle => vec![],
            HandshakeState::CheckingSessionCache => vec![HandshakeInput::ClientHello],
            HandshakeState::AwaitingFinished => {
                vec![HandshakeInput::ClientHello, HandshakeInput::SessionNotFound(spec())]
            },
            HandshakeState::AwaitingFinishedResumed => {
                vec![HandshakeInput::ClientHello, HandshakeInput::SessionFound(spec())]
            },
            HandshakeState::ApplicationData => vec![
                HandshakeInput::ClientHello,
                HandshakeInput::SessionNotFound(spec()),
                HandshakeInput::ClientFinished,
            ],
            HandshakeState::Failed => vec![HandshakeInput::Alert(FAILURE)],
        };
        let mut session = session();
        for input in path {
            session.dispatch(input).unwrap();
        }
        assert_eq!(session.state(), state);
        session
    }

    fn rendered(actions: &[Action]) -> Vec<String> {
        actions.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn definition_builds() {
        let definition = definition().unwrap();
        assert_eq!(definition.initial(), HandshakeState::Idle);
        assert_eq!(definition.states(), &ALL_STATES);
        assert!(definition.is_terminal(HandshakeState::Failed));
    }

    #[test]
    fn full_handshake() {
        let mut session = session();

        assert!(session.dispatch(HandshakeInput::ClientHello).unwrap().is_empty());
        assert_eq!(session.state(), HandshakeState::CheckingSessionCache);

        let actions = session.dispatch(HandshakeInput::SessionNotFound(spec())).unwrap();
        assert_eq!(rendered(&actions), [
            "server hello",
            "certificate response",
            "server key exchange",
            "certificate request",
            "server hello done",
        ]);
        assert_eq!(session.state(), HandshakeState::AwaitingFinished);
        assert!(!session.is_resumed());

        let actions = session.dispatch(HandshakeInput::ClientFinished).unwrap();
        assert_eq!(rendered(&actions), [
            "change to spec_change",
            "saving cipherspec",
            "server done",
            "finished",
        ]);
        assert_eq!(session.state(), HandshakeState::ApplicationData);
        assert_eq!(session.cipher_spec_state(), CipherSpecState::Changing);
    }

    #[test]
    fn resumed_handshake() {
        let mut session = session();
        session.dispatch(HandshakeInput::ClientHello).unwrap();

        let actions = session.dispatch(HandshakeInput::SessionFound(spec())).unwrap();
        assert_eq!(rendered(&actions), [
            "server hello",
            "change to spec_change",
            "saving cipherspec",
            "server done",
            "finished",
        ]);
        assert_eq!(session.state(), HandshakeState::AwaitingFinishedResumed);
        assert!(session.is_resumed());
        assert_eq!(session.negotiated(), Some(&spec()));

        let actions = session.dispatch(HandshakeInput::ClientFinished).unwrap();
        assert!(actions.is_empty());
        assert_eq!(session.state(), HandshakeState::ApplicationData);
    }

    #[test]
    fn alert_from_every_live_state_fails_the_session() {
        for state in &ALL_STATES[..5] {
            let mut session = session_in(*state);
            let actions = session.dispatch(HandshakeInput::Alert(FAILURE)).unwrap();
            assert_eq!(actions, vec![Action::SendAlert(FAILURE)]);
            assert_eq!(session.state(), HandshakeState::Failed);
            assert!(session.is_terminal());

            for input in all_inputs() {
                let err = session.dispatch(input).unwrap_err();
                assert!(err.is_invalid_transition());
                assert_eq!(session.state(), HandshakeState::Failed);
            }
        }
    }

    #[test]
    fn alert_carries_its_description() {
        let mut session = session_in(HandshakeState::AwaitingFinished);
        let actions =
            session.dispatch(HandshakeInput::Alert(AlertDescription::RecordOverflow)).unwrap();
        assert_eq!(actions, vec![Action::SendAlert(AlertDescription::RecordOverflow)]);
    }

    #[test]
    fn absent_pairs_are_rejected_in_every_state() {
        let definition = definition().unwrap();
        for state in ALL_STATES {
            for input in all_inputs() {
                if definition.transition(state, input.kind()).is_some() {
                    continue;
                }
                let mut session = session_in(state);
                let err = session.dispatch(input).unwrap_err();
                assert!(matches!(err, DispatchError::InvalidTransition { .. }));
                assert_eq!(session.state(), state);
            }
        }
    }

    #[test]
    fn acknowledgement_goes_to_sub_machine() {
        let mut session = session_in(HandshakeState::ApplicationData);
        assert_eq!(session.cipher_spec_state(), CipherSpecState::Changing);

        assert!(session.acknowledge_cipher_spec().unwrap().is_empty());
        assert_eq!(session.cipher_spec_state(), CipherSpecState::Stable);
        assert_eq!(session.state(), HandshakeState::ApplicationData);

        assert!(session.acknowledge_cipher_spec().unwrap_err().is_invalid_transition());
    }

    #[test]
    fn acknowledgement_rejected_after_failure() {
        let mut session = session_in(HandshakeState::AwaitingFinishedResumed);
        session.dispatch(HandshakeInput::Alert(FAILURE)).unwrap();

        let err = session.acknowledge_cipher_spec().unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { state: "failed", .. }));
        assert_eq!(session.cipher_spec_state(), CipherSpecState::Changing);
    }

    /// Fails the first action matching `fail_on`.
    struct FailOn {
        fail_on: Action,
        seen: Vec<Action>,
    }

    impl Performer for FailOn {
        type Outcome = Action;
        type Error = io::Error;

        fn perform(&mut self, action: Action) -> Result<Action, io::Error> {
            self.seen.push(action.clone());
            if action == self.fail_on {
                return Err(io::Error::other(format!("{action} failed")));
            }
            Ok(action)
        }
    }

    #[test]
    fn failure_after_sub_machine_rolls_everything_back() {
        let performer = FailOn { fail_on: Action::SendFinished, seen: Vec::new() };
        let mut session = HandshakeSession::new(performer).unwrap();
        session.dispatch(HandshakeInput::ClientHello).unwrap();

        let err = session.dispatch(HandshakeInput::SessionFound(spec())).unwrap_err();
        assert!(matches!(err, DispatchError::OutputFailed { output: "send_finished", .. }));
        assert_eq!(session.state(), HandshakeState::CheckingSessionCache);
        assert_eq!(session.cipher_spec_state(), CipherSpecState::Stable);
        assert!(!session.is_resumed());
        assert_eq!(session.negotiated(), None);
        assert_eq!(session.performer().seen.len(), 5);
    }

    #[test]
    fn sub_machine_failure_chains_as_source() {
        let performer = FailOn { fail_on: Action::PersistSpec(spec()), seen: Vec::new() };
        let mut session = HandshakeSession::new(performer).unwrap();
        session.dispatch(HandshakeInput::ClientHello).unwrap();

        let err = session.dispatch(HandshakeInput::SessionFound(spec())).unwrap_err();
        assert!(matches!(err, DispatchError::OutputFailed { output: "run_change_cipher_spec", .. }));

        let inner = std::error::Error::source(&err).unwrap();
        let inner = inner.downcast_ref::<DispatchError>().unwrap();
        assert!(matches!(inner, DispatchError::OutputFailed { output: "persist_spec", .. }));
        assert_eq!(session.state(), HandshakeState::CheckingSessionCache);
    }

    #[test]
    fn retry_after_failure_succeeds() {
        let performer = FailOn { fail_on: Action::SendCertificate, seen: Vec::new() };
        let mut session = HandshakeSession::new(performer).unwrap();
        session.dispatch(HandshakeInput::ClientHello).unwrap();
        assert!(session.dispatch(HandshakeInput::SessionNotFound(spec())).is_err());

        session.performer_mut().fail_on = Action::SendAlert(FAILURE);
        let actions = session.dispatch(HandshakeInput::SessionNotFound(spec())).unwrap();
        assert_eq!(actions.len(), 5);
        assert_eq!(session.state(), HandshakeState::AwaitingFinished);
    }

    fn arb_input() -> impl Strategy<Value = HandshakeInput> {
        prop_oneof![
            Just(HandshakeInput::ClientHello),
            "[a-z]{1,8}".prop_map(|name| HandshakeInput::SessionFound(CipherSpec::new(name))),
            "[a-z]{1,8}".prop_map(|name| HandshakeInput::SessionNotFound(CipherSpec::new(name))),
            Just(HandshakeInput::ClientFinished),
            Just(HandshakeInput::Alert(FAILURE)),
        ]
    }

    proptest! {
        #[test]
        fn random_inputs_follow_the_table(inputs in prop::collection::vec(arb_input(), 0..24)) {
            let definition = definition().unwrap();
            let mut session = session();

            for input in inputs {
                let before = session.state();
                let expected = definition.transition(before, input.kind()).map(Transition::next);
                match (session.dispatch(input), expected) {
                    (Ok(_), Some(next)) => {
                        prop_assert_eq!(session.state(), next);
                    },
                    (Err(err), None) => {
                        prop_assert!(err.is_invalid_transition());
                        prop_assert_eq!(session.state(), before);
                    },
                    (result, expected) => {
                        prop_assert!(false, "dispatch {:?} but table says {:?}", result.map(|_| ()), expected);
                    },
                }
            }
        }
    }
}
