//! ChangeCipherSpec sub-protocol.
//!
//! ```text
//!            initiate_local(spec) / initiate_remote(spec)
//! ┌────────┐ ───────────────────────────────────────────> ┌──────────┐
//! │ stable │                                              │ changing │
//! └────────┘ <─────────────────────────────────────────── └──────────┘
//!                         peer_acknowledged
//! ```
//!
//! A locally initiated change announces the new spec to the peer before
//! persisting it; a remote one only persists. Both finish with the server
//! done signal.

use std::sync::LazyLock;

use crate::{
    error::{ArgumentError, BoxError, DefinitionError, DispatchError},
    fsm::{Cursor, Definition, Symbol},
    performer::{Action, CipherSpec, Performer},
};

/// States of the cipher spec machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSpecState {
    /// No change in progress
    Stable,
    /// Change announced or persisted, waiting for the peer
    Changing,
}

/// Input identifiers used as table keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSpecInputKind {
    /// We start the change
    InitiateLocal,
    /// The peer started the change
    InitiateRemote,
    /// The peer confirmed the change
    PeerAcknowledged,
}

/// Output identifiers of the cipher spec machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSpecOutput {
    /// Tell the peer about the new spec
    EmitChangeRequest,
    /// Store the new spec
    PersistSpec,
    /// Signal completion
    EmitServerDone,
}

/// Input to the cipher spec machine, with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherSpecInput {
    /// Start a change to the given spec
    InitiateLocal(CipherSpec),
    /// Accept a peer-initiated change to the given spec
    InitiateRemote(CipherSpec),
    /// The peer acknowledged the change
    PeerAcknowledged,
}

impl CipherSpecInput {
    /// Table key of this input.
    pub fn kind(&self) -> CipherSpecInputKind {
        match self {
            Self::InitiateLocal(_) => CipherSpecInputKind::InitiateLocal,
            Self::InitiateRemote(_) => CipherSpecInputKind::InitiateRemote,
            Self::PeerAcknowledged => CipherSpecInputKind::PeerAcknowledged,
        }
    }

    /// Spec carried by the input, if any.
    pub fn spec(&self) -> Option<&CipherSpec> {
        match self {
            Self::InitiateLocal(spec) | Self::InitiateRemote(spec) => Some(spec),
            Self::PeerAcknowledged => None,
        }
    }
}

impl Symbol for CipherSpecState {
    fn name(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Changing => "changing",
        }
    }
}

impl Symbol for CipherSpecInputKind {
    fn name(self) -> &'static str {
        match self {
            Self::InitiateLocal => "initiate_local",
            Self::InitiateRemote => "initiate_remote",
            Self::PeerAcknowledged => "peer_acknowledged",
        }
    }
}

impl Symbol for CipherSpecOutput {
    fn name(self) -> &'static str {
        match self {
            Self::EmitChangeRequest => "emit_change_request",
            Self::PersistSpec => "persist_spec",
            Self::EmitServerDone => "emit_server_done",
        }
    }
}

/// Transition table of the cipher spec machine.
pub type CipherSpecDefinition = Definition<CipherSpecState, CipherSpecInputKind, CipherSpecOutput>;

static DEFINITION: LazyLock<Result<CipherSpecDefinition, DefinitionError>> = LazyLock::new(|| {
    use CipherSpecInputKind as I;
    use CipherSpecOutput as O;
    use CipherSpecState as S;

    Definition::builder("change_cipher_spec", S::Stable)
        .states([S::Stable, S::Changing])
        .transition(
            S::Stable,
            I::InitiateLocal,
            [O::EmitChangeRequest, O::PersistSpec, O::EmitServerDone],
            S::Changing,
        )
        .transition(S::Stable, I::InitiateRemote, [O::PersistSpec, O::EmitServerDone], S::Changing)
        .transition(S::Changing, I::PeerAcknowledged, [], S::Stable)
        .build()
});

/// Shared cipher spec table, built on first use.
pub fn definition() -> Result<&'static CipherSpecDefinition, DefinitionError> {
    DEFINITION.as_ref().map_err(Clone::clone)
}

/// One instance of the cipher spec machine.
///
/// Cheap to copy: the table is shared, only the current state is owned.
#[derive(Debug, Clone, Copy)]
pub struct ChangeCipherSpec {
    cursor: Cursor<'static, CipherSpecState, CipherSpecInputKind, CipherSpecOutput>,
}

impl ChangeCipherSpec {
    /// Machine in the `stable` state.
    pub fn new() -> Result<Self, DefinitionError> {
        Ok(Self { cursor: Cursor::new(definition()?) })
    }

    /// Current state.
    pub fn state(&self) -> CipherSpecState {
        self.cursor.state()
    }

    /// Feed `input`, running its outputs through `performer`.
    pub fn dispatch<P: Performer>(
        &mut self,
        input: CipherSpecInput,
        performer: &mut P,
    ) -> Result<Vec<P::Outcome>, DispatchError> {
        let spec = input.spec();
        self.cursor.dispatch(input.kind(), |output, results| -> Result<(), BoxError> {
            let action = match output {
                CipherSpecOutput::EmitServerDone => Action::EmitServerDone,
                CipherSpecOutput::EmitChangeRequest | CipherSpecOutput::PersistSpec => {
                    let spec = spec
                        .cloned()
                        .ok_or(ArgumentError::MissingCipherSpec { output: output.name() })?;
                    if output == CipherSpecOutput::EmitChangeRequest {
                        Action::EmitChangeRequest(spec)
                    } else {
                        Action::PersistSpec(spec)
                    }
                },
            };
            results.push(performer.perform(action)?);
            Ok(())
        })
    }

    /// Start a locally initiated change to `spec`.
    pub fn initiate_local<P: Performer>(
        &mut self,
        spec: CipherSpec,
        performer: &mut P,
    ) -> Result<Vec<P::Outcome>, DispatchError> {
        self.dispatch(CipherSpecInput::InitiateLocal(spec), performer)
    }

    /// Accept a change to `spec` started by the peer.
    pub fn initiate_remote<P: Performer>(
        &mut self,
        spec: CipherSpec,
        performer: &mut P,
    ) -> Result<Vec<P::Outcome>, DispatchError> {
        self.dispatch(CipherSpecInput::InitiateRemote(spec), performer)
    }

    /// Record the peer's acknowledgement.
    pub fn peer_acknowledged<P: Performer>(
        &mut self,
        performer: &mut P,
    ) -> Result<Vec<P::Outcome>, DispatchError> {
        self.dispatch(CipherSpecInput::PeerAcknowledged, performer)
    }
}
