//! Reference model of a server connection.
//!
//! [`ModelConnection`] re-states the handshake rules as a plain `match`,
//! independent of the transition tables. Model-based tests feed the same
//! [`Operation`] sequence to the model and to a real [`World`] and compare
//! every result.
//!
//! Operation sequences come from proptest, from fuzzer bytes through
//! `arbitrary`, or from a seed through [`random_operations`].

use std::time::Duration;

use arbitrary::{Arbitrary, Unstructured};
use latchkey_core::{
    CipherSpec, CipherSpecState, ClientEvent, ConnectionConfig, ConnectionError, HandshakeState,
    MemorySessionCache, SessionId, SessionState,
};
use latchkey_proto::RecordError;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    recording::RecordingPerformer,
    scenario::{Step, World},
};

/// Session id present in the model's cache.
pub const CACHED_ID: &[u8] = b"cached-session";
/// Spec stored under [`CACHED_ID`].
pub const CACHED_SPEC: &str = "cached";
/// Spec proposed for full handshakes.
pub const FRESH_SPEC: &str = "fresh";

/// One operation against a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// ClientHello, with or without a cached session id
    Hello {
        /// Offer [`CACHED_ID`] instead of an empty id
        resume: bool,
    },
    /// Client Finished
    Finished,
    /// Client acknowledged the cipher spec change
    Acknowledge,
    /// Client alert
    Alert,
    /// A record failed to decode
    CorruptRecord,
    /// Clock advance followed by a tick
    AdvanceTime {
        /// Seconds to advance
        secs: u8,
    },
}

impl Operation {
    /// The scenario step that performs this operation.
    pub fn to_step(self) -> Step {
        match self {
            Self::Hello { resume } => Step::Event(ClientEvent::Hello {
                session_id: SessionId::new(if resume { CACHED_ID } else { &[] }),
                selected: CipherSpec::new(FRESH_SPEC),
            }),
            Self::Finished => Step::Event(ClientEvent::Finished),
            Self::Acknowledge => Step::Event(ClientEvent::CipherSpecAcknowledged),
            Self::Alert => Step::Event(ClientEvent::Alert),
            Self::CorruptRecord => Step::MalformedRecord(RecordError::UnknownContentType(0)),
            Self::AdvanceTime { secs } => Step::Advance(Duration::from_secs(u64::from(secs))),
        }
    }
}

/// Outcome predicted by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResult {
    /// Accepted, with these action descriptors
    Ok(Vec<String>),
    /// Refused, state unchanged
    Rejected,
}

impl ModelResult {
    fn ok(actions: &[&str]) -> Self {
        Self::Ok(actions.iter().map(ToString::to_string).collect())
    }
}

/// Reference connection.
#[derive(Debug, Clone)]
pub struct ModelConnection {
    state: HandshakeState,
    cipher_spec: CipherSpecState,
    resumed: bool,
    elapsed: Duration,
    timeout: Duration,
}

impl ModelConnection {
    /// Fresh connection with the given handshake timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: HandshakeState::Idle,
            cipher_spec: CipherSpecState::Stable,
            resumed: false,
            elapsed: Duration::ZERO,
            timeout,
        }
    }

    /// Handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Cipher spec state.
    pub fn cipher_spec(&self) -> CipherSpecState {
        self.cipher_spec
    }

    /// Whether the session was resumed.
    pub fn resumed(&self) -> bool {
        self.resumed
    }

    /// Apply `op` and predict its result.
    pub fn apply(&mut self, op: Operation) -> ModelResult {
        use HandshakeState as S;

        match (op, self.state) {
            (Operation::Hello { resume: true }, S::Idle | S::CheckingSessionCache) => {
                self.state = S::AwaitingFinishedResumed;
                self.cipher_spec = CipherSpecState::Changing;
                self.resumed = true;
                ModelResult::ok(&[
                    "server hello",
                    "change to cached",
                    "saving cipherspec",
                    "server done",
                    "finished",
                ])
            },
            (Operation::Hello { resume: false }, S::Idle | S::CheckingSessionCache) => {
                self.state = S::AwaitingFinished;
                ModelResult::ok(&[
                    "server hello",
                    "certificate response",
                    "server key exchange",
                    "certificate request",
                    "server hello done",
                ])
            },
            (Operation::Finished, S::AwaitingFinished) => {
                self.state = S::ApplicationData;
                self.cipher_spec = CipherSpecState::Changing;
                ModelResult::ok(&["change to fresh", "saving cipherspec", "server done", "finished"])
            },
            (Operation::Finished, S::AwaitingFinishedResumed) => {
                self.state = S::ApplicationData;
                ModelResult::ok(&[])
            },
            (Operation::Acknowledge, state)
                if state != S::Failed && self.cipher_spec == CipherSpecState::Changing =>
            {
                self.cipher_spec = CipherSpecState::Stable;
                ModelResult::ok(&[])
            },
            (Operation::Alert | Operation::CorruptRecord, state) if state != S::Failed => {
                self.state = S::Failed;
                ModelResult::ok(&["alert"])
            },
            (Operation::AdvanceTime { secs }, state) => {
                self.elapsed += Duration::from_secs(u64::from(secs));
                let live = !matches!(state, S::ApplicationData | S::Failed);
                if live && self.elapsed > self.timeout {
                    self.state = S::Failed;
                    ModelResult::ok(&["alert"])
                } else {
                    ModelResult::ok(&[])
                }
            },
            _ => ModelResult::Rejected,
        }
    }
}

/// Real connection set up like the model: [`CACHED_ID`] is resumable.
pub fn model_world(timeout: Duration) -> Result<World, ConnectionError> {
    let mut cache = MemorySessionCache::new();
    cache.insert(
        SessionId::new(CACHED_ID),
        SessionState { cipher_spec: CipherSpec::new(CACHED_SPEC) },
    );
    let config = ConnectionConfig { handshake_timeout: timeout, ..ConnectionConfig::default() };
    World::start(config, RecordingPerformer::new(), cache)
}

/// Deterministic operation sequence derived from `seed`.
pub fn random_operations(seed: u64, len: usize) -> Vec<Operation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; len * 8];
    rng.fill_bytes(&mut bytes);

    let mut unstructured = Unstructured::new(&bytes);
    (0..len).map_while(|_| Operation::arbitrary(&mut unstructured).ok()).collect()
}
