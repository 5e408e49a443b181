//! Latchkey handshake core
//!
//! Server-side TLS handshake sequencing as explicit transition tables,
//! completely decoupled from I/O, cryptography and time.
//!
//! # Architecture
//!
//! A machine is an immutable [`fsm::Definition`] built and validated once per
//! process, plus a small per-session [`fsm::Cursor`]. Dispatching an input
//! looks up `(state, input)`, runs the declared outputs in order through a
//! [`Performer`] and only then moves the cursor. An illegal input or a failed
//! output leaves the session exactly where it was.
//!
//! Outputs are declarative. The performer decides what they mean: the
//! [`IdentityPerformer`] returns each [`Action`] unchanged for exact
//! assertions, while [`RecordPerformer`] turns them into outgoing records.
//!
//! # Components
//!
//! - [`fsm`]: Generic transition-table engine
//! - [`cipher_spec`]: ChangeCipherSpec sub-protocol (stable/changing)
//! - [`handshake`]: Server handshake with resumption branch and failure path
//! - [`performer`]: Action descriptors and the performer capability
//! - [`collaborators`]: Session cache, certificates, message bodies, spec store
//! - [`record_performer`]: Performer emitting TLS records
//! - [`connection`]: Connection driver (client events, cache lookup, timeout)
//! - [`error`]: Definition, dispatch and connection errors
#![forbid(unsafe_code)]

pub mod cipher_spec;
pub mod collaborators;
pub mod connection;
pub mod error;
pub mod fsm;
pub mod handshake;
pub mod performer;
pub mod record_performer;

pub use cipher_spec::{ChangeCipherSpec, CipherSpecInput, CipherSpecState};
pub use collaborators::{
    CertificateProvider, CipherSpecStore, MemorySessionCache, MessageBodies, SessionCache,
    SessionId, SessionState,
};
pub use connection::{ClientEvent, Connection, ConnectionConfig};
pub use error::{ConnectionError, DefinitionError, DispatchError};
pub use handshake::{HandshakeInput, HandshakeSession, HandshakeState};
pub use performer::{Action, CipherSpec, IdentityPerformer, Performer};
pub use record_performer::{RecordPerformer, RecordPerformerError};
