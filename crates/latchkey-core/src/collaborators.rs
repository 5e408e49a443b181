//! Capabilities the handshake consumes but never implements.
//!
//! Session storage, certificate management, handshake message bodies and
//! cipher spec persistence all live outside this crate. They are reached
//! through these narrow traits so that production adapters and test doubles
//! are interchangeable.

use std::{collections::HashMap, error::Error};

use bytes::Bytes;

use crate::performer::CipherSpec;

/// Opaque session identifier chosen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Bytes);

impl SessionId {
    /// Wrap raw identifier bytes.
    pub fn new(id: impl Into<Bytes>) -> Self {
        Self(id.into())
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for the empty identifier, which never resumes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resumable state of a past session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Spec the session was established with
    pub cipher_spec: CipherSpec,
}

/// Lookup side of the session cache.
///
/// Storage and eviction policy belong to the implementation.
pub trait SessionCache {
    /// Resumable state for `id`, if any.
    fn lookup(&self, id: &SessionId) -> Option<SessionState>;
}

/// Source of the server's certificate chain.
pub trait CertificateProvider {
    /// Encoded certificate chain, sent as the Certificate message body.
    fn chain(&self) -> Bytes;
}

/// Producer of handshake message bodies.
///
/// Bodies involve key exchange and transcript hashing, which belong to the
/// crypto collaborator. They are opaque to the core.
pub trait MessageBodies {
    /// Failure to produce a body.
    type Error: Error + Send + Sync + 'static;

    /// ServerHello body.
    fn server_hello(&mut self) -> Result<Bytes, Self::Error>;

    /// ServerKeyExchange body.
    fn server_key_exchange(&mut self) -> Result<Bytes, Self::Error>;

    /// CertificateRequest body.
    fn certificate_request(&mut self) -> Result<Bytes, Self::Error>;

    /// Finished body (verify data).
    fn finished(&mut self) -> Result<Bytes, Self::Error>;
}

/// Local persistence of a newly agreed cipher spec.
pub trait CipherSpecStore {
    /// Failure to persist.
    type Error: Error + Send + Sync + 'static;

    /// Make `spec` the pending spec for this connection.
    fn persist(&mut self, spec: &CipherSpec) -> Result<(), Self::Error>;
}

impl<C: SessionCache + ?Sized> SessionCache for &C {
    fn lookup(&self, id: &SessionId) -> Option<SessionState> {
        (**self).lookup(id)
    }
}

/// Unbounded in-memory session cache.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionCache {
    sessions: HashMap<SessionId, SessionState>,
}

impl MemorySessionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state` under `id`, replacing any previous entry.
    ///
    /// The empty identifier is never stored.
    pub fn insert(&mut self, id: SessionId, state: SessionState) {
        if id.is_empty() {
            return;
        }
        self.sessions.insert(id, state);
    }

    /// Drop the entry for `id`.
    pub fn remove(&mut self, id: &SessionId) -> Option<SessionState> {
        self.sessions.remove(id)
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionCache for MemorySessionCache {
    fn lookup(&self, id: &SessionId) -> Option<SessionState> {
        self.sessions.get(id).cloned()
    }
}
