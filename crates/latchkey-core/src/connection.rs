//! Connection driver for the server handshake.
//!
//! Bridges decoded client events, the session cache and the wall clock to a
//! [`HandshakeSession`].
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as a parameter; nothing reads the clock
//! - Methods return the performer outcomes of every dispatched input
//! - The caller ships those outcomes (for [`crate::RecordPerformer`], records)
//!
//! # Lifecycle
//!
//! 1. `Hello`: dispatches `client_hello`, consults the cache, then dispatches
//!    `session_found` or `session_not_found`. A hello arriving while the
//!    session is still in `checking_session_cache` redoes only the lookup
//!    and the decision, which is how a failed decision is retried.
//! 2. `Finished`: dispatches `client_finished`
//! 3. `CipherSpecAcknowledged`: returns the cipher spec machine to stable
//! 4. `Alert`, a malformed record or a timeout: dispatches `alert`. A
//!    malformed record sends the description from
//!    [`RecordError::alert_description`], everything else `handshake_failure`.
//!
//! # Timeouts
//!
//! The machines themselves never time out. [`Connection::tick`] aborts the
//! handshake if it has not reached `application_data` within
//! [`ConnectionConfig::handshake_timeout`] of the connection being created.

use std::time::{Duration, Instant};

use latchkey_proto::{AlertDescription, ProtocolVersion, RecordError, RecordPhase};

use crate::{
    collaborators::{SessionCache, SessionId},
    error::ConnectionError,
    handshake::{HandshakeInput, HandshakeSession, HandshakeState},
    performer::{CipherSpec, Performer},
};

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Time allowed to reach `application_data`
    pub handshake_timeout: Duration,
    /// Version stamped on outgoing records
    pub protocol_version: ProtocolVersion,
    /// Phase whose length bound applies to outgoing records
    pub record_phase: RecordPhase,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            protocol_version: ProtocolVersion::TLS_1_2,
            record_phase: RecordPhase::Plaintext,
        }
    }
}

/// Client-side events, already decoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// ClientHello
    Hello {
        /// Session the client wants to resume; empty for none
        session_id: SessionId,
        /// Spec chosen for a full handshake
        selected: CipherSpec,
    },
    /// Client Finished
    Finished,
    /// The client switched to the new cipher spec
    CipherSpecAcknowledged,
    /// The client sent an alert
    Alert,
}

/// One server-side connection attempt.
#[derive(Debug)]
pub struct Connection<P, C> {
    session: HandshakeSession<P>,
    cache: C,
    config: ConnectionConfig,
    started: Instant,
}

impl<P: Performer, C: SessionCache> Connection<P, C> {
    /// Create a connection whose handshake starts at `now`.
    pub fn new(
        now: Instant,
        config: ConnectionConfig,
        performer: P,
        cache: C,
    ) -> Result<Self, ConnectionError> {
        Ok(Self {
            session: HandshakeSession::new(performer)?,
            cache,
            config,
            started: now,
        })
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.session.state()
    }

    /// Underlying handshake session.
    pub fn session(&self) -> &HandshakeSession<P> {
        &self.session
    }

    /// Mutable access to the handshake session.
    pub fn session_mut(&mut self) -> &mut HandshakeSession<P> {
        &mut self.session
    }

    /// Configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Session cache consulted on hello.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Handle one client event.
    ///
    /// A hello is two dispatches. If the second one fails the session stays
    /// in `checking_session_cache` and the error is returned; handing the
    /// hello in again retries the lookup and the decision.
    ///
    /// # Errors
    ///
    /// `Dispatch` when the event is not legal now or an output failed.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<P::Outcome>, ConnectionError> {
        let outcomes = match event {
            ClientEvent::Hello { session_id, selected } => {
                let mut outcomes = if self.state() == HandshakeState::CheckingSessionCache {
                    tracing::debug!("retrying session cache decision");
                    Vec::new()
                } else {
                    self.session.dispatch(HandshakeInput::ClientHello)?
                };
                let input = match self.cache.lookup(&session_id) {
                    Some(cached) if !session_id.is_empty() => {
                        tracing::debug!(spec = %cached.cipher_spec, "session cache hit");
                        HandshakeInput::SessionFound(cached.cipher_spec)
                    },
                    _ => {
                        tracing::debug!(spec = %selected, "session cache miss");
                        HandshakeInput::SessionNotFound(selected)
                    },
                };
                outcomes.extend(self.session.dispatch(input)?);
                outcomes
            },
            ClientEvent::Finished => self.session.dispatch(HandshakeInput::ClientFinished)?,
            ClientEvent::CipherSpecAcknowledged => self.session.acknowledge_cipher_spec()?,
            ClientEvent::Alert => self.abort(AlertDescription::HandshakeFailure)?,
        };
        Ok(outcomes)
    }

    /// Terminate the handshake because a record could not be decoded.
    ///
    /// # Errors
    ///
    /// `Dispatch` if the session already failed or sending the alert failed.
    pub fn record_error(
        &mut self,
        error: &RecordError,
    ) -> Result<Vec<P::Outcome>, ConnectionError> {
        tracing::warn!(
            %error,
            alert = ?error.alert_description(),
            state = ?self.state(),
            "malformed record, aborting handshake"
        );
        self.abort(error.alert_description())
    }

    /// Drive the `alert` input, sending `description` to the peer.
    ///
    /// # Errors
    ///
    /// `Dispatch` if the session already failed or sending the alert failed.
    pub fn abort(
        &mut self,
        description: AlertDescription,
    ) -> Result<Vec<P::Outcome>, ConnectionError> {
        Ok(self.session.dispatch(HandshakeInput::Alert(description))?)
    }

    /// Elapsed time if the handshake overran its deadline.
    ///
    /// Always `None` once the handshake completed or failed.
    #[must_use]
    pub fn check_timeout(&self, now: Instant) -> Option<Duration> {
        if self.state() == HandshakeState::ApplicationData || self.session.is_terminal() {
            return None;
        }

        let elapsed = now.duration_since(self.started);
        if elapsed > self.config.handshake_timeout { Some(elapsed) } else { None }
    }

    /// Abort the handshake if it timed out.
    ///
    /// Returns the outcomes of the abort, or nothing if there was no timeout.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<P::Outcome>, ConnectionError> {
        let Some(elapsed) = self.check_timeout(now) else {
            return Ok(Vec::new());
        };

        tracing::warn!(?elapsed, state = ?self.state(), "handshake timeout");
        self.abort(AlertDescription::HandshakeFailure)
    }
}
