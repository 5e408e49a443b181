//! Performer that turns handshake actions into outgoing records.
//!
//! Handshake messages are framed with their 4-byte envelope and split into
//! records no larger than the configured phase allows. The cipher spec
//! change request becomes a ChangeCipherSpec record and an alert becomes a
//! fatal alert with the description the action carries. Persisting the cipher spec goes to the
//! [`CipherSpecStore`]; the server done signal has no wire form.

use bytes::Bytes;
use latchkey_proto::{
    Alert, ContentType, HandshakeMessage, HandshakeType, ProtocolVersion,
    RecordError, RecordPhase, TlsRecord, alert::CHANGE_CIPHER_SPEC, record::fragment,
};
use thiserror::Error;

use crate::{
    collaborators::{CertificateProvider, CipherSpecStore, MessageBodies},
    connection::ConnectionConfig,
    error::BoxError,
    performer::{Action, Performer},
};

/// Failure to produce the records for an action.
#[derive(Debug, Error)]
pub enum RecordPerformerError {
    /// Framing the message failed
    #[error("record framing failed")]
    Record(#[from] RecordError),

    /// The crypto collaborator could not produce a message body
    #[error("message body unavailable")]
    Body(#[source] BoxError),

    /// The cipher spec could not be persisted
    #[error("cipher spec not persisted")]
    Store(#[source] BoxError),
}

/// [`Performer`] whose outcome is the list of records to send.
#[derive(Debug)]
pub struct RecordPerformer<C, B, K> {
    version: ProtocolVersion,
    phase: RecordPhase,
    certificates: C,
    bodies: B,
    store: K,
}

impl<C, B, K> RecordPerformer<C, B, K>
where
    C: CertificateProvider,
    B: MessageBodies,
    K: CipherSpecStore,
{
    /// Performer stamping records with the configured version and phase.
    pub fn new(config: &ConnectionConfig, certificates: C, bodies: B, store: K) -> Self {
        Self {
            version: config.protocol_version,
            phase: config.record_phase,
            certificates,
            bodies,
            store,
        }
    }

    /// Cipher spec store.
    pub fn store(&self) -> &K {
        &self.store
    }

    fn handshake(
        &self,
        msg_type: HandshakeType,
        body: Bytes,
    ) -> Result<Vec<TlsRecord>, RecordPerformerError> {
        let payload = HandshakeMessage::new(msg_type, body).to_bytes()?;
        Ok(fragment(ContentType::Handshake, self.version, payload, self.phase))
    }

    fn body(result: Result<Bytes, B::Error>) -> Result<Bytes, RecordPerformerError> {
        result.map_err(|err| RecordPerformerError::Body(Box::new(err)))
    }
}

impl<C, B, K> Performer for RecordPerformer<C, B, K>
where
    C: CertificateProvider,
    B: MessageBodies,
    K: CipherSpecStore,
{
    type Outcome = Vec<TlsRecord>;
    type Error = RecordPerformerError;

    fn perform(&mut self, action: Action) -> Result<Vec<TlsRecord>, RecordPerformerError> {
        let records = match &action {
            Action::SendServerHello => {
                let body = Self::body(self.bodies.server_hello())?;
                self.handshake(HandshakeType::ServerHello, body)?
            },
            Action::SendCertificate => {
                self.handshake(HandshakeType::Certificate, self.certificates.chain())?
            },
            Action::SendServerKeyExchange => {
                let body = Self::body(self.bodies.server_key_exchange())?;
                self.handshake(HandshakeType::ServerKeyExchange, body)?
            },
            Action::SendCertificateRequest => {
                let body = Self::body(self.bodies.certificate_request())?;
                self.handshake(HandshakeType::CertificateRequest, body)?
            },
            Action::SendServerHelloDone => {
                self.handshake(HandshakeType::ServerHelloDone, Bytes::new())?
            },
            Action::SendFinished => {
                let body = Self::body(self.bodies.finished())?;
                self.handshake(HandshakeType::Finished, body)?
            },
            Action::SendAlert(description) => {
                let alert = Alert::fatal(*description);
                vec![TlsRecord::new(
                    ContentType::Alert,
                    self.version,
                    Bytes::copy_from_slice(&alert.to_bytes()),
                )]
            },
            Action::EmitChangeRequest(_) => vec![TlsRecord::new(
                ContentType::ChangeCipherSpec,
                self.version,
                Bytes::from_static(&CHANGE_CIPHER_SPEC),
            )],
            Action::PersistSpec(spec) => {
                self.store.persist(spec).map_err(|err| RecordPerformerError::Store(Box::new(err)))?;
                Vec::new()
            },
            Action::EmitServerDone => Vec::new(),
        };

        tracing::trace!(%action, records = records.len(), "action performed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use latchkey_proto::{AlertDescription, RecordCodec};

    use super::*;
    use crate::performer::CipherSpec;

    #[derive(Debug, Default)]
    struct Chain(Vec<u8>);

    impl CertificateProvider for Chain {
        fn chain(&self) -> Bytes {
            Bytes::copy_from_slice(&self.0)
        }
    }

    #[derive(Debug, Default)]
    struct Bodies {
        broken: bool,
    }

    impl MessageBodies for Bodies {
        type Error = io::Error;

        fn server_hello(&mut self) -> Result<Bytes, io::Error> {
            if self.broken {
                return Err(io::Error::other("no randomness"));
            }
            Ok(Bytes::from_static(b"hello"))
        }

        fn server_key_exchange(&mut self) -> Result<Bytes, io::Error> {
            Ok(Bytes::from_static(b"kx"))
        }

        fn certificate_request(&mut self) -> Result<Bytes, io::Error> {
            Ok(Bytes::from_static(b"cr"))
        }

        fn finished(&mut self) -> Result<Bytes, io::Error> {
            Ok(Bytes::from_static(b"verify"))
        }
    }

    #[derive(Debug, Default)]
    struct Store {
        persisted: Vec<CipherSpec>,
        full: bool,
    }

    #[derive(Debug, Error)]
    #[error("store full")]
    struct StoreFull;

    impl CipherSpecStore for Store {
        type Error = StoreFull;

        fn persist(&mut self, spec: &CipherSpec) -> Result<(), StoreFull> {
            if self.full {
                return Err(StoreFull);
            }
            self.persisted.push(spec.clone());
            Ok(())
        }
    }

    fn performer(chain: Vec<u8>) -> RecordPerformer<Chain, Bodies, Store> {
        let config = ConnectionConfig::default();
        RecordPerformer::new(&config, Chain(chain), Bodies::default(), Store::default())
    }

    #[test]
    fn server_hello_is_one_handshake_record() {
        let records = performer(Vec::new()).perform(Action::SendServerHello).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content_type, ContentType::Handshake);
        assert_eq!(records[0].version, ProtocolVersion::TLS_1_2);
        assert_eq!(records[0].fragment.as_ref(), b"\x02\x00\x00\x05hello");
    }

    #[test]
    fn hello_done_has_empty_body() {
        let records = performer(Vec::new()).perform(Action::SendServerHelloDone).unwrap();
        assert_eq!(records[0].fragment.as_ref(), &[14, 0, 0, 0]);
    }

    #[test]
    fn large_chain_is_fragmented() {
        let chain = vec![0xab; 20_000];
        let records = performer(chain).perform(Action::SendCertificate).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fragment.len(), 16_384);
        assert_eq!(records[1].fragment.len(), 20_004 - 16_384);

        let joined: Vec<u8> = records.iter().flat_map(|r| r.fragment.iter().copied()).collect();
        let message = HandshakeMessage::decode(&joined).unwrap();
        assert_eq!(message.msg_type, HandshakeType::Certificate);
        assert_eq!(message.body.len(), 20_000);
    }

    #[test]
    fn change_request_and_alert_records() {
        let mut performer = performer(Vec::new());

        let ccs = performer.perform(Action::EmitChangeRequest(CipherSpec::new("a"))).unwrap();
        assert_eq!(ccs[0].content_type, ContentType::ChangeCipherSpec);
        assert_eq!(ccs[0].fragment.as_ref(), &[1]);

        let alert =
            performer.perform(Action::SendAlert(AlertDescription::HandshakeFailure)).unwrap();
        assert_eq!(alert[0].content_type, ContentType::Alert);
        assert_eq!(
            Alert::decode(&alert[0].fragment).unwrap(),
            Alert::fatal(AlertDescription::HandshakeFailure)
        );

        let mut wire = bytes::BytesMut::new();
        let codec = RecordCodec::default();
        for record in ccs.iter().chain(&alert) {
            codec.encode(record, &mut wire).unwrap();
        }
        assert_eq!(&wire[..], &[20, 3, 3, 0, 1, 1, 21, 3, 3, 0, 2, 2, 40]);
    }

    #[test]
    fn alert_record_carries_the_description() {
        let records =
            performer(Vec::new()).perform(Action::SendAlert(AlertDescription::RecordOverflow)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fragment.as_ref(), &[2, 22]);
    }

    #[test]
    fn persist_goes_to_store_without_records() {
        let mut performer = performer(Vec::new());
        let records = performer.perform(Action::PersistSpec(CipherSpec::new("aes"))).unwrap();
        assert!(records.is_empty());
        assert_eq!(performer.store().persisted, vec![CipherSpec::new("aes")]);

        assert!(performer.perform(Action::EmitServerDone).unwrap().is_empty());
    }

    #[test]
    fn collaborator_failures_are_reported() {
        let mut performer = performer(Vec::new());
        performer.bodies.broken = true;
        performer.store.full = true;

        let err = performer.perform(Action::SendServerHello).unwrap_err();
        assert!(matches!(err, RecordPerformerError::Body(_)));

        let err = performer.perform(Action::PersistSpec(CipherSpec::new("a"))).unwrap_err();
        assert_eq!(err.to_string(), "cipher spec not persisted");
        assert_eq!(std::error::Error::source(&err).map(ToString::to_string), Some("store full".into()));
    }
}
