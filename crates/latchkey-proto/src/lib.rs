//! Record layer wire format for Latchkey.
//!
//! Every byte exchanged during a TLS 1.x handshake travels inside a record: a
//! fixed 5-byte header (content type, protocol version, big-endian length)
//! followed by an opaque fragment. This crate owns that envelope and nothing
//! above it. Handshake message bodies are opaque here; the state machines in
//! `latchkey-core` decide what to send and when.
//!
//! # Size limits
//!
//! Fragment bounds are protocol limits, not advisory validation. A plaintext
//! fragment may carry at most 2^14 bytes; compressed and ciphertext fragments
//! may carry 2^14 + 1024. Both [`TlsRecord::encode`] and every decoder reject
//! anything larger, and the length field is always derived from the fragment
//! so a record can never carry a length that disagrees with its payload.
//!
//! # Security
//!
//! Header parsing goes through `zerocopy` with a compile-time verified layout.
//! The streaming [`RecordCodec`] validates the content type and declared
//! length as soon as the header is buffered, so an oversized length is
//! rejected before any fragment bytes are accumulated.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod codec;
pub mod errors;
pub mod handshake;
pub mod header;
pub mod record;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use codec::RecordCodec;
pub use errors::{RecordError, Result};
pub use handshake::{HandshakeHeader, HandshakeMessage, HandshakeType};
pub use header::RecordHeader;
pub use record::{ContentType, ProtocolVersion, RecordPhase, TlsRecord};
