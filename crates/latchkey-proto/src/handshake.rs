//! Handshake message envelope.
//!
//! Handshake records carry a stream of messages, each prefixed by a 1-byte
//! type and a 24-bit big-endian body length. Bodies are opaque at this layer.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::errors::{RecordError, Result};

/// Largest body the 24-bit length field can describe.
pub const MAX_BODY_LEN: usize = (1 << 24) - 1;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    /// HelloRequest
    HelloRequest = 0,
    /// ClientHello
    ClientHello = 1,
    /// ServerHello
    ServerHello = 2,
    /// Certificate
    Certificate = 11,
    /// ServerKeyExchange
    ServerKeyExchange = 12,
    /// CertificateRequest
    CertificateRequest = 13,
    /// ServerHelloDone
    ServerHelloDone = 14,
    /// CertificateVerify
    CertificateVerify = 15,
    /// ClientKeyExchange
    ClientKeyExchange = 16,
    /// Finished
    Finished = 20,
}

impl TryFrom<u8> for HandshakeType {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::HelloRequest,
            1 => Self::ClientHello,
            2 => Self::ServerHello,
            11 => Self::Certificate,
            12 => Self::ServerKeyExchange,
            13 => Self::CertificateRequest,
            14 => Self::ServerHelloDone,
            15 => Self::CertificateVerify,
            16 => Self::ClientKeyExchange,
            20 => Self::Finished,
            other => return Err(RecordError::UnknownHandshakeType(other)),
        })
    }
}

/// Wire layout of the 4-byte handshake message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HandshakeHeader {
    msg_type: u8,
    length: [u8; 3],
}

impl HandshakeHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 4;

    /// Header for a body of `length` bytes.
    pub fn new(msg_type: HandshakeType, length: usize) -> Result<Self> {
        if length > MAX_BODY_LEN {
            return Err(RecordError::HandshakeBodyTooLong(length));
        }
        let [_, hi, mid, lo] = u32::try_from(length)
            .map_err(|_| RecordError::HandshakeBodyTooLong(length))?
            .to_be_bytes();
        Ok(Self { msg_type: msg_type as u8, length: [hi, mid, lo] })
    }

    /// Message type.
    pub fn msg_type(&self) -> Result<HandshakeType> {
        HandshakeType::try_from(self.msg_type)
    }

    /// Declared body length.
    pub fn length(&self) -> usize {
        let [hi, mid, lo] = self.length;
        (usize::from(hi) << 16) | (usize::from(mid) << 8) | usize::from(lo)
    }
}

/// A handshake message with an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    /// Message type
    pub msg_type: HandshakeType,
    /// Opaque body
    pub body: Bytes,
}

impl HandshakeMessage {
    /// Create a message.
    pub fn new(msg_type: HandshakeType, body: impl Into<Bytes>) -> Self {
        Self { msg_type, body: body.into() }
    }

    /// Envelope plus body, ready to be split into handshake records.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let header = HandshakeHeader::new(self.msg_type, self.body.len())?;
        let mut out = BytesMut::with_capacity(HandshakeHeader::SIZE + self.body.len());
        out.put_slice(header.as_bytes());
        out.put_slice(&self.body);
        Ok(out.freeze())
    }

    /// Decode the message at the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (header, rest) = HandshakeHeader::read_from_prefix(buf).map_err(|_| {
            RecordError::TruncatedInput { needed: HandshakeHeader::SIZE, available: buf.len() }
        })?;
        let msg_type = header.msg_type()?;
        let length = header.length();
        let body = rest.get(..length).ok_or(RecordError::TruncatedInput {
            needed: HandshakeHeader::SIZE + length,
            available: buf.len(),
        })?;

        Ok(Self { msg_type, body: Bytes::copy_from_slice(body) })
    }
}
