//! Record types and the record codec.
//!
//! A [`TlsRecord`] is the same shape in all three processing phases
//! (plaintext, compressed, ciphertext); only the fragment bound differs, so
//! the phase is passed alongside the record instead of being baked into
//! three near-identical types.

use std::fmt;

use bytes::{BufMut, Bytes};

use crate::{
    errors::{RecordError, Result},
    header::RecordHeader,
};

/// Largest plaintext fragment: 2^14 bytes.
pub const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Largest compressed or ciphertext fragment: 2^14 + 1024 bytes.
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 1024;

/// Payload class of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// Cipher spec change signal
    ChangeCipherSpec = 20,
    /// Alert message
    Alert = 21,
    /// Handshake messages
    Handshake = 22,
    /// Application data
    ApplicationData = 23,
}

impl ContentType {
    /// Wire value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            20 => Ok(Self::ChangeCipherSpec),
            21 => Ok(Self::Alert),
            22 => Ok(Self::Handshake),
            23 => Ok(Self::ApplicationData),
            other => Err(RecordError::UnknownContentType(other)),
        }
    }
}

/// Protocol version pair carried in every record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
}

impl ProtocolVersion {
    /// SSL 3.0
    pub const SSL_3_0: Self = Self::new(3, 0);
    /// TLS 1.0
    pub const TLS_1_0: Self = Self::new(3, 1);
    /// TLS 1.1
    pub const TLS_1_1: Self = Self::new(3, 2);
    /// TLS 1.2
    pub const TLS_1_2: Self = Self::new(3, 3);

    /// Create a version from its two bytes.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Processing phase of a record, selecting its fragment bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordPhase {
    /// `TLSPlaintext`: at most 2^14 bytes
    Plaintext,
    /// `TLSCompressed`: at most 2^14 + 1024 bytes
    Compressed,
    /// `TLSCiphertext`: at most 2^14 + 1024 bytes
    Ciphertext,
}

impl RecordPhase {
    /// Largest fragment allowed in this phase.
    pub const fn max_fragment_len(self) -> usize {
        match self {
            Self::Plaintext => MAX_PLAINTEXT_LEN,
            Self::Compressed | Self::Ciphertext => MAX_CIPHERTEXT_LEN,
        }
    }

    /// Fail with [`RecordError::LengthOutOfBounds`] if `length` is too large.
    pub fn check(self, length: usize) -> Result<()> {
        let max = self.max_fragment_len();
        if length > max {
            return Err(RecordError::LengthOutOfBounds { phase: self, length, max });
        }
        Ok(())
    }
}

impl fmt::Display for RecordPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plaintext => "plaintext",
            Self::Compressed => "compressed",
            Self::Ciphertext => "ciphertext",
        })
    }
}

/// A single record: header fields plus an opaque fragment.
///
/// There is no length field. The wire length is computed from `fragment`
/// when encoding, which rules out records whose length and payload disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsRecord {
    /// Payload class
    pub content_type: ContentType,
    /// Record version
    pub version: ProtocolVersion,
    /// Opaque fragment
    pub fragment: Bytes,
}

impl TlsRecord {
    /// Create a record.
    pub fn new(content_type: ContentType, version: ProtocolVersion, fragment: impl Into<Bytes>) -> Self {
        Self { content_type, version, fragment: fragment.into() }
    }

    /// Size of the encoded record (header plus fragment).
    pub fn encoded_len(&self) -> usize {
        RecordHeader::SIZE + self.fragment.len()
    }

    /// Decode the record at the front of `buf`.
    ///
    /// Bytes past the declared fragment are left for the caller; use
    /// [`TlsRecord::encoded_len`] to find where the next record starts.
    ///
    /// # Errors
    ///
    /// - `TruncatedInput` if the header or the declared fragment is incomplete
    /// - `UnknownContentType` if the type byte is not 20..=23
    /// - `LengthOutOfBounds` if the declared length exceeds the phase bound
    pub fn decode(buf: &[u8], phase: RecordPhase) -> Result<Self> {
        let header = RecordHeader::from_bytes(buf)?;
        let (content_type, version, length) = header.validate(phase)?;

        let needed = RecordHeader::SIZE + length;
        let Some(fragment) = buf.get(RecordHeader::SIZE..needed) else {
            return Err(RecordError::TruncatedInput { needed, available: buf.len() });
        };

        Ok(Self { content_type, version, fragment: Bytes::copy_from_slice(fragment) })
    }

    /// Encode the record into `dst`.
    ///
    /// Nothing is written when the fragment exceeds the phase bound.
    pub fn encode(&self, phase: RecordPhase, dst: &mut impl BufMut) -> Result<()> {
        let header = RecordHeader::new(self.content_type, self.version, self.fragment.len(), phase)?;
        dst.put_slice(&header.to_bytes());
        dst.put_slice(&self.fragment);
        Ok(())
    }

    /// Encode the record into a fresh buffer.
    pub fn to_vec(&self, phase: RecordPhase) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(phase, &mut out)?;
        Ok(out)
    }
}

/// Split `payload` into records that each respect the bound of `phase`.
///
/// Zero-length fragments are only legal for application data, so an empty
/// payload of any other content type produces no records at all.
pub fn fragment(
    content_type: ContentType,
    version: ProtocolVersion,
    mut payload: Bytes,
    phase: RecordPhase,
) -> Vec<TlsRecord> {
    if payload.is_empty() {
        return match content_type {
            ContentType::ApplicationData => vec![TlsRecord::new(content_type, version, payload)],
            _ => Vec::new(),
        };
    }

    let max = phase.max_fragment_len();
    let mut records = Vec::with_capacity(payload.len().div_ceil(max));
    while !payload.is_empty() {
        let take = payload.len().min(max);
        records.push(TlsRecord::new(content_type, version, payload.split_to(take)));
    }
    records
}
