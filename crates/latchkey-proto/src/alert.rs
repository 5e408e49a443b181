//! Alert and ChangeCipherSpec payloads.
//!
//! Both are fixed-size: an alert is a level byte followed by a description
//! byte, and a ChangeCipherSpec message is the single byte `1`.

use crate::errors::{RecordError, Result};

/// Payload of a ChangeCipherSpec record.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertLevel {
    /// Warning, connection may continue
    Warning = 1,
    /// Fatal, connection terminates
    Fatal = 2,
}

/// Alert descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    /// Sender will send no more messages
    CloseNotify = 0,
    /// Inappropriate message received
    UnexpectedMessage = 10,
    /// Record MAC did not verify
    BadRecordMac = 20,
    /// Obsolete; never sent by compliant peers
    DecryptionFailed = 21,
    /// Record longer than its phase allows
    RecordOverflow = 22,
    /// Decompression produced invalid input
    DecompressionFailure = 30,
    /// No acceptable security parameters
    HandshakeFailure = 40,
    /// SSL 3.0 only
    NoCertificate = 41,
    /// Certificate corrupt or unverifiable
    BadCertificate = 42,
    /// Certificate of an unsupported type
    UnsupportedCertificate = 43,
    /// Certificate revoked by its signer
    CertificateRevoked = 44,
    /// Certificate expired or not yet valid
    CertificateExpired = 45,
    /// Certificate unacceptable for another reason
    CertificateUnknown = 46,
    /// Field out of range or inconsistent
    IllegalParameter = 47,
    /// Chain does not lead to a trusted CA
    UnknownCa = 48,
    /// Access control refused the handshake
    AccessDenied = 49,
    /// Message could not be decoded
    DecodeError = 50,
    /// Handshake cryptographic operation failed
    DecryptError = 51,
    /// Obsolete export negotiation
    ExportRestriction = 60,
    /// Version recognized but not supported
    ProtocolVersion = 70,
    /// Server requires stronger ciphers
    InsufficientSecurity = 71,
    /// Local failure unrelated to the peer
    InternalError = 80,
    /// Handshake canceled by the user
    UserCanceled = 90,
    /// Renegotiation refused
    NoRenegotiation = 100,
    /// Extension not offered was received
    UnsupportedExtension = 110,
}

impl TryFrom<u8> for AlertDescription {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            21 => Self::DecryptionFailed,
            22 => Self::RecordOverflow,
            30 => Self::DecompressionFailure,
            40 => Self::HandshakeFailure,
            41 => Self::NoCertificate,
            42 => Self::BadCertificate,
            43 => Self::UnsupportedCertificate,
            44 => Self::CertificateRevoked,
            45 => Self::CertificateExpired,
            46 => Self::CertificateUnknown,
            47 => Self::IllegalParameter,
            48 => Self::UnknownCa,
            49 => Self::AccessDenied,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            60 => Self::ExportRestriction,
            70 => Self::ProtocolVersion,
            71 => Self::InsufficientSecurity,
            80 => Self::InternalError,
            90 => Self::UserCanceled,
            100 => Self::NoRenegotiation,
            110 => Self::UnsupportedExtension,
            other => return Err(RecordError::UnknownAlertDescription(other)),
        })
    }
}

/// A two-byte alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alert {
    /// Severity
    pub level: AlertLevel,
    /// Reason
    pub description: AlertDescription,
}

impl Alert {
    /// Encoded size.
    pub const SIZE: usize = 2;

    /// A fatal alert with the given description.
    pub const fn fatal(description: AlertDescription) -> Self {
        Self { level: AlertLevel::Fatal, description }
    }

    /// Wire bytes.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        [self.level as u8, self.description as u8]
    }

    /// Decode the alert at the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let [level, description, ..] = *buf else {
            return Err(RecordError::TruncatedInput { needed: Self::SIZE, available: buf.len() });
        };
        let level = match level {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            other => return Err(RecordError::UnknownAlertLevel(other)),
        };
        Ok(Self { level, description: AlertDescription::try_from(description)? })
    }
}
