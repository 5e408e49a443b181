//! Record layer error types.

use thiserror::Error;

use crate::{alert::AlertDescription, record::RecordPhase};

/// Result alias for record layer operations.
pub type Result<T> = std::result::Result<T, RecordError>;

/// Errors raised while decoding or encoding records and their payloads.
///
/// Decode failures are always fatal to the record being read; there is no
/// partial-record recovery. Callers typically turn them into an alert via
/// [`RecordError::alert_description`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Fewer bytes were available than the header and declared length demand.
    #[error("truncated input: need {needed} bytes, have {available}")]
    TruncatedInput {
        /// Bytes required to finish the structure
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// The content type byte is not one of the four defined values.
    #[error("unknown content type {0}")]
    UnknownContentType(u8),

    /// A fragment (declared or actual) exceeds the bound of its phase.
    #[error("{phase} fragment of {length} bytes exceeds the {max} byte limit")]
    LengthOutOfBounds {
        /// Phase whose bound was applied
        phase: RecordPhase,
        /// Offending length
        length: usize,
        /// Maximum allowed for the phase
        max: usize,
    },

    /// Handshake message type byte is not a known handshake type.
    #[error("unknown handshake type {0}")]
    UnknownHandshakeType(u8),

    /// Handshake body does not fit the 24-bit length field.
    #[error("handshake body of {0} bytes exceeds the 24-bit length field")]
    HandshakeBodyTooLong(usize),

    /// Alert level byte is neither warning nor fatal.
    #[error("unknown alert level {0}")]
    UnknownAlertLevel(u8),

    /// Alert description byte is not a known description.
    #[error("unknown alert description {0}")]
    UnknownAlertDescription(u8),
}

impl RecordError {
    /// Alert a peer should receive when this error terminates a connection.
    pub fn alert_description(&self) -> AlertDescription {
        match self {
            Self::TruncatedInput { .. } | Self::HandshakeBodyTooLong(_) => {
                AlertDescription::DecodeError
            },
            Self::UnknownContentType(_) | Self::UnknownHandshakeType(_) => {
                AlertDescription::UnexpectedMessage
            },
            Self::LengthOutOfBounds { .. } => AlertDescription::RecordOverflow,
            Self::UnknownAlertLevel(_) | Self::UnknownAlertDescription(_) => {
                AlertDescription::IllegalParameter
            },
        }
    }

    /// True when more input could turn this failure into a success.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::TruncatedInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_record_maps_to_record_overflow() {
        let err = RecordError::LengthOutOfBounds {
            phase: RecordPhase::Plaintext,
            length: 16385,
            max: 16384,
        };
        assert_eq!(err.alert_description(), AlertDescription::RecordOverflow);
        assert_eq!(err.to_string(), "plaintext fragment of 16385 bytes exceeds the 16384 byte limit");
        assert!(!err.is_truncated());
    }

    #[test]
    fn unknown_content_type_is_unexpected_message() {
        assert_eq!(
            RecordError::UnknownContentType(0).alert_description(),
            AlertDescription::UnexpectedMessage
        );
    }
}
