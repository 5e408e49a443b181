//! Streaming record decoder.
//!
//! Transports hand over bytes in whatever chunks the socket produced.
//! [`RecordCodec`] accumulates them in a `BytesMut` and splits off one
//! complete record at a time without copying the fragment.

use bytes::{Buf, BytesMut};

use crate::{
    errors::Result,
    header::RecordHeader,
    record::{RecordPhase, TlsRecord},
};

/// Incremental record decoder/encoder bound to one processing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    phase: RecordPhase,
}

impl RecordCodec {
    /// Create a codec that applies the bound of `phase`.
    pub fn new(phase: RecordPhase) -> Self {
        Self { phase }
    }

    /// Phase whose bound this codec enforces.
    pub fn phase(&self) -> RecordPhase {
        self.phase
    }

    /// Split the next complete record off `src`.
    ///
    /// Returns `Ok(None)` while the header or fragment is still incomplete;
    /// nothing is consumed in that case. The content type and declared
    /// length are validated as soon as the header is buffered, so a peer
    /// cannot make us buffer an oversized fragment.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<TlsRecord>> {
        let Some(header) = RecordHeader::peek(src) else {
            return Ok(None);
        };
        let (content_type, version, length) = header.validate(self.phase)?;

        let total = RecordHeader::SIZE + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut record = src.split_to(total);
        record.advance(RecordHeader::SIZE);
        Ok(Some(TlsRecord { content_type, version, fragment: record.freeze() }))
    }

    /// Append the encoding of `record` to `dst`.
    pub fn encode(&self, record: &TlsRecord, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(record.encoded_len());
        record.encode(self.phase, dst)
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(RecordPhase::Plaintext)
    }
}
