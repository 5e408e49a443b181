//! Fixed 5-byte record header.
//!
//! ```text
//! offset 0     content_type   u8   (20..=23)
//! offset 1     version.major  u8
//! offset 2     version.minor  u8
//! offset 3..4  length         u16  big-endian
//! ```

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16},
};

use crate::{
    errors::{RecordError, Result},
    record::{ContentType, ProtocolVersion, RecordPhase},
};

/// Wire layout of a record header.
///
/// Fields are kept raw so any 5 bytes can be viewed as a header; semantic
/// checks happen in [`RecordHeader::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RecordHeader {
    content_type: u8,
    major: u8,
    minor: u8,
    length: U16<BigEndian>,
}

impl RecordHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 5;

    /// Build a header for a fragment of `length` bytes.
    ///
    /// `length` is checked against the phase bound so a header produced here
    /// always describes an encodable record.
    pub fn new(
        content_type: ContentType,
        version: ProtocolVersion,
        length: usize,
        phase: RecordPhase,
    ) -> Result<Self> {
        phase.check(length)?;
        let length = u16::try_from(length).map_err(|_| RecordError::LengthOutOfBounds {
            phase,
            length,
            max: phase.max_fragment_len(),
        })?;

        Ok(Self {
            content_type: content_type.to_u8(),
            major: version.major,
            minor: version.minor,
            length: U16::new(length),
        })
    }

    /// View the first [`Self::SIZE`] bytes of `buf` as a header.
    ///
    /// Returns `None` when fewer than five bytes are available.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        Self::read_from_prefix(buf).ok().map(|(header, _)| header)
    }

    /// Parse a header from the front of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::peek(buf)
            .ok_or(RecordError::TruncatedInput { needed: Self::SIZE, available: buf.len() })
    }

    /// Declared fragment length.
    pub fn length(&self) -> usize {
        usize::from(self.length.get())
    }

    /// Protocol version carried by the header.
    pub fn version(&self) -> ProtocolVersion {
        ProtocolVersion::new(self.major, self.minor)
    }

    /// Check the content type and declared length for `phase`.
    pub fn validate(&self, phase: RecordPhase) -> Result<(ContentType, ProtocolVersion, usize)> {
        let content_type = ContentType::try_from(self.content_type)?;
        let length = self.length();
        phase.check(length)?;
        Ok((content_type, self.version(), length))
    }

    /// Header bytes in wire order.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }
}
