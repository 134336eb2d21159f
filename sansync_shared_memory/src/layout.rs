//! Structured view over the mapped segment bytes

use crate::error::{ShmError, ShmResult};
use sansync::shm::consts::{
    COMMAND_CAPACITY, COMMAND_OFFSET, HEADER_SIZE, HEADER_TERMINATOR, LAYOUT_VERSION,
    SEGMENT_SIZE, STATE_CAPACITY, STATE_OFFSET,
};
use serde::{Deserialize, Serialize};
use std::ops::Range;

const HEADER_RANGE: Range<usize> = 0..HEADER_SIZE;
const COMMAND_RANGE: Range<usize> = COMMAND_OFFSET..COMMAND_OFFSET + COMMAND_CAPACITY;
const STATE_RANGE: Range<usize> = STATE_OFFSET..STATE_OFFSET + STATE_CAPACITY;

/// Header / command / state partition of a mapped segment.
///
/// Built once over a byte span whose length is checked up front, so the
/// region accessors never need per-call bounds arithmetic.
pub struct SegmentLayout<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SegmentLayout<'a> {
    /// Wrap `bytes`, which must cover at least the full segment size.
    pub fn new(bytes: &'a mut [u8]) -> ShmResult<Self> {
        if bytes.len() < SEGMENT_SIZE {
            return Err(ShmError::InvalidSize {
                size: bytes.len(),
                required: SEGMENT_SIZE,
            });
        }
        Ok(Self {
            bytes: &mut bytes[..SEGMENT_SIZE],
        })
    }

    /// Header region (reserved).
    pub fn header(&self) -> &[u8] {
        &self.bytes[HEADER_RANGE]
    }

    /// Mutable header region.
    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[HEADER_RANGE]
    }

    /// Command region.
    pub fn command(&self) -> &[u8] {
        &self.bytes[COMMAND_RANGE]
    }

    /// Mutable command region.
    pub fn command_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[COMMAND_RANGE]
    }

    /// State region.
    pub fn state(&self) -> &[u8] {
        &self.bytes[STATE_RANGE]
    }

    /// Mutable state region.
    pub fn state_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[STATE_RANGE]
    }

    /// Whole segment.
    pub fn as_bytes(&self) -> &[u8] {
        &*self.bytes
    }
}

/// Informational descriptor a consumer may publish into the header region.
///
/// Encoded as ASCII JSON followed by `|` and NUL padding. The producer never
/// reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDescriptor {
    /// Layout version
    pub version: u32,
    /// Offset of the command region
    pub command_offset: usize,
    /// Offset of the state region
    pub state_offset: usize,
    /// Set once the publisher has attached
    pub initialized: bool,
    /// Publisher process ID
    pub pid: u32,
}

impl HeaderDescriptor {
    /// Descriptor for the compiled-in layout.
    pub fn current(pid: u32) -> Self {
        Self {
            version: LAYOUT_VERSION,
            command_offset: COMMAND_OFFSET,
            state_offset: STATE_OFFSET,
            initialized: true,
            pid,
        }
    }

    /// Encode into a header-sized, NUL-padded buffer.
    pub fn encode(&self) -> ShmResult<[u8; HEADER_SIZE]> {
        let json = serde_json::to_vec(self)?;
        if json.len() + 1 > HEADER_SIZE {
            return Err(ShmError::PayloadTooLarge {
                len: json.len() + 1,
                capacity: HEADER_SIZE,
            });
        }

        let mut header = [0u8; HEADER_SIZE];
        header[..json.len()].copy_from_slice(&json);
        header[json.len()] = HEADER_TERMINATOR;
        Ok(header)
    }

    /// Decode a header region. `Ok(None)` when nothing has been published.
    pub fn decode(header: &[u8]) -> ShmResult<Option<Self>> {
        let Some(end) = header.iter().position(|&b| b == HEADER_TERMINATOR) else {
            return Ok(None);
        };
        if end == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&header[..end])?))
    }

    /// True when the descriptor matches the compiled-in layout.
    pub fn matches_layout(&self) -> bool {
        self.version == LAYOUT_VERSION
            && self.command_offset == COMMAND_OFFSET
            && self.state_offset == STATE_OFFSET
    }
}
