//! SHM (Shared Memory) constants.
//!
//! These constants define the byte layout every process rendezvousing on the
//! segment must agree on. They are the single source of truth - all other
//! crates should import from here. Changing any capacity breaks compatibility
//! with processes built against the previous values.
//!
//! ```text
//! offset 0              : header   HEADER_SIZE bytes (reserved)
//! offset HEADER_SIZE    : command  COMMAND_CAPACITY bytes (<= C-1 bytes + NUL)
//! offset STATE_OFFSET   : state    STATE_CAPACITY bytes   (<= S-1 bytes + NUL)
//! ```

use static_assertions::const_assert;
use std::time::Duration;

/// Well-known segment name shared by producer and consumers.
///
/// The POSIX object name is this value with a leading `/`.
pub const DEFAULT_SEGMENT_NAME: &str = "GTAVCoopSharedMem";

/// Size of the header region in bytes.
///
/// Reserved for metadata; the producer never writes it.
pub const HEADER_SIZE: usize = 128;

/// Capacity of the command region in bytes, terminator included.
pub const COMMAND_CAPACITY: usize = 4096;

/// Capacity of the state region in bytes, terminator included.
pub const STATE_CAPACITY: usize = 8192;

/// Offset of the command region from the segment base.
pub const COMMAND_OFFSET: usize = HEADER_SIZE;

/// Offset of the state region from the segment base.
pub const STATE_OFFSET: usize = HEADER_SIZE + COMMAND_CAPACITY;

/// Total segment size in bytes.
pub const SEGMENT_SIZE: usize = HEADER_SIZE + COMMAND_CAPACITY + STATE_CAPACITY;

/// Byte terminating the command and state strings.
pub const TERMINATOR: u8 = 0;

/// Byte terminating the JSON header descriptor (followed by NUL padding).
pub const HEADER_TERMINATOR: u8 = b'|';

/// Layout version written into the header descriptor.
pub const LAYOUT_VERSION: u32 = 1;

/// Default drain loop polling interval in milliseconds.
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 50;

/// Default drain loop polling interval.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(DEFAULT_DRAIN_INTERVAL_MS);

const_assert!(COMMAND_CAPACITY > 1);
const_assert!(STATE_CAPACITY > 1);
const_assert!(STATE_OFFSET + STATE_CAPACITY == SEGMENT_SIZE);
