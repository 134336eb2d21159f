//! Command and state channels over the segment layout.
//!
//! Both channels store NUL-terminated byte strings in fixed regions. Callers
//! are responsible for holding whatever lock serializes access to the layout;
//! the functions here only touch bytes.
//!
//! # Command delivery
//!
//! The command region holds at most one pending command. A write does not
//! check whether the previous command was drained: the last write wins and an
//! undrained command is silently replaced. There is no backpressure and no
//! acknowledgment. Changing this (e.g. to a queue) changes the cross-process
//! contract, so it is kept as-is.

use crate::error::{ShmError, ShmResult};
use crate::layout::SegmentLayout;
use sansync::shm::consts::{COMMAND_CAPACITY, STATE_CAPACITY, TERMINATOR};

/// Length of the NUL-terminated string at the start of `region`.
///
/// A region without a terminator is measured to its end.
pub fn terminated_len(region: &[u8]) -> usize {
    region
        .iter()
        .position(|&b| b == TERMINATOR)
        .unwrap_or(region.len())
}

/// Writer/drainer side of the command region
pub struct CommandChannel;

impl CommandChannel {
    /// Store `command` followed by a terminator, replacing any pending command.
    ///
    /// Fails without touching the region when `command` is empty or leaves no
    /// room for the terminator.
    pub fn write(layout: &mut SegmentLayout<'_>, command: &[u8]) -> ShmResult<()> {
        Self::validate(command)?;

        let region = layout.command_mut();
        region[..command.len()].copy_from_slice(command);
        region[command.len()] = TERMINATOR;
        Ok(())
    }

    /// Check a command against the region capacity.
    pub fn validate(command: &[u8]) -> ShmResult<()> {
        if command.is_empty() {
            return Err(ShmError::InvalidArgument {
                reason: "command is empty",
            });
        }
        if command.len() >= COMMAND_CAPACITY {
            return Err(ShmError::PayloadTooLarge {
                len: command.len(),
                capacity: COMMAND_CAPACITY,
            });
        }
        Ok(())
    }

    /// True when a command is waiting to be drained.
    pub fn is_pending(layout: &SegmentLayout<'_>) -> bool {
        layout.command()[0] != TERMINATOR
    }

    /// Copy out the pending command, if any, and zero the whole region.
    pub fn take(layout: &mut SegmentLayout<'_>) -> Option<Vec<u8>> {
        if !Self::is_pending(layout) {
            return None;
        }

        let region = layout.command_mut();
        let len = terminated_len(region);
        let command = region[..len].to_vec();
        region.fill(0);
        Some(command)
    }
}

/// Reader/publisher side of the state region
pub struct StateChannel;

impl StateChannel {
    /// Copy the current state and a terminator into `out`.
    ///
    /// Returns the state length without terminator; `0` means no state has
    /// been published. Fails without writing to `out` when it cannot hold the
    /// state plus terminator.
    pub fn read(layout: &SegmentLayout<'_>, out: &mut [u8]) -> ShmResult<usize> {
        let region = layout.state();
        let len = terminated_len(region);
        if len == 0 {
            return Ok(0);
        }

        if out.len() < len + 1 {
            return Err(ShmError::BufferTooSmall {
                required: len + 1,
                capacity: out.len(),
            });
        }

        out[..len].copy_from_slice(&region[..len]);
        out[len] = TERMINATOR;
        Ok(len)
    }

    /// Replace the state with `state`; an empty slice clears it.
    ///
    /// The rest of the region is zeroed so no stale suffix survives.
    pub fn publish(layout: &mut SegmentLayout<'_>, state: &[u8]) -> ShmResult<()> {
        if state.len() >= STATE_CAPACITY {
            return Err(ShmError::PayloadTooLarge {
                len: state.len(),
                capacity: STATE_CAPACITY,
            });
        }

        let region = layout.state_mut();
        region[..state.len()].copy_from_slice(state);
        region[state.len()..].fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sansync::shm::consts::SEGMENT_SIZE;

    fn blank() -> Vec<u8> {
        vec![0u8; SEGMENT_SIZE]
    }

    #[test]
    fn test_write_stores_terminated_command() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        CommandChannel::write(&mut layout, b"PING").unwrap();
        assert_eq!(&layout.command()[..5], b"PING\0");
        assert!(CommandChannel::is_pending(&layout));
    }

    #[test]
    fn test_write_boundaries() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();

        let max = vec![b'x'; COMMAND_CAPACITY - 1];
        assert!(CommandChannel::write(&mut layout, &max).is_ok());
        assert_eq!(layout.command()[COMMAND_CAPACITY - 1], 0);

        CommandChannel::take(&mut layout);
        let too_long = vec![b'x'; COMMAND_CAPACITY];
        assert!(matches!(
            CommandChannel::write(&mut layout, &too_long),
            Err(ShmError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            CommandChannel::write(&mut layout, b""),
            Err(ShmError::InvalidArgument { .. })
        ));
        assert!(layout.command().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_last_write_wins() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        CommandChannel::write(&mut layout, b"first-command").unwrap();
        CommandChannel::write(&mut layout, b"second").unwrap();

        // The tail of the longer command remains past the terminator, but is
        // not part of the pending command.
        assert_eq!(CommandChannel::take(&mut layout).unwrap(), b"second");
    }

    #[test]
    fn test_take_clears_region() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        assert_eq!(CommandChannel::take(&mut layout), None);

        CommandChannel::write(&mut layout, b"JOIN lobby").unwrap();
        assert_eq!(CommandChannel::take(&mut layout).unwrap(), b"JOIN lobby");
        assert!(layout.command().iter().all(|&b| b == 0));
        assert!(!CommandChannel::is_pending(&layout));
    }

    #[test]
    fn test_read_empty_state() {
        let mut bytes = blank();
        let layout = SegmentLayout::new(&mut bytes).unwrap();
        let mut out = [0xAAu8; 16];
        assert_eq!(StateChannel::read(&layout, &mut out).unwrap(), 0);
        assert!(out.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_read_state_round_trip() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        StateChannel::publish(&mut layout, b"{\"players\":2}").unwrap();

        let mut out = [0u8; 64];
        let n = StateChannel::read(&layout, &mut out).unwrap();
        assert_eq!(&out[..n], b"{\"players\":2}");
        assert_eq!(out[n], 0);
    }

    #[test]
    fn test_read_into_small_buffer_leaves_it_untouched() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        StateChannel::publish(&mut layout, b"12345").unwrap();

        // Exactly the length, no room for the terminator.
        let mut out = [0xAAu8; 5];
        assert!(matches!(
            StateChannel::read(&layout, &mut out),
            Err(ShmError::BufferTooSmall {
                required: 6,
                capacity: 5
            })
        ));
        assert_eq!(out, [0xAA; 5]);

        let mut exact = [0u8; 6];
        assert_eq!(StateChannel::read(&layout, &mut exact).unwrap(), 5);
    }

    #[test]
    fn test_publish_clears_stale_suffix() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        StateChannel::publish(&mut layout, b"long state value").unwrap();
        StateChannel::publish(&mut layout, b"short").unwrap();
        assert!(layout.state()[5..].iter().all(|&b| b == 0));

        StateChannel::publish(&mut layout, b"").unwrap();
        let mut out = [0u8; 8];
        assert_eq!(StateChannel::read(&layout, &mut out).unwrap(), 0);

        let too_long = vec![b's'; STATE_CAPACITY];
        assert!(StateChannel::publish(&mut layout, &too_long).is_err());
    }

    #[test]
    fn test_unterminated_state_measured_to_region_end() {
        let mut bytes = blank();
        let mut layout = SegmentLayout::new(&mut bytes).unwrap();
        layout.state_mut().fill(b'z');

        let mut out = vec![0u8; STATE_CAPACITY];
        assert!(StateChannel::read(&layout, &mut out).is_err());

        let mut out = vec![0u8; STATE_CAPACITY + 1];
        assert_eq!(StateChannel::read(&layout, &mut out).unwrap(), STATE_CAPACITY);
    }
}
