//! Consumer-side handle on an existing segment.
//!
//! The consumer (the process that loaded the producer library, or any tool
//! that knows the segment name) opens the segment by name and publishes state
//! or inspects the command region. It does not share the producer's lock, so
//! every operation here is a single bounded copy.

use crate::channel::{CommandChannel, StateChannel, terminated_len};
use crate::error::ShmResult;
use crate::layout::HeaderDescriptor;
use crate::platform::get_current_pid;
use crate::segment::SharedSegment;
use sansync::shm::consts::SEGMENT_SIZE;

/// Attached view of a segment created elsewhere
pub struct SegmentClient {
    segment: SharedSegment,
}

impl SegmentClient {
    /// Attach to the segment called `name`.
    pub fn open(name: &str) -> ShmResult<Self> {
        let segment = SharedSegment::open(name, SEGMENT_SIZE)?;
        Ok(Self { segment })
    }

    /// Store a command, replacing any pending one.
    pub fn write_command(&mut self, command: &[u8]) -> ShmResult<()> {
        let mut layout = self.segment.layout_mut()?;
        CommandChannel::write(&mut layout, command)
    }

    /// True when a command is waiting for the drain loop.
    pub fn command_pending(&mut self) -> ShmResult<bool> {
        let layout = self.segment.layout_mut()?;
        Ok(CommandChannel::is_pending(&layout))
    }

    /// Replace the published state.
    pub fn publish_state(&mut self, state: &[u8]) -> ShmResult<()> {
        let mut layout = self.segment.layout_mut()?;
        StateChannel::publish(&mut layout, state)
    }

    /// Copy the state and a terminator into `out`, returning its length.
    pub fn read_state_into(&mut self, out: &mut [u8]) -> ShmResult<usize> {
        let layout = self.segment.layout_mut()?;
        StateChannel::read(&layout, out)
    }

    /// Current state, `None` when nothing has been published.
    pub fn read_state(&mut self) -> ShmResult<Option<Vec<u8>>> {
        let layout = self.segment.layout_mut()?;
        let len = terminated_len(layout.state());
        if len == 0 {
            return Ok(None);
        }
        Ok(Some(layout.state()[..len].to_vec()))
    }

    /// Write a descriptor of this layout into the header region.
    pub fn publish_header(&mut self) -> ShmResult<HeaderDescriptor> {
        let descriptor = HeaderDescriptor::current(get_current_pid());
        let encoded = descriptor.encode()?;
        let mut layout = self.segment.layout_mut()?;
        layout.header_mut().copy_from_slice(&encoded);
        tracing::debug!("Published header descriptor for {}", self.segment.name());
        Ok(descriptor)
    }

    /// Header descriptor, if a consumer has published one.
    pub fn read_header(&mut self) -> ShmResult<Option<HeaderDescriptor>> {
        let layout = self.segment.layout_mut()?;
        HeaderDescriptor::decode(layout.header())
    }

    /// POSIX object name.
    pub fn name(&self) -> &str {
        self.segment.name()
    }
}
