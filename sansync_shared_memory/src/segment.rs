//! Named shared memory segment ownership

use crate::access::SecurityDescriptor;
use crate::error::{ShmError, ShmResult};
use crate::layout::SegmentLayout;
use crate::platform::{
    create_or_open_object, map_object, open_object, posix_name, unlink_object,
};
use memmap2::MmapMut;
use std::fs::File;

/// Live mapping plus the handle keeping the backing object open
struct Mapping {
    mmap: MmapMut,
    _object: File,
}

/// A named, fixed-size shared memory segment mapped into this process.
///
/// The mapping is valid from a successful [`create`](Self::create) or
/// [`open`](Self::open) until [`close`](Self::close) (or drop). A segment
/// obtained through `create` is owned by this process: closing it also
/// removes the name so the next creator starts from a zeroed object.
pub struct SharedSegment {
    /// POSIX object name (leading `/`)
    name: String,
    /// Mapped size in bytes
    size: usize,
    /// True when `create` made a new object rather than opening one
    created: bool,
    /// Remove the name on close
    owner: bool,
    mapping: Option<Mapping>,
}

impl SharedSegment {
    /// Create or open `name`, map `size` bytes, zero-fill a new object.
    pub fn create(name: &str, size: usize, descriptor: &SecurityDescriptor) -> ShmResult<Self> {
        let name = posix_name(name)?;
        validate_size(size)?;

        let object = create_or_open_object(&name, size, descriptor.mode())?;
        let mut mmap = match map_object(&object.file, size) {
            Ok(mmap) => mmap,
            Err(e) => {
                tracing::error!(
                    "Failed to map segment {}: {} (os error {:?})",
                    name,
                    e,
                    e.os_code()
                );
                drop(object.file);
                if object.created {
                    let _ = unlink_object(&name);
                }
                return Err(e);
            }
        };

        if object.created {
            mmap.fill(0);
            tracing::info!(
                "Created segment {} ({} bytes, mode {:o})",
                name,
                size,
                descriptor.mode().bits()
            );
        } else {
            tracing::info!("Opened existing segment {} ({} bytes)", name, size);
        }

        Ok(Self {
            name,
            size,
            created: object.created,
            owner: true,
            mapping: Some(Mapping {
                mmap,
                _object: object.file,
            }),
        })
    }

    /// Attach to an existing segment without creating it.
    pub fn open(name: &str, size: usize) -> ShmResult<Self> {
        let name = posix_name(name)?;
        validate_size(size)?;

        let file = open_object(&name)?;
        let len = file.metadata()?.len() as usize;
        if len < size {
            return Err(ShmError::InvalidSize {
                size: len,
                required: size,
            });
        }

        let mmap = map_object(&file, size)?;
        tracing::debug!("Attached to segment {} ({} bytes)", name, size);

        Ok(Self {
            name,
            size,
            created: false,
            owner: false,
            mapping: Some(Mapping {
                mmap,
                _object: file,
            }),
        })
    }

    /// Unmap and release the object. Calling it again is a no-op.
    pub fn close(&mut self) {
        let Some(mapping) = self.mapping.take() else {
            return;
        };
        drop(mapping);

        if self.owner {
            if let Err(e) = unlink_object(&self.name) {
                tracing::warn!(
                    "Failed to unlink segment {}: {} (os error {:?})",
                    self.name,
                    e,
                    e.os_code()
                );
            }
        }
        tracing::debug!("Closed segment {}", self.name);
    }

    /// True between a successful create/open and close.
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Mapped bytes, `None` once closed.
    pub fn base(&self) -> Option<&[u8]> {
        self.mapping.as_ref().map(|m| &m.mmap[..])
    }

    /// Mutable mapped bytes, `None` once closed.
    pub fn base_mut(&mut self) -> Option<&mut [u8]> {
        self.mapping.as_mut().map(|m| &mut m.mmap[..])
    }

    /// Structured view over the mapping.
    pub fn layout_mut(&mut self) -> ShmResult<SegmentLayout<'_>> {
        let bytes = self.base_mut().ok_or(ShmError::NotReady)?;
        SegmentLayout::new(bytes)
    }

    /// POSIX object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when this segment created the backing object.
    pub fn was_created(&self) -> bool {
        self.created
    }
}

impl Drop for SharedSegment {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_size(size: usize) -> ShmResult<()> {
    if size == 0 {
        return Err(ShmError::InvalidSize { size, required: 1 });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessPolicyFactory;
    use sansync::shm::consts::{COMMAND_OFFSET, SEGMENT_SIZE};
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_name(tag: &str) -> String {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("sansync_segment_{}_{}_{}", tag, std::process::id(), id)
    }

    #[test]
    fn test_create_zero_fills_new_segment() {
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let segment = SharedSegment::create(&unique_name("zero"), SEGMENT_SIZE, &descriptor).unwrap();
        assert!(segment.was_created());
        assert!(segment.is_mapped());
        assert_eq!(segment.base().unwrap().len(), SEGMENT_SIZE);
        assert!(segment.base().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_open_sees_creator_writes() {
        let name = unique_name("shared");
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let mut creator = SharedSegment::create(&name, SEGMENT_SIZE, &descriptor).unwrap();
        creator.base_mut().unwrap()[COMMAND_OFFSET] = b'X';

        let opener = SharedSegment::open(&name, SEGMENT_SIZE).unwrap();
        assert!(!opener.was_created());
        assert_eq!(opener.base().unwrap()[COMMAND_OFFSET], b'X');
    }

    #[test]
    fn test_second_create_opens_without_zeroing() {
        let name = unique_name("reopen");
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let mut first = SharedSegment::create(&name, SEGMENT_SIZE, &descriptor).unwrap();
        first.base_mut().unwrap()[0] = 7;

        let second = SharedSegment::create(&name, SEGMENT_SIZE, &descriptor).unwrap();
        assert!(!second.was_created());
        assert_eq!(second.base().unwrap()[0], 7);
    }

    #[test]
    fn test_close_is_idempotent_and_unlinks() {
        let name = unique_name("close");
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let mut segment = SharedSegment::create(&name, SEGMENT_SIZE, &descriptor).unwrap();

        segment.close();
        assert!(!segment.is_mapped());
        assert!(segment.base().is_none());
        assert!(matches!(segment.layout_mut(), Err(ShmError::NotReady)));
        segment.close();

        assert!(matches!(
            SharedSegment::open(&name, SEGMENT_SIZE),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn test_opener_close_keeps_name() {
        let name = unique_name("opener");
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let _creator = SharedSegment::create(&name, SEGMENT_SIZE, &descriptor).unwrap();

        let mut opener = SharedSegment::open(&name, SEGMENT_SIZE).unwrap();
        opener.close();
        assert!(SharedSegment::open(&name, SEGMENT_SIZE).is_ok());
    }

    #[test]
    fn test_open_rejects_undersized_object() {
        let name = unique_name("small");
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        let _creator = SharedSegment::create(&name, 64, &descriptor).unwrap();
        assert!(matches!(
            SharedSegment::open(&name, SEGMENT_SIZE),
            Err(ShmError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_invalid_name_and_size() {
        let descriptor = AccessPolicyFactory::everyone().unwrap();
        assert!(matches!(
            SharedSegment::create("bad/name", SEGMENT_SIZE, &descriptor),
            Err(ShmError::InvalidName { .. })
        ));
        assert!(matches!(
            SharedSegment::create(&unique_name("zero_size"), 0, &descriptor),
            Err(ShmError::InvalidSize { .. })
        ));
    }
}
