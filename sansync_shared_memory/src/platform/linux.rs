//! POSIX shared memory operations (`shm_open` + `mmap`)

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::getpid;
use std::fs::File;
use std::os::fd::AsRawFd;

/// Longest accepted name, leading `/` included (NAME_MAX).
const MAX_NAME_LEN: usize = 255;

/// Named backing object opened by this process
pub struct BackingObject {
    /// Open handle on the object
    pub file: File,
    /// True when this call created the name (as opposed to opening it)
    pub created: bool,
}

/// Normalize a segment name to the `/name` form `shm_open` expects
pub fn posix_name(name: &str) -> ShmResult<String> {
    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() || bare.contains('/') || bare.contains('\0') || bare.len() + 1 > MAX_NAME_LEN
    {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(format!("/{bare}"))
}

/// Create the named object, or open it if another process already did.
///
/// A newly created object gets `mode` applied verbatim (umask is bypassed)
/// and is sized to `size`. An existing object smaller than `size` is grown.
pub fn create_or_open_object(name: &str, size: usize, mode: Mode) -> ShmResult<BackingObject> {
    let flags = OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR;

    match shm_open(name, flags, mode) {
        Ok(fd) => {
            let file = File::from(fd);
            if let Err(e) = prepare_new_object(&file, size, mode) {
                // Never leave a half-initialized name behind
                let _ = shm_unlink(name);
                return Err(e);
            }
            Ok(BackingObject {
                file,
                created: true,
            })
        }
        Err(Errno::EEXIST) => {
            let file = open_object(name)?;
            let len = file.metadata()?.len() as usize;
            if len < size {
                tracing::warn!(
                    "Existing segment {} is {} bytes, growing to {}",
                    name,
                    len,
                    size
                );
                file.set_len(size as u64)?;
            }
            Ok(BackingObject {
                file,
                created: false,
            })
        }
        Err(e) => Err(map_errno(e, name)),
    }
}

fn prepare_new_object(file: &File, size: usize, mode: Mode) -> ShmResult<()> {
    set_mode(file, mode)?;
    file.set_len(size as u64)?;
    Ok(())
}

/// Open an existing object read/write without creating it
pub fn open_object(name: &str) -> ShmResult<File> {
    let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| map_errno(e, name))?;
    Ok(File::from(fd))
}

/// Remove the name; existing mappings stay valid until unmapped
pub fn unlink_object(name: &str) -> ShmResult<()> {
    shm_unlink(name).map_err(|e| map_errno(e, name))
}

/// Map `size` bytes of the object read/write
pub fn map_object(file: &File, size: usize) -> ShmResult<MmapMut> {
    let mmap = unsafe { MmapOptions::new().len(size).map_mut(file)? };
    Ok(mmap)
}

/// Apply permission bits regardless of the process umask
fn set_mode(file: &File, mode: Mode) -> ShmResult<()> {
    let result = unsafe { libc::fchmod(file.as_raw_fd(), mode.bits()) };
    if result == -1 {
        return Err(Errno::last().into());
    }
    Ok(())
}

fn map_errno(errno: Errno, name: &str) -> ShmError {
    match errno {
        Errno::ENOENT => ShmError::NotFound {
            name: name.to_string(),
        },
        Errno::EACCES | Errno::EPERM => ShmError::PermissionDenied {
            name: name.to_string(),
        },
        other => ShmError::Nix { source: other },
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}
