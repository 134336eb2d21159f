//! C ABI over one process-wide [`Lifecycle`].
//!
//! The instance is built on first use from [`SanSyncConfig::from_env`]; an
//! unusable configuration falls back to the defaults with a warning. Building
//! it also installs [`init_tracing`]'s subscriber unless the host process
//! already set one. Every
//! entry point reports failure as `false` and logs the cause, including the
//! OS error code when there is one. Panics never cross the boundary.

use crate::error::ShmError;
use crate::init_tracing;
use crate::lifecycle::Lifecycle;
use sansync::config::SanSyncConfig;
use sansync::shm::consts::COMMAND_CAPACITY;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::LazyLock;

static LIFECYCLE: LazyLock<Lifecycle> = LazyLock::new(|| {
    init_tracing();
    let config = match SanSyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Falling back to default configuration: {}", e);
            SanSyncConfig::default()
        }
    };
    Lifecycle::new(config.segment)
});

/// Run `f`, mapping errors and panics to `false`.
fn guarded(operation: &str, f: impl FnOnce() -> Result<(), ShmError>) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!("{} failed: {} (os error {:?})", operation, e, e.os_code());
            false
        }
        Err(_) => {
            tracing::error!("{} panicked", operation);
            false
        }
    }
}

/// Install the stderr subscriber filtered by `RUST_LOG`.
///
/// No-op when a global subscriber is already set.
#[unsafe(no_mangle)]
pub extern "C" fn sansync_init_tracing() {
    let _ = catch_unwind(init_tracing);
}

/// Create the segment and start the drain loop. Idempotent.
#[unsafe(no_mangle)]
pub extern "C" fn sansync_initialize() -> bool {
    guarded("sansync_initialize", || LIFECYCLE.initialize())
}

/// Stop the drain loop and release the segment. Safe to call repeatedly.
#[unsafe(no_mangle)]
pub extern "C" fn sansync_cleanup() {
    let _ = guarded("sansync_cleanup", || {
        LIFECYCLE.cleanup();
        Ok(())
    });
}

/// True while the segment is mapped and drained.
#[unsafe(no_mangle)]
pub extern "C" fn sansync_is_ready() -> bool {
    catch_unwind(|| LIFECYCLE.is_ready()).unwrap_or(false)
}

/// Store `length` bytes at `command` as the pending command.
///
/// # Safety
///
/// `command` must be null or point to `length` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sansync_write_command(command: *const u8, length: usize) -> bool {
    if command.is_null() {
        tracing::error!("sansync_write_command: null command pointer");
        return false;
    }
    if length == 0 || length >= COMMAND_CAPACITY {
        tracing::error!(
            "sansync_write_command: length {} outside 1..{}",
            length,
            COMMAND_CAPACITY
        );
        return false;
    }
    // SAFETY: non-null, and the caller guarantees `length` readable bytes
    let bytes = unsafe { std::slice::from_raw_parts(command, length) };
    guarded("sansync_write_command", || LIFECYCLE.write_command(bytes))
}

/// Copy the state snapshot plus terminator into `buffer`.
///
/// On success `*bytes_read` receives the state length (0 when no state has
/// been published). On failure neither `buffer` nor `*bytes_read` is written.
///
/// # Safety
///
/// `buffer` must be null or point to `capacity` writable bytes, and
/// `bytes_read` must be null or point to a writable `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sansync_read_state(
    buffer: *mut u8,
    capacity: usize,
    bytes_read: *mut usize,
) -> bool {
    if buffer.is_null() || bytes_read.is_null() {
        tracing::error!("sansync_read_state: null buffer or length pointer");
        return false;
    }
    // SAFETY: non-null, and the caller guarantees `capacity` writable bytes
    let out = unsafe { std::slice::from_raw_parts_mut(buffer, capacity) };
    guarded("sansync_read_state", || {
        let len = LIFECYCLE.read_state(out)?;
        // SAFETY: checked non-null above
        unsafe { *bytes_read = len };
        Ok(())
    })
}
