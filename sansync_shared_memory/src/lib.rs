//! # SanSync Shared Memory
//!
//! A named, fixed-layout shared memory segment connecting an in-process
//! producer with an out-of-process consumer. The producer creates the segment,
//! drains commands written into it, and serves read-only state snapshots.
//!
//! ## Segment layout
//!
//! ```text
//! offset 0     header   128 bytes   reserved / informational descriptor
//! offset 128   command  4096 bytes  one NUL-terminated pending command
//! offset 4224  state    8192 bytes  one NUL-terminated state snapshot
//! ```
//!
//! ## Producer
//!
//! ```rust,no_run
//! use sansync_shared_memory::{Lifecycle, ShmResult};
//! use sansync::config::SegmentConfig;
//! use std::sync::Arc;
//!
//! # fn main() -> ShmResult<()> {
//! let lifecycle = Lifecycle::with_observer(
//!     SegmentConfig::default(),
//!     Arc::new(|command: &[u8]| println!("{}", String::from_utf8_lossy(command))),
//! );
//! lifecycle.initialize()?;
//! lifecycle.write_command(b"PING")?;
//!
//! let mut state = [0u8; 256];
//! let len = lifecycle.read_state(&mut state)?;
//! println!("state: {:?}", &state[..len]);
//! lifecycle.cleanup();
//! # Ok(())
//! # }
//! ```
//!
//! ## Consumer
//!
//! ```rust,no_run
//! use sansync_shared_memory::{SegmentClient, ShmResult};
//!
//! # fn main() -> ShmResult<()> {
//! let mut client = SegmentClient::open("GTAVCoopSharedMem")?;
//! client.publish_state(b"{\"players\":4}")?;
//! client.write_command(b"JOIN")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Embedding
//!
//! Built as a `cdylib`, the crate exports the C functions in [`ffi`] over one
//! process-wide lifecycle configured from the environment.
//!
//! ## Thread Safety
//!
//! - **Lifecycle**: thread-safe; one lock serializes segment access and the drain loop
//! - **SegmentClient**: single owner; does not share the producer's lock
//! - **SharedSegment**: single owner

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod channel;
pub mod client;
pub mod drain;
pub mod error;
pub mod ffi;
pub mod layout;
pub mod lifecycle;
pub mod platform;
pub mod segment;

pub use access::{AccessPolicyFactory, AccessRights, Principal, SecurityDescriptor};
pub use channel::{CommandChannel, StateChannel};
pub use client::SegmentClient;
pub use drain::{CommandObserver, DiscardObserver, DrainStats};
pub use error::{ShmError, ShmResult};
pub use layout::{HeaderDescriptor, SegmentLayout};
pub use lifecycle::{Lifecycle, LifecyclePhase};
pub use segment::SharedSegment;

/// Initialize tracing for embedders that have no subscriber of their own
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
