//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use sansync_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use sansync_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    AccessPolicy, ConfigError, ConfigLoader, SanSyncConfig, SegmentConfig, SharedConfig,
};

// ─── Segment Layout ─────────────────────────────────────────────────
pub use crate::shm::consts::{
    COMMAND_CAPACITY, COMMAND_OFFSET, DEFAULT_DRAIN_INTERVAL, DEFAULT_SEGMENT_NAME, HEADER_SIZE,
    SEGMENT_SIZE, STATE_CAPACITY, STATE_OFFSET,
};
