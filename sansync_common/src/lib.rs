//! SanSync Common Library
//!
//! This crate provides the shared segment layout constants and configuration
//! loading utilities for all SanSync workspace crates.
//!
//! # Module Structure
//!
//! - [`shm`] - Segment name and layout constants (the cross-process contract)
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! sansync = { package = "sansync_common", path = "../sansync_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use sansync_common::shm::consts::*;
//! use sansync_common::config::{ConfigLoader, SanSyncConfig};
//! ```

pub mod config;
pub mod prelude;
pub mod shm;
