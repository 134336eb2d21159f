//! Shared memory contract.
//!
//! This module contains:
//! - `consts`: Segment name, region capacities and drain timing.

pub mod consts;
