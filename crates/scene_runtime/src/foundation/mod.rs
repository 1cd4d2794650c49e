//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the runtime:
//! - Math types and projection construction
//! - Handle types backed by slot maps
//! - Memoized derived values
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod memo;
pub mod logging;
