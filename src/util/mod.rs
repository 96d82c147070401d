//! Util Module - Shared Utilities
//!
//! Small helpers used throughout the allocator: alignment arithmetic.

pub mod alignment;

pub use alignment::Alignment;
