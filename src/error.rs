//! Error Module - Allocator Error Types
//!
//! Defines the error type returned internally by the region/block layers,
//! plus the thread-local "last error" channel the public API uses to
//! report failures without giving up the `*mut u8`-returning malloc shape.

use std::cell::Cell;
use std::sync::PoisonError;
use thiserror::Error;

/// Main error type for all internal allocator operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// A region could not be obtained: the OS mapping failed, or the
    /// configured `RLIMIT_AS` soft limit would be exceeded.
    #[error("out of memory")]
    OutOfMemory,

    /// The pointer handed to `resize`/`release` is not a live allocation
    /// made by this allocator.
    #[error("invalid pointer")]
    InvalidPointer,

    /// The pointer handed to `release` points at a block already FREE.
    #[error("double free")]
    DoubleFree,

    /// A traversal detected a cycle or an out-of-bounds block while
    /// walking a region or free list.
    #[error("heap corruption detected")]
    Corruption,

    /// `user_size + sizeof(header)` overflowed `usize`.
    #[error("requested size overflows")]
    SizeOverflow,
}

impl<T> From<PoisonError<T>> for AllocError {
    fn from(_: PoisonError<T>) -> Self {
        AllocError::Corruption
    }
}

/// Result type alias for internal allocator operations.
pub type Result<T> = std::result::Result<T, AllocError>;

thread_local! {
    static LAST_ERROR: Cell<Option<AllocError>> = const { Cell::new(None) };
}

/// Read the error set by the most recent call into this crate's public API
/// on the calling thread. Mirrors `errno`: each public entry point clears
/// it on entry and sets it only when it fails.
pub fn last_error() -> Option<AllocError> {
    LAST_ERROR.with(|cell| cell.get())
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|cell| cell.set(None));
}

pub(crate) fn set_last_error(err: AllocError) {
    LAST_ERROR.with(|cell| cell.set(Some(err)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_starts_clear() {
        clear_last_error();
        assert_eq!(last_error(), None);
    }

    #[test]
    fn last_error_roundtrips() {
        set_last_error(AllocError::OutOfMemory);
        assert_eq!(last_error(), Some(AllocError::OutOfMemory));
        clear_last_error();
        assert_eq!(last_error(), None);
    }
}
