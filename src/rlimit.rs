//! Allocation Ceiling - `RLIMIT_AS` Pre-Flight Check
//!
//! Consulted before every new region map so that exceeding the process's
//! address-space soft limit fails the allocation with `ENOMEM` up front,
//! rather than letting the OS produce an opaque OOM (or a SIGSEGV on a
//! later touch of memory the kernel never actually backed) down the line.

use crate::error::AllocError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bytes currently mapped by this allocator. Tracked separately from the
/// process's total address-space usage (which also includes the binary's
/// own text/data/stack and anything mapped by other allocators in the
/// same process) because that total isn't available through a single
/// portable syscall; this is the conservative approximation the soft
/// limit is checked against.
static COMMITTED: AtomicUsize = AtomicUsize::new(0);

/// Check whether mapping `additional` more bytes would exceed the
/// process's `RLIMIT_AS` soft limit. On success, accounts for the mapping
/// immediately (the caller is expected to map right after this returns
/// `Ok`). Fails open — if `getrlimit` itself errors, the check is skipped
/// rather than blocking every allocation.
pub fn check_allocation(additional: usize) -> Result<(), AllocError> {
    if let Some(limit) = soft_limit_as() {
        let current = COMMITTED.load(Ordering::Relaxed);
        if current.saturating_add(additional) > limit {
            log::warn!(
                "RLIMIT_AS pre-flight rejected a {}-byte region (committed {}, limit {})",
                additional,
                current,
                limit
            );
            return Err(AllocError::OutOfMemory);
        }
    }
    COMMITTED.fetch_add(additional, Ordering::Relaxed);
    Ok(())
}

/// Record that `size` bytes previously accounted for by
/// [`check_allocation`] have been unmapped.
pub fn record_release(size: usize) {
    COMMITTED.fetch_sub(size, Ordering::Relaxed);
}

fn soft_limit_as() -> Option<usize> {
    unsafe {
        let mut rl: libc::rlimit = std::mem::zeroed();
        if libc::getrlimit(libc::RLIMIT_AS, &mut rl) != 0 {
            return None;
        }
        if rl.rlim_cur == libc::RLIM_INFINITY {
            None
        } else {
            Some(rl.rlim_cur as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_allocation_accounts_and_releases() {
        let before = COMMITTED.load(Ordering::Relaxed);
        check_allocation(4096).unwrap();
        assert_eq!(COMMITTED.load(Ordering::Relaxed), before + 4096);
        record_release(4096);
        assert_eq!(COMMITTED.load(Ordering::Relaxed), before);
    }

    #[test]
    fn soft_limit_lookup_does_not_panic() {
        let _ = soft_limit_as();
    }
}
