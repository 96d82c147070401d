//! Shared test harness bits.
//!
//! The allocator is one process-wide singleton (`rmalloc::heap::HEAP`), so
//! tests that assert on its exact state — total outstanding bytes, which
//! pointer a fresh allocation reuses — need to run without another test's
//! allocations interleaved. `heap_lock` gives every such test exclusive
//! access to the shared heap for the duration of the test; tests that only
//! check properties of their own pointers don't need it.

use std::sync::{Mutex, MutexGuard, OnceLock};

pub fn heap_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|p| p.into_inner())
}
