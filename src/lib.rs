//! # rmalloc - A Region-Based, Thread-Safe `malloc` Replacement
//!
//! rmalloc is a drop-in replacement for `malloc`/`free`/`realloc`, built
//! around fixed-size regions carved by size class rather than a single
//! flat heap. It adds one thing libc's allocator doesn't give you for
//! free: [`report`], a walk of every live allocation for debugging and
//! leak hunting.
//!
//! ## Overview
//!
//! - **Size classes**: every allocation is classified TINY (≤ 256 bytes
//!   total), SMALL (≤ 4096 bytes total), or LARGE, and served from a
//!   region dedicated to that class.
//! - **Regions**: TINY and SMALL regions are fixed-size `mmap` arenas
//!   hosting many blocks; LARGE regions are sized to fit exactly one
//!   allocation. Two regions (one TINY, one SMALL) are seeded at process
//!   start and never torn down.
//! - **Blocks**: intrusive headers threaded in address order (for
//!   coalescing) and, while FREE, through a per-region free index (for
//!   first-fit search).
//! - **One lock**: a single process-wide mutex serializes every public
//!   entry point. There is no per-thread cache or lock-free fast path in
//!   this revision.
//!
//! ## Quick Start
//!
//! ```rust
//! use rmalloc::{allocate, release, report};
//!
//! let ptr = allocate(128);
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     *(ptr as *mut u64) = 0x1234_5678;
//! }
//!
//! println!("{}", report());
//!
//! release(ptr);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    HEAP (parking_lot::Mutex)                │
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐             │
//! │  │  TINY      │   │  SMALL     │   │  LARGE     │   ...    │
//! │  │  region    │   │  region    │   │  region    │          │
//! │  │ ┌───┬───┐  │   │ ┌───┬───┐  │   │ ┌────────┐ │          │
//! │  │ │blk│blk│..│   │ │blk│blk│..│   │ │  blk   │ │          │
//! │  │ └───┴───┘  │   │ └───┴───┘  │   │ └────────┘ │          │
//! │  └───────────┘   └───────────┘   └───────────┘             │
//! └───────────────────────────────────────────────────────────┘
//!          ▲                                  │
//!          │ allocate / release / resize       │ report / report_hex
//!          └──────────────────────────────────┘
//! ```
//!
//! Every pointer-taking entry point passes through [`validator`] first: a
//! reverse lookup that turns an arbitrary `*mut u8` into the unique block
//! whose payload starts there, or rejects it. Region and block lists are
//! walked with Floyd's tortoise-and-hare cycle detection so a corrupted
//! heap degrades gracefully instead of hanging.
//!
//! ## Safety
//!
//! This crate is built entirely on raw pointers and `unsafe` — the
//! region and block headers are read directly out of `mmap`'d memory,
//! not owned by any Rust value. Callers of the public API never see
//! `unsafe`, but anyone extending [`heap`] should read its module docs
//! before touching a header in place.
//!
//! ## Hardening
//!
//! Controlled by [`Config`], parsed once from the environment (see
//! [`config`]): payload perturbation on alloc/free, an invalid-pointer
//! and double-free policy (print / abort / include pointer), and whether
//! `report()` includes a hex dump by default. `report_hex()` always
//! includes one regardless of configuration.
//!
//! ## Modules
//!
//! - [`size_class`]: TINY/SMALL/LARGE classification and the constants
//!   that drive region sizing.
//! - [`heap`]: the region manager, block layer, memory mapping, and the
//!   global heap tying them together behind one mutex.
//! - [`validator`]: reverse pointer-to-block lookup.
//! - [`report`]: heap report rendering.
//! - [`rlimit`]: `RLIMIT_AS` pre-flight accounting.
//! - [`config`]: environment-driven hardening configuration.
//! - [`error`]: error types and the thread-local last-error channel.
//! - [`util`]: alignment helpers shared across modules.

pub mod config;
pub mod error;
pub mod heap;
pub mod report;
pub mod rlimit;
pub mod size_class;
pub mod util;
pub mod validator;

pub use config::{Config, ConfigError};
pub use error::{last_error, AllocError, Result};
pub use heap::{allocate, release, report as heap_report, report_hex, resize};

/// `rmalloc`'s version string, from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render a heap report. Thin wrapper over [`heap::report`] so the crate
/// root reads the way the four-function public surface is described:
/// `allocate`, `release`, `resize`, `report`.
pub fn report() -> String {
    heap_report()
}

/// `std::alloc::GlobalAlloc` adapter over the public `allocate`/`release`/
/// `resize` entry points, so the allocator can be installed process-wide:
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOC: rmalloc::RMalloc = rmalloc::RMalloc;
/// ```
///
/// `Layout`'s alignment is not honored beyond [`size_class::ALIGNMENT`]
/// (16 bytes) — every payload this allocator hands out is 16-byte
/// aligned by construction, but a caller requesting a coarser alignment
/// than that will not get it from this adapter.
pub struct RMalloc;

unsafe impl std::alloc::GlobalAlloc for RMalloc {
    unsafe fn alloc(&self, layout: std::alloc::Layout) -> *mut u8 {
        allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: std::alloc::Layout) {
        release(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: std::alloc::Layout, new_size: usize) -> *mut u8 {
        resize(ptr, new_size)
    }
}
