//! Global Heap - The Region List and the Four Public Entry Points
//!
//! `GlobalHeap` owns the head of the region list and is reached only
//! through the single process-wide mutex in [`HEAP`]. Every public
//! entry point (`allocate`, `release`, `resize`, `report`, `report_hex`)
//! locks it, does its work, and returns — there is no lock-free fast
//! path and no per-thread cache.

pub mod block;
pub mod memory_mapping;
pub mod page;
pub mod region;

use crate::config::Config;
use crate::error::{self, AllocError};
use crate::heap::block::{
    header_size, payload_size, payload_start, release_and_coalesce, shrink_in_place, split_and_mark, BlockHeader,
    BlockStatus,
};
use crate::heap::region::RegionHeader;
use crate::size_class::{SizeClass, ALIGNMENT};
use crate::util::Alignment;
use crate::validator;
use lazy_static::lazy_static;
use parking_lot::Mutex;

lazy_static! {
    static ref HEAP: Mutex<GlobalHeap> = Mutex::new(GlobalHeap::bootstrap());
}

/// Owns the region list. Lives entirely behind [`HEAP`]; nothing outside
/// this module ever sees a `&GlobalHeap` or `&mut GlobalHeap`.
struct GlobalHeap {
    region_head: *mut RegionHeader,
}

// Guarded exclusively by the mutex in `HEAP`; raw pointers inside are
// never touched concurrently.
unsafe impl Send for GlobalHeap {}

impl GlobalHeap {
    /// Seed one TINY and one SMALL region so the first allocation never
    /// races region creation with other process startup code.
    fn bootstrap() -> Self {
        let mut heap = GlobalHeap {
            region_head: std::ptr::null_mut(),
        };

        for class in [SizeClass::Tiny, SizeClass::Small] {
            match region::acquire(class, 0, true) {
                Ok(region) => unsafe { region::insert_sorted(&mut heap.region_head, region) },
                Err(e) => log::error!("failed to seed {:?} region at startup: {}", class, e),
            }
        }

        heap
    }

    unsafe fn first_fit(&self, class: SizeClass, total: usize) -> Option<*mut BlockHeader> {
        unsafe {
            let mut region = self.region_head;
            while !region.is_null() {
                if (*region).class == class {
                    let mut block = (*region).free_head;
                    while !block.is_null() {
                        if (*block).size >= total {
                            return Some(block);
                        }
                        block = (*block).free_next;
                    }
                }
                region = (*region).list_next;
            }
            None
        }
    }

    unsafe fn region_of(&self, block: *mut BlockHeader) -> *mut RegionHeader {
        unsafe {
            let addr = block as usize;
            let mut region = self.region_head;
            while !region.is_null() {
                let start = region as usize;
                let end = start + (*region).size;
                if addr >= start && addr < end {
                    return region;
                }
                region = (*region).list_next;
            }
            std::ptr::null_mut()
        }
    }

    fn allocate_in(&mut self, class: SizeClass, total: usize, config: &Config) -> Result<*mut u8, AllocError> {
        unsafe {
            if let Some(block) = self.first_fit(class, total) {
                let region = self.region_of(block);
                split_and_mark(&mut (*region).free_head, block, total, config);
                return Ok(payload_start(block));
            }

            let region = region::acquire(class, total, false)?;
            region::insert_sorted(&mut self.region_head, region);
            let block = (*region).free_head;
            split_and_mark(&mut (*region).free_head, block, total, config);
            Ok(payload_start(block))
        }
    }

    fn release_ptr(&mut self, ptr: *mut u8, config: &Config) {
        unsafe {
            let block = match validator::find_block(self.region_head, ptr) {
                Some(block) => block,
                None => {
                    report_policy_violation("invalid pointer passed to release", ptr, config);
                    error::set_last_error(AllocError::InvalidPointer);
                    return;
                }
            };

            if (*block).status == BlockStatus::Free {
                report_policy_violation("double free detected", ptr, config);
                error::set_last_error(AllocError::DoubleFree);
                return;
            }

            let region = self.region_of(block);
            release_and_coalesce(&mut (*region).free_head, block, config);
            region::drop_if_empty(&mut self.region_head, region);
            error::clear_last_error();
        }
    }

    /// `Ok(Some(ptr))`: resized in place, same address. `Ok(None)`: the
    /// block is valid and ALLOCATED but doesn't fit `new_size` in its
    /// current region/class — the caller must fall back to
    /// allocate-copy-release. `Err` means `ptr` is not a live allocation.
    fn resize_ptr(&mut self, ptr: *mut u8, new_size: usize, config: &Config) -> Result<Option<*mut u8>, AllocError> {
        unsafe {
            let block = validator::find_block(self.region_head, ptr).ok_or(AllocError::InvalidPointer)?;
            if (*block).status != BlockStatus::Allocated {
                return Err(AllocError::InvalidPointer);
            }

            let new_total = new_size
                .checked_add(header_size())
                .map(|t| Alignment::align_up(t, ALIGNMENT))
                .ok_or(AllocError::SizeOverflow)?;

            let region = self.region_of(block);
            if (*region).class == SizeClass::classify(new_total) && (*block).size >= new_total {
                if (*block).size - new_total >= header_size() + ALIGNMENT {
                    shrink_in_place(&mut (*region).free_head, block, new_total, config);
                }
                return Ok(Some(ptr));
            }

            Ok(None)
        }
    }

    unsafe fn region_list_head(&self) -> *mut RegionHeader {
        self.region_head
    }
}

fn report_policy_violation(message: &str, ptr: *mut u8, config: &Config) {
    if config.should_print() {
        if config.should_print_pointer() {
            log::error!("{}: {:?}", message, ptr);
        } else {
            log::error!("{}", message);
        }
    }
    if config.should_abort() {
        std::process::abort();
    }
}

/// Allocate `user_size` bytes. Returns null (with the error channel set)
/// on overflow or out-of-memory. `user_size == 0` returns null with no
/// side effect, matching libc `malloc(0)`.
pub fn allocate(user_size: usize) -> *mut u8 {
    if user_size == 0 {
        return std::ptr::null_mut();
    }

    let config = Config::global();
    let total = match user_size.checked_add(header_size()) {
        Some(t) => t,
        None => {
            error::set_last_error(AllocError::SizeOverflow);
            return std::ptr::null_mut();
        }
    };
    let class = SizeClass::classify(total);

    let mut heap = HEAP.lock();
    match heap.allocate_in(class, total, config) {
        Ok(ptr) => {
            error::clear_last_error();
            ptr
        }
        Err(e) => {
            log::debug!("allocate({}) failed: {}", user_size, e);
            error::set_last_error(e);
            std::ptr::null_mut()
        }
    }
}

/// Release a previously allocated pointer. Null is a no-op. A pointer
/// that isn't a live allocation of this allocator is handled per the
/// invalid-pointer policy in [`Config`] and otherwise ignored.
pub fn release(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let config = Config::global();
    let mut heap = HEAP.lock();
    heap.release_ptr(ptr, config);
}

/// Resize a previously allocated pointer, preserving contents up to
/// `min(old_size, new_size)`. See the module-level contract: null `ptr`
/// behaves like `allocate`, `new_size == 0` behaves like `release`.
pub fn resize(ptr: *mut u8, new_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return allocate(new_size);
    }
    if new_size == 0 {
        release(ptr);
        return std::ptr::null_mut();
    }

    let config = Config::global();

    let in_place = {
        let mut heap = HEAP.lock();
        heap.resize_ptr(ptr, new_size, config)
    };

    match in_place {
        Ok(Some(ptr)) => {
            error::clear_last_error();
            ptr
        }
        Err(_) => {
            error::set_last_error(AllocError::InvalidPointer);
            std::ptr::null_mut()
        }
        Ok(None) => {
            // Grow-by-copy: the lock is not held across allocate/release so
            // resize never recursively acquires it. The old block is
            // re-looked-up after the new allocation succeeds, per the
            // synchronization contract — nothing mutated in between is
            // relied upon.
            let old_size = {
                let heap = HEAP.lock();
                let found = unsafe { validator::find_block(heap.region_list_head(), ptr) };
                found.map(|b| unsafe { payload_size(b) })
            };
            let Some(old_size) = old_size else {
                error::set_last_error(AllocError::InvalidPointer);
                return std::ptr::null_mut();
            };

            let new_ptr = allocate(new_size);
            if new_ptr.is_null() {
                return std::ptr::null_mut();
            }

            unsafe {
                std::ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));
            }
            release(ptr);
            new_ptr
        }
    }
}

/// Render a heap report in the format documented on the crate root.
pub fn report() -> String {
    let config = Config::global();
    let heap = HEAP.lock();
    unsafe { crate::report::render(heap.region_list_head(), config.hex_dump) }
}

/// Render a heap report that always includes the hex/ASCII payload dump.
pub fn report_hex() -> String {
    let heap = HEAP.lock();
    unsafe { crate::report::render(heap.region_list_head(), true) }
}
