//! Region Manager - Acquiring, Sizing and Tearing Down Regions
//!
//! A region is a contiguous OS mapping: one `RegionHeader` at its base,
//! followed by a block list that starts out as a single FREE block
//! spanning the rest of the mapping. Regions of the same class all have
//! the same fixed size except LARGE regions, which are sized to fit their
//! one allocation exactly.
//!
//! Like the block layer, regions are manipulated through raw pointers
//! rather than an owning Rust value — the region header *is* the region,
//! living at the base of its own mapping, so there is nothing for a
//! separate owning struct to hold except that same pointer.

use crate::error::AllocError;
use crate::heap::block::{self, BlockHeader};
use crate::heap::memory_mapping::MemoryMapping;
use crate::heap::page;
use crate::rlimit;
use crate::size_class::{SizeClass, SMALL_MAX, SMALL_REGION_CAPACITY, TINY_MAX, TINY_REGION_CAPACITY};
use std::mem::size_of;

/// Intrusive region header, `repr(C, align(16))` for the same inductive
/// alignment reason as `BlockHeader`: the region's first block begins
/// immediately after this header, so the header's size must itself be a
/// multiple of `ALIGNMENT`.
#[repr(C, align(16))]
pub struct RegionHeader {
    /// Total mapped size in bytes, including this header.
    pub size: usize,
    pub class: SizeClass,
    /// Pre-seeded TINY/SMALL regions persist for the life of the process;
    /// see `drop_if_empty`.
    pub seeded: bool,
    pub list_prev: *mut RegionHeader,
    pub list_next: *mut RegionHeader,
    /// Head of this region's free index (see `heap::block`).
    pub free_head: *mut BlockHeader,
}

/// Size of the region header, always a multiple of `ALIGNMENT`.
pub fn header_size() -> usize {
    size_of::<RegionHeader>()
}

/// The first block in `region`, immediately following its header.
///
/// # Safety
/// `region` must be a valid, live `RegionHeader`.
pub unsafe fn first_block(region: *mut RegionHeader) -> *mut BlockHeader {
    unsafe { (region as *mut u8).add(header_size()) as *mut BlockHeader }
}

fn tiny_region_size() -> usize {
    page::align_to_page(TINY_MAX * TINY_REGION_CAPACITY)
}

fn small_region_size() -> usize {
    page::align_to_page(SMALL_MAX * SMALL_REGION_CAPACITY)
}

fn large_region_size(hint_total: usize) -> Option<usize> {
    hint_total
        .checked_add(header_size())
        .map(page::align_to_page)
}

/// Acquire a new region of `class`. For TINY/SMALL the size is fixed;
/// `hint_total` is ignored. For LARGE, `hint_total` must be the total
/// block size (block header + payload) the region needs to host.
///
/// Consults `RLIMIT_AS` before mapping (see `crate::rlimit`), maps
/// anonymous read/write memory, and carves the region's first block as
/// one FREE block spanning everything after the header.
pub fn acquire(class: SizeClass, hint_total: usize, seeded: bool) -> Result<*mut RegionHeader, AllocError> {
    let size = match class {
        SizeClass::Tiny => tiny_region_size(),
        SizeClass::Small => small_region_size(),
        SizeClass::Large => large_region_size(hint_total).ok_or(AllocError::SizeOverflow)?,
    };

    rlimit::check_allocation(size)?;

    let mapping = MemoryMapping::map(size)?;
    let base = mapping.base();
    let mapped_len = mapping.len();
    // RegionHeader now owns the mapping's lifetime: it will be unmapped by
    // `release`, not by `MemoryMapping::drop`.
    std::mem::forget(mapping);

    let region = base as *mut RegionHeader;
    unsafe {
        std::ptr::write(
            region,
            RegionHeader {
                size: mapped_len,
                class,
                seeded,
                list_prev: std::ptr::null_mut(),
                list_next: std::ptr::null_mut(),
                free_head: std::ptr::null_mut(),
            },
        );

        let block = first_block(region);
        block::init_block(block, mapped_len - header_size());
        block::free_index_insert(&mut (*region).free_head, block);
    }

    Ok(region)
}

/// Unlink `region` from the region list rooted at `*head`.
///
/// # Safety
/// `region` must currently be linked into the list rooted at `*head`.
pub unsafe fn unlink(head: &mut *mut RegionHeader, region: *mut RegionHeader) {
    unsafe {
        if !(*region).list_prev.is_null() {
            (*(*region).list_prev).list_next = (*region).list_next;
        } else {
            *head = (*region).list_next;
        }
        if !(*region).list_next.is_null() {
            (*(*region).list_next).list_prev = (*region).list_prev;
        }
        (*region).list_prev = std::ptr::null_mut();
        (*region).list_next = std::ptr::null_mut();
    }
}

/// Insert `region` into the region list rooted at `*head`, keeping the
/// list sorted by ascending base address.
///
/// # Safety
/// Every node reachable from `*head` must be a valid, live `RegionHeader`.
pub unsafe fn insert_sorted(head: &mut *mut RegionHeader, region: *mut RegionHeader) {
    unsafe {
        let mut cursor = *head;
        let mut prev: *mut RegionHeader = std::ptr::null_mut();
        while !cursor.is_null() && (cursor as usize) < (region as usize) {
            prev = cursor;
            cursor = (*cursor).list_next;
        }
        (*region).list_prev = prev;
        (*region).list_next = cursor;
        if !cursor.is_null() {
            (*cursor).list_prev = region;
        }
        if prev.is_null() {
            *head = region;
        } else {
            (*prev).list_next = region;
        }
    }
}

/// Unmap `region`. Does not unlink it from any list — callers must do
/// that first via `unlink`.
///
/// # Safety
/// `region` must not be accessed, directly or through any other pointer
/// into its mapping, after this call returns.
pub unsafe fn release(region: *mut RegionHeader) {
    unsafe {
        let size = (*region).size;
        libc::munmap(region as *mut libc::c_void, size);
        rlimit::record_release(size);
    }
}

/// Whether `region` currently has nothing live in it: exactly one block,
/// FREE, spanning the whole region.
///
/// # Safety
/// `region` must be a valid, live `RegionHeader`.
pub unsafe fn is_wholly_free(region: *mut RegionHeader) -> bool {
    unsafe {
        let block = first_block(region);
        (*block).status == block::BlockStatus::Free
            && (*block).addr_next.is_null()
            && (*block).size == (*region).size - header_size()
    }
}

/// Tear `region` down if [`is_wholly_free`] and it isn't one of the two
/// pre-seeded TINY/SMALL regions (those persist for the process lifetime;
/// see the allocator's design notes on region lifecycle).
///
/// # Safety
/// `region` must currently be linked into the list rooted at `*head`.
pub unsafe fn drop_if_empty(head: &mut *mut RegionHeader, region: *mut RegionHeader) -> bool {
    unsafe {
        if (*region).seeded || !is_wholly_free(region) {
            return false;
        }
        unlink(head, region);
        release(region);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_tiny_seeds_one_free_block() {
        let region = acquire(SizeClass::Tiny, 0, true).unwrap();
        unsafe {
            assert!(is_wholly_free(region));
            assert_eq!((*region).class, SizeClass::Tiny);
            assert!((*region).seeded);
            release(region);
        }
    }

    #[test]
    fn acquire_large_sizes_to_hint() {
        let hint = 1 << 20;
        let region = acquire(SizeClass::Large, hint, false).unwrap();
        unsafe {
            assert!((*region).size >= hint + header_size());
            release(region);
        }
    }

    #[test]
    fn insert_sorted_keeps_address_order() {
        let a = acquire(SizeClass::Tiny, 0, false).unwrap();
        let b = acquire(SizeClass::Tiny, 0, false).unwrap();
        let (lo, hi) = if (a as usize) < (b as usize) { (a, b) } else { (b, a) };

        unsafe {
            let mut head: *mut RegionHeader = std::ptr::null_mut();
            insert_sorted(&mut head, hi);
            insert_sorted(&mut head, lo);

            assert_eq!(head, lo);
            assert_eq!((*head).list_next, hi);
            assert_eq!((*hi).list_prev, lo);

            release(a);
            release(b);
        }
    }

    #[test]
    fn drop_if_empty_refuses_seeded_region() {
        let region = acquire(SizeClass::Tiny, 0, true).unwrap();
        unsafe {
            let mut head = region;
            assert!(!drop_if_empty(&mut head, region));
            release(region);
        }
    }
}
