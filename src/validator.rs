//! Reverse Lookup / Validator
//!
//! `find_block` is the gate every public entry point that takes a user
//! pointer passes through first. It turns an arbitrary `*mut u8` into
//! either the unique block whose payload starts there, or `None` — the
//! single predicate "not a currently-live allocation of this allocator"
//! that callers need, regardless of whether the pointer is garbage, was
//! never ours, or points into the middle of someone else's payload.
//!
//! Every traversal here runs Floyd's tortoise-and-hare first so that a
//! corrupted region or block list degrades to "nothing found" instead of
//! hanging the allocator.

use crate::heap::block::BlockHeader;
use crate::heap::region::{self, RegionHeader};

unsafe fn region_list_has_cycle(head: *mut RegionHeader) -> bool {
    if head.is_null() {
        return false;
    }
    let mut slow = head;
    let mut fast = unsafe { (*head).list_next };
    while !fast.is_null() {
        if slow == fast {
            return true;
        }
        slow = unsafe { (*slow).list_next };
        fast = unsafe { (*fast).list_next };
        if fast.is_null() {
            break;
        }
        fast = unsafe { (*fast).list_next };
    }
    false
}

unsafe fn block_list_has_cycle(head: *mut BlockHeader) -> bool {
    if head.is_null() {
        return false;
    }
    let mut slow = head;
    let mut fast = unsafe { (*head).addr_next };
    while !fast.is_null() {
        if slow == fast {
            return true;
        }
        slow = unsafe { (*slow).addr_next };
        fast = unsafe { (*fast).addr_next };
        if fast.is_null() {
            break;
        }
        fast = unsafe { (*fast).addr_next };
    }
    false
}

unsafe fn block_in_bounds(region: *mut RegionHeader, block: *mut BlockHeader) -> bool {
    unsafe {
        let region_start = region as usize;
        let region_end = region_start + (*region).size;
        let block_addr = block as usize;
        let header_size = region::header_size();

        block_addr >= region_start
            && block_addr < region_end
            && (*block).size >= crate::heap::block::header_size()
            && (*block).size <= (*region).size
            && block_addr.saturating_add((*block).size) <= region_end
            && header_size <= (*region).size
    }
}

/// Find the block, in any region reachable from `region_list_head`, whose
/// payload starts exactly at `ptr`. Returns `None` if `ptr` is null, not
/// inside any region, inside a region but not a payload start, or if
/// corruption is detected partway through a traversal (in which case the
/// affected traversal is abandoned, but regions already scanned are not
/// re-reported — see `crate::error::AllocError::Corruption` callers).
///
/// # Safety
/// Every node reachable from `region_list_head` must be a valid `RegionHeader`
/// mapped with at least `header_size()` readable bytes.
pub unsafe fn find_block(region_list_head: *mut RegionHeader, ptr: *mut u8) -> Option<*mut BlockHeader> {
    if ptr.is_null() {
        return None;
    }

    unsafe {
        if region_list_has_cycle(region_list_head) {
            log::warn!("corrupted region list detected during pointer lookup");
            return None;
        }

        let mut region = region_list_head;
        while !region.is_null() {
            let region_start = region as usize;
            let region_end = region_start + (*region).size;
            let addr = ptr as usize;

            if addr >= region_start && addr < region_end {
                let first = region::first_block(region);
                if block_list_has_cycle(first) {
                    log::warn!("corrupted block list detected during pointer lookup");
                    return None;
                }

                let mut block = first;
                while !block.is_null() {
                    if !block_in_bounds(region, block) {
                        log::warn!("bounds violation detected during pointer lookup");
                        return None;
                    }
                    if crate::heap::block::payload_start(block) == ptr {
                        return Some(block);
                    }
                    block = (*block).addr_next;
                }
                return None;
            }

            region = (*region).list_next;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::block::{self, BlockStatus};
    use crate::heap::region as region_mod;
    use crate::size_class::SizeClass;

    #[test]
    fn finds_block_at_payload_start() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, false).unwrap();
        unsafe {
            let first = region_mod::first_block(region);
            let payload = block::payload_start(first);

            let found = find_block(region, payload);
            assert_eq!(found, Some(first));

            region_mod::release(region);
        }
    }

    #[test]
    fn rejects_pointer_not_a_payload_start() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, false).unwrap();
        unsafe {
            let first = region_mod::first_block(region);
            let payload = block::payload_start(first);
            let misaligned = payload.add(3);

            assert_eq!(find_block(region, misaligned), None);

            region_mod::release(region);
        }
    }

    #[test]
    fn rejects_pointer_outside_any_region() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, false).unwrap();
        let far_away = 0xdead_beef as *mut u8;
        unsafe {
            assert_eq!(find_block(region, far_away), None);
            region_mod::release(region);
        }
    }

    #[test]
    fn finds_block_after_split_by_status() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, false).unwrap();
        unsafe {
            let first = region_mod::first_block(region);
            let config = crate::config::Config::default();
            block::split_and_mark(&mut (*region).free_head, first, 64, &config);

            let payload = block::payload_start(first);
            let found = find_block(region, payload).unwrap();
            assert_eq!(found, first);
            assert_eq!((*found).status, BlockStatus::Allocated);

            region_mod::release(region);
        }
    }
}
