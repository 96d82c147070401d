//! End-to-end scenarios, one per spec.md's numbered list.

mod common;

use rmalloc::{allocate, last_error, release, report, resize, AllocError};

#[test]
fn scenario_1_two_releases_leave_region_empty() {
    let _guard = common::heap_lock();

    let p = allocate(2048);
    let p2 = allocate(2048);
    assert!(!p.is_null());
    assert!(!p2.is_null());

    release(p);
    release(p2);

    let text = report();
    assert!(!text.contains(" -> "), "no allocated block lines expected:\n{text}");
    assert!(text.ends_with("Total : 0 bytes\n"), "report:\n{text}");
}

#[test]
fn scenario_2_coalesce_reuses_lower_address() {
    let _guard = common::heap_lock();

    let p = allocate(80);
    let q = allocate(104);
    assert!(!p.is_null() && !q.is_null());
    assert_ne!(p, q);

    release(p);
    release(q);

    // `release_and_coalesce` always merges an address-adjacent pair onto
    // the lower-addressed block (backward merge wins), so with nothing
    // else live in between, the region collapses to a single free block
    // at `p`'s old address regardless of the free index's LIFO order.
    let q2 = allocate(80);
    assert_eq!(q2, p);

    release(q2);
}

#[test]
fn scenario_3_large_region_unmapped_on_release() {
    let _guard = common::heap_lock();

    let before = report();
    assert!(!before.contains("LARGE"), "report:\n{before}");

    let p = allocate(8192);
    assert!(!p.is_null());
    let during = report();
    assert!(during.contains("LARGE"), "report:\n{during}");

    release(p);
    let after = report();
    assert!(!after.contains("LARGE"), "report:\n{after}");
}

#[test]
fn scenario_4_resize_grows_preserves_data_and_invalidates_old_pointer() {
    let _guard = common::heap_lock();

    // Carve `filler` first, then `p` right after it while `filler` is
    // still ALLOCATED, so `p`'s block has `filler`'s block as its
    // address-adjacent predecessor. Only then release `filler` — giving
    // `p` a genuine FREE predecessor. That matters below: when `resize`'s
    // grow path frees the old block internally, backward coalescing folds
    // it entirely into that predecessor, so its header stops existing as
    // a distinct node in the address list.
    let filler = allocate(16);
    assert!(!filler.is_null());

    let p = allocate(16);
    assert!(!p.is_null());
    release(filler);
    unsafe {
        std::ptr::copy_nonoverlapping(b"0123456789abcdef".as_ptr(), p, 16);
    }

    let q = resize(p, 4096);
    assert!(!q.is_null());
    assert_ne!(q, p, "growing past the current block's class must move the allocation");

    unsafe {
        let preserved = std::slice::from_raw_parts(q, 16);
        assert_eq!(preserved, b"0123456789abcdef");
    }

    // `resize` already released `p` internally as part of the grow-by-copy
    // fallback, and coalescing absorbed its header into the predecessor
    // freed above — so `p` is no longer in any block list at all. A second
    // release of it must be reported as an invalid pointer, not a double
    // free.
    release(p);
    assert_eq!(last_error(), Some(AllocError::InvalidPointer));

    release(q);
}

#[test]
fn scenario_5_release_of_never_allocated_pointer_is_invalid_and_harmless() {
    let _guard = common::heap_lock();

    let before = report();
    let bogus = 0xdead_beef_usize as *mut u8;

    release(bogus);
    assert_eq!(last_error(), Some(AllocError::InvalidPointer));

    let after = report();
    assert_eq!(before, after, "release of a bogus pointer must not mutate any region");
}
