//! Page Helpers - OS Page Size Rounding
//!
//! The region manager always maps whole multiples of the OS page size.
//! These helpers wrap `page_size::get()` with a cached lookup and provide
//! the rounding arithmetic used when sizing a new region.

use std::sync::atomic::{AtomicUsize, Ordering};

/// System page size (cached).
static SYSTEM_PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Get system page size dynamically, caching the result.
pub fn get_page_size() -> usize {
    let cached = SYSTEM_PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }

    let size = page_size::get();
    SYSTEM_PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Round `size` up to the next multiple of the OS page size.
pub fn align_to_page(size: usize) -> usize {
    let ps = get_page_size();
    (size + ps - 1) & !(ps - 1)
}

/// Check if `addr` is page-aligned.
pub fn is_page_aligned(addr: usize) -> bool {
    addr.is_multiple_of(get_page_size())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_cached_and_nonzero() {
        let a = get_page_size();
        let b = get_page_size();
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn align_to_page_rounds_up() {
        let ps = get_page_size();
        assert_eq!(align_to_page(1), ps);
        assert_eq!(align_to_page(ps), ps);
        assert_eq!(align_to_page(ps + 1), ps * 2);
        assert!(is_page_aligned(align_to_page(12345)));
    }
}
