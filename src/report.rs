//! Heap Inspection - `report()` / `report_hex()`
//!
//! Walks the region list and, within each region, the block list, emitting
//! a line per region header and a line per live allocation. Both
//! traversals run Floyd's tortoise-and-hare first, matching the same
//! corruption-degrades-gracefully policy as `crate::validator`.

use crate::heap::block::{self, BlockHeader, BlockStatus};
use crate::heap::region::{self, RegionHeader};
use crate::size_class::SizeClass;
use std::fmt::Write as _;

const CORRUPTED_ZONE_LIST: &str = "Error: Corrupted zone list detected";
const CORRUPTED_BLOCK_LIST: &str = "Error: Corrupted block list detected";

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

fn class_label(class: SizeClass) -> &'static str {
    match class {
        SizeClass::Tiny => "TINY",
        SizeClass::Small => "SMALL",
        SizeClass::Large => "LARGE",
    }
}

fn write_hex_dump(out: &mut String, payload: *const u8, len: usize) {
    unsafe {
        let bytes = std::slice::from_raw_parts(payload, len);
        for chunk in bytes.chunks(16) {
            for b in chunk {
                let _ = write!(out, "{:02x} ", b);
            }
            for _ in chunk.len()..16 {
                out.push_str("   ");
            }
            out.push_str(": ");
            for &b in chunk {
                let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
                out.push(c);
            }
            out.push('\n');
        }
    }
}

/// Render a heap report. `hex` additionally dumps every allocated
/// payload's bytes in 16-byte-per-line hex/ASCII form.
///
/// # Safety
/// Every node reachable from `region_list_head` must be a valid, live
/// `RegionHeader`/`BlockHeader`.
pub unsafe fn render(region_list_head: *mut RegionHeader, hex: bool) -> String {
    let mut out = String::new();
    let mut total = 0usize;

    unsafe {
        if region_list_has_cycle(region_list_head) {
            out.push_str(CORRUPTED_ZONE_LIST);
            out.push('\n');
            return out;
        }

        let mut region = region_list_head;
        while !region.is_null() {
            let payload_area = region::first_block(region) as usize;
            let _ = writeln!(out, "{} : {:#x}", class_label((*region).class), payload_area);

            let first = region::first_block(region);
            if block_list_has_cycle(first) {
                out.push_str(CORRUPTED_BLOCK_LIST);
                out.push('\n');
                return out;
            }

            let mut block = first;
            while !block.is_null() {
                if (*block).status == BlockStatus::Allocated {
                    let start = block::payload_start(block);
                    let len = block::payload_size(block);
                    let end = start.add(len);
                    let _ = writeln!(out, "{:#x} -> {:#x} : {} bytes", start as usize, end as usize, len);
                    if hex {
                        write_hex_dump(&mut out, start, len);
                    }
                    total += len;
                }
                block = (*block).addr_next;
            }

            region = (*region).list_next;
        }
    }

    let _ = writeln!(out, "Total : {} bytes", total);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::heap::region as region_mod;

    #[test]
    fn empty_region_reports_only_header_and_total() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, true).unwrap();
        unsafe {
            let text = render(region, false);
            assert!(text.contains("TINY :"));
            assert!(text.ends_with("Total : 0 bytes\n"));
            region_mod::release(region);
        }
    }

    #[test]
    fn allocated_block_appears_with_byte_count() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, true).unwrap();
        unsafe {
            let first = region_mod::first_block(region);
            let config = Config::default();
            block::split_and_mark(&mut (*region).free_head, first, block::header_size() + 32, &config);

            let text = render(region, false);
            assert!(text.contains(": 32 bytes"));
            assert!(text.contains("Total : 32 bytes"));

            region_mod::release(region);
        }
    }

    #[test]
    fn hex_variant_includes_dump_lines() {
        let region = region_mod::acquire(SizeClass::Tiny, 0, true).unwrap();
        unsafe {
            let first = region_mod::first_block(region);
            let config = Config::default();
            block::split_and_mark(&mut (*region).free_head, first, block::header_size() + 16, &config);

            let text = render(region, true);
            assert!(text.contains(" : "));
            assert!(text.lines().any(|l| l.contains("00 ") || l.contains("..")));

            region_mod::release(region);
        }
    }
}
