// =============================================================================
// hoard-alloc — Large-Block Path
// =============================================================================
//
// Requests over `config::LARGE_THRESHOLD` bypass the heaps entirely
// (spec.md §4.4 step 2, §4.5 step 2): one `os::map`/`os::unmap` call per
// allocation, no locks, no superblock involved. The large/small split at
// free time is the magnitude test spec.md §9 attributes to the original
// source (`block_size > SUPERBLOCK_SIZE/2`), not a tag bit.
// =============================================================================

use core::mem::size_of;
use core::ptr::NonNull;

use crate::config;
use crate::os;

use super::block::{self, BlockHeader};

/// Maps `sz + sizeof(BlockHeader)` bytes, stamps the header with the
/// exact requested size, and returns the payload pointer. `None` on OS
/// exhaustion.
pub fn allocate_large(sz: usize) -> Option<NonNull<u8>> {
    let total = sz.checked_add(size_of::<BlockHeader>())?;
    let (region, _mapped) = os::map(total)?;

    let header = region.cast::<BlockHeader>();
    // SAFETY: `region` is `total` freshly mapped, exclusively owned bytes,
    // large enough for one `BlockHeader`.
    unsafe {
        header.as_ptr().write(BlockHeader {
            block_size: sz,
            next: None,
            parent_superblock: None,
        });
    }

    Some(block::payload_of(header))
}

/// Unmaps a large block previously returned by [`allocate_large`].
///
/// # Safety
/// `header` must be a live large-block header, i.e. `block_size >
/// config::LARGE_THRESHOLD` and the region was obtained from
/// [`allocate_large`] and not already freed.
pub unsafe fn free_large(header: NonNull<BlockHeader>) {
    let block_size = unsafe { (*header.as_ptr()).block_size };
    debug_assert!(block_size > config::LARGE_THRESHOLD);
    let total = block_size + size_of::<BlockHeader>();
    // SAFETY: `header` points at the base of a region `map`'d by
    // `allocate_large` with exactly `total` bytes, per caller contract.
    unsafe { os::unmap(header.cast::<u8>(), total) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_large_stamps_exact_size() {
        let sz = config::LARGE_THRESHOLD + 1;
        let payload = allocate_large(sz).expect("map should succeed");
        let header = unsafe { block::header_of(payload) };
        assert_eq!(unsafe { (*header.as_ptr()).block_size }, sz);
        unsafe { free_large(header) };
    }

    #[test]
    fn allocate_large_region_is_writable_for_full_size() {
        let sz = config::LARGE_THRESHOLD + 4096;
        let payload = allocate_large(sz).expect("map should succeed");
        unsafe {
            core::ptr::write_bytes(payload.as_ptr(), 0x42, sz);
        }
        let header = unsafe { block::header_of(payload) };
        unsafe { free_large(header) };
    }
}
