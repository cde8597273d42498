// =============================================================================
// hoard-alloc — Block Header
// =============================================================================
//
// The audited module translating between (superblock base, class, block
// index) and (block-header address, payload address). Every other module
// in this crate reaches a payload pointer only through `header_of` and
// `payload_of` — no other code computes a header/payload offset inline.
// =============================================================================

use core::ptr::NonNull;

use super::superblock::SuperblockHeader;

/// Header immediately preceding every block's payload.
#[repr(C)]
pub struct BlockHeader {
    /// Byte size of the class for small blocks, or the exact user
    /// request size for large blocks (needed to size the unmap on free).
    pub block_size: usize,

    /// Link within the containing superblock's free list. Garbage once
    /// the block is handed out — it is reused as the free-list link only
    /// while the block is free.
    pub next: Option<NonNull<BlockHeader>>,

    /// Back-reference to the owning superblock. `None` for large blocks,
    /// which are identified at free time by `block_size > LARGE_THRESHOLD`
    /// rather than by this field being absent.
    pub parent_superblock: Option<NonNull<SuperblockHeader>>,
}

/// Returns the payload pointer for a block, i.e. the address immediately
/// after its header.
#[inline]
pub fn payload_of(header: NonNull<BlockHeader>) -> NonNull<u8> {
    // SAFETY: `header` points to a valid BlockHeader; adding 1 header's
    // worth of bytes stays within the block's allocated region (the
    // payload immediately follows the header in every block layout this
    // crate constructs).
    unsafe { NonNull::new_unchecked(header.as_ptr().add(1) as *mut u8) }
}

/// Returns the header immediately preceding a payload pointer previously
/// returned by [`payload_of`] (or by the public `allocate`/`resize` API).
///
/// # Safety
/// `payload` must point at a payload region created by this crate, i.e.
/// immediately preceded by a valid `BlockHeader`.
#[inline]
pub unsafe fn header_of(payload: NonNull<u8>) -> NonNull<BlockHeader> {
    unsafe { NonNull::new_unchecked((payload.as_ptr() as *mut BlockHeader).offset(-1)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::{alloc, dealloc, Layout};

    #[test]
    fn payload_and_header_round_trip() {
        let layout = Layout::new::<BlockHeader>()
            .extend(Layout::array::<u8>(64).unwrap())
            .unwrap()
            .0
            .pad_to_align();

        // SAFETY: layout is non-zero-sized.
        let raw = unsafe { alloc(layout) };
        assert!(!raw.is_null());
        let header = NonNull::new(raw as *mut BlockHeader).unwrap();

        // SAFETY: `raw` is valid for `layout`.
        unsafe {
            (*header.as_ptr()).block_size = 64;
            (*header.as_ptr()).next = None;
            (*header.as_ptr()).parent_superblock = None;
        }

        let payload = payload_of(header);
        let recovered = unsafe { header_of(payload) };
        assert_eq!(recovered.as_ptr(), header.as_ptr());

        unsafe { dealloc(raw, layout) };
    }
}
