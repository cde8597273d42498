// =============================================================================
// hoard-alloc — Superblock
// =============================================================================
//
// A superblock is a fixed-size contiguous region carved into equal-sized
// blocks for one size class. This module owns construction (spec §4.2)
// and the raw free-list push/pop primitives; the fullness-sorted list
// that threads superblocks together within a size class lives in
// `size_class`.
// =============================================================================

use core::mem::size_of;
use core::ptr;
use core::ptr::NonNull;
use core::sync::atomic::AtomicU8;

use crate::config;

use super::block::BlockHeader;

/// Header at the start of every superblock.
pub struct SuperblockHeader {
    /// Count of currently allocated blocks.
    pub used_blocks: usize,

    /// Total block capacity, fixed at construction.
    pub num_of_blocks: usize,

    /// Head of the intra-superblock free list.
    pub free_list_head: Option<NonNull<BlockHeader>>,

    /// Links within the owning size class's fullness-sorted list.
    pub prev: Option<NonNull<SuperblockHeader>>,
    pub next: Option<NonNull<SuperblockHeader>>,

    /// Back-reference to the owning heap, updated on migration. An index
    /// rather than a pointer — see the "cyclic references" design note.
    ///
    /// `migrate` only ever runs while holding both the source and
    /// destination class locks, never a superblock-level lock (spec.md
    /// §5's lock order is superblock before class everywhere; a
    /// superblock lock taken while a class lock is already held would
    /// invert that order). So a reader without either class lock held
    /// yet — `heap::free_small`, picking which class lock to take — reads
    /// this atomically and re-checks it after acquiring the class lock it
    /// named, retrying if a migration raced ahead of it in the meantime.
    pub parent_heap: AtomicU8,
}

/// Constructs a superblock for size class `class` inside a freshly
/// mapped, zero-filled region of exactly `config::SUPERBLOCK_SIZE` bytes.
///
/// Chains every block via `next` in address order and stamps every
/// block's `block_size`/`parent_superblock` (spec §4.2). `parent_heap` is
/// left at `0`; callers must set it once they know which heap owns the
/// superblock.
///
/// # Safety
/// `region` must point to `config::SUPERBLOCK_SIZE` bytes of writable
/// memory, not concurrently accessed by anything else.
pub unsafe fn construct(region: NonNull<u8>, class: usize) -> NonNull<SuperblockHeader> {
    let block_payload_size = 1usize << class;
    let block_stride = size_of::<BlockHeader>() + block_payload_size;
    let num_of_blocks = capacity_for_class(class);

    let header_ptr = region.as_ptr() as *mut SuperblockHeader;

    // SAFETY: `region` is `SUPERBLOCK_SIZE` writable bytes, large enough
    // for one `SuperblockHeader` followed by `num_of_blocks` blocks by
    // construction of `num_of_blocks` above.
    unsafe {
        ptr::write(
            header_ptr,
            SuperblockHeader {
                used_blocks: 0,
                num_of_blocks,
                free_list_head: None,
                prev: None,
                next: None,
                parent_heap: AtomicU8::new(0),
            },
        );
    }

    let blocks_base = unsafe { header_ptr.add(1) as *mut u8 };

    // Chain in address order: build back-to-front so the final head
    // points at the lowest address and `next` always points forward.
    let mut head: Option<NonNull<BlockHeader>> = None;
    for i in (0..num_of_blocks).rev() {
        // SAFETY: `i * block_stride` stays within the region — bounded
        // by `num_of_blocks * block_stride <= usable`.
        let block_ptr = unsafe { blocks_base.add(i * block_stride) as *mut BlockHeader };
        unsafe {
            ptr::write(
                block_ptr,
                BlockHeader {
                    block_size: block_payload_size,
                    next: head,
                    parent_superblock: NonNull::new(header_ptr),
                },
            );
        }
        head = NonNull::new(block_ptr);
    }

    // SAFETY: header_ptr was just written above.
    unsafe {
        (*header_ptr).free_list_head = head;
    }

    // SAFETY: header_ptr is non-null (derived from a NonNull `region`).
    unsafe { NonNull::new_unchecked(header_ptr) }
}

/// The fixed block capacity every superblock of size class `class` has,
/// per spec.md §3: `floor((SUPERBLOCK_SIZE - sizeof(header)) /
/// (sizeof(block_header) + 2^class))`. Depends only on `class`, not on
/// any particular superblock instance — used both by [`construct`] and
/// by the emptiness-invariant check in `heap::free_small`, which needs
/// "the per-superblock capacity of the class" without a live superblock
/// to read it from.
pub fn capacity_for_class(class: usize) -> usize {
    let block_payload_size = 1usize << class;
    let block_stride = size_of::<BlockHeader>() + block_payload_size;
    let usable = config::SUPERBLOCK_SIZE - size_of::<SuperblockHeader>();
    usable / block_stride
}

impl SuperblockHeader {
    /// Pops the head of the free list, if any. Callers must already hold
    /// whatever lock governs this superblock's free list on the current
    /// path (the owning size class's lock on both the allocate and free
    /// paths — see `heap`).
    pub fn pop_free(&mut self) -> Option<NonNull<BlockHeader>> {
        let head = self.free_list_head?;
        // SAFETY: `head` is a live block header owned by this superblock.
        self.free_list_head = unsafe { (*head.as_ptr()).next };
        Some(head)
    }

    /// Pushes `block` onto the head of the free list.
    pub fn push_free(&mut self, block: NonNull<BlockHeader>) {
        // SAFETY: `block` is a live block header owned by this superblock.
        unsafe {
            (*block.as_ptr()).next = self.free_list_head;
        }
        self.free_list_head = Some(block);
    }

    /// Whether this superblock has at least one free block.
    #[inline]
    pub fn has_free(&self) -> bool {
        self.used_blocks < self.num_of_blocks
    }
}
