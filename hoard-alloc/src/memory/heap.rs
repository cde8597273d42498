// =============================================================================
// hoard-alloc — Heap
// =============================================================================
//
// Ties size classes together into per-CPU heaps plus one reserved global
// heap, and implements the allocate/free/migrate algorithms of spec.md
// §4.4-§4.6 over them. This is the direct analogue of
// `original_source/mtmm.c`'s `malloc`/`free`/`move_superblock`, and of
// the teacher's `memory::pmm` in spirit: one lazily-initialized, never-
// torn-down global structure reached through per-slot locks rather than
// one coarse lock over everything.
// =============================================================================

use core::ptr::NonNull;
use core::sync::atomic::Ordering;
use std::sync::OnceLock;

use crate::config;
use crate::os;
use crate::sync::spinlock::SpinLock;

use super::block;
use super::size_class::SizeClass;
use super::superblock::{self, SuperblockHeader};

/// Index into the fixed heap array. `config::GLOBAL_HEAP_INDEX` is the
/// reserved global heap; every other value is a per-CPU heap.
pub type HeapId = u8;

/// A heap: one CPU's local allocator state, or the global overflow heap.
pub struct Heap {
    pub id: HeapId,
    pub classes: [SpinLock<SizeClass>; config::NUM_OF_CLASSES],
}

impl Heap {
    fn new(id: HeapId) -> Self {
        Self {
            id,
            classes: core::array::from_fn(|c| SpinLock::new(SizeClass::empty(c))),
        }
    }
}

static HEAPS: OnceLock<[Heap; config::NUM_OF_HEAPS]> = OnceLock::new();

/// Returns the fixed heap array, building it on first call. Never torn
/// down — matches spec.md §3's "initialized lazily on first allocation,
/// never freed", and the teacher's one-shot `PMM` init guard
/// (`kernel/src/memory/pmm.rs`), implemented here with `OnceLock` instead
/// of a hand-rolled flag since this crate is hosted rather than no_std.
fn heaps() -> &'static [Heap; config::NUM_OF_HEAPS] {
    HEAPS.get_or_init(|| {
        log::debug!(
            "hoard_alloc: initializing {} heaps ({} CPU + 1 global), {} classes each",
            config::NUM_OF_HEAPS,
            config::NUM_OF_CPUS,
            config::NUM_OF_CLASSES
        );
        core::array::from_fn(|i| Heap::new(i as HeapId))
    })
}

/// Hashes a thread identifier to a CPU heap index (spec.md §4.4 step 3).
/// Stochastic, not an affinity assignment — any thread may land on any
/// CPU heap, and may also fall through to the global heap via the
/// transfer/eviction paths.
fn hash_to_cpu(thread_id: u64) -> usize {
    (thread_id % config::NUM_OF_CPUS as u64) as usize
}

/// Allocates a small (non-large-path) block of `sz` bytes. `sz` must
/// already have been checked against `config::LARGE_THRESHOLD` by the
/// caller (`lib::allocate`).
pub fn allocate_small(sz: usize) -> Option<NonNull<u8>> {
    let c = os::ceil_log2(sz.max(1)) as usize;
    debug_assert!(c < config::NUM_OF_CLASSES, "class index out of range: {c}");

    let cpu = hash_to_cpu(os::thread_id());
    let heaps = heaps();
    let cpu_heap = &heaps[cpu];

    let mut cpu_class = cpu_heap.classes[c].lock();

    // Fast path (spec.md §4.4 step 4): any non-full member superblock.
    if let Some(sb) = cpu_class.superblocks.find_nonfull() {
        return Some(allocate_from(&mut cpu_class, sb));
    }

    // Transfer / grow path (spec.md §4.4 steps 5-6): both class locks
    // held for the remainder, CPU class first.
    let global_heap = &heaps[config::GLOBAL_HEAP_INDEX];
    let mut global_class = global_heap.classes[c].lock();

    if let Some(sb) = global_class.superblocks.find_nonfull() {
        let sb_ref = unsafe { &mut *sb.as_ptr() };
        let block = sb_ref
            .pop_free()
            .expect("find_nonfull guarantees a free block");
        sb_ref.used_blocks += 1;
        global_class.used_blocks += 1;
        migrate(sb, &mut global_class, &mut cpu_class, cpu_heap.id);
        return Some(block::payload_of(block));
    }

    // Grow path: no spare capacity anywhere, request a fresh superblock.
    let (region, _mapped) = os::map(config::SUPERBLOCK_SIZE).or_else(|| {
        log::warn!("hoard_alloc: OS exhausted mapping a superblock for class {c}");
        None
    })?;
    log::trace!("hoard_alloc: constructing superblock for class {c} on heap {}", cpu_heap.id);
    // SAFETY: `region` is a freshly mapped, exclusively owned
    // `SUPERBLOCK_SIZE` region.
    let sb = unsafe { superblock::construct(region, c) };
    let sb_ref = unsafe { &mut *sb.as_ptr() };
    sb_ref.parent_heap.store(cpu_heap.id, Ordering::Release);
    let block = sb_ref
        .pop_free()
        .expect("a freshly constructed superblock always has at least one block");
    sb_ref.used_blocks += 1;
    cpu_class.used_blocks += 1;
    cpu_class.num_of_blocks += sb_ref.num_of_blocks;
    cpu_class.map_calls += 1;
    cpu_class.superblocks.push_tail(sb);
    cpu_class.superblocks.bubble_toward_head(sb);

    Some(block::payload_of(block))
}

/// Pops a free block from `sb` (a member of `class`'s list with known
/// spare capacity), updates counters, and re-sorts `sb` toward the head
/// since it just got fuller. Used by the fast path only — the transfer
/// and grow paths manage their own superblock separately since `sb`
/// isn't (yet, or ever) resident in `class`'s list at the point they pop.
fn allocate_from(class: &mut SizeClass, sb: NonNull<SuperblockHeader>) -> NonNull<u8> {
    let sb_ref = unsafe { &mut *sb.as_ptr() };
    let block = sb_ref
        .pop_free()
        .expect("find_nonfull guarantees a free block");
    sb_ref.used_blocks += 1;
    class.used_blocks += 1;
    class.superblocks.bubble_toward_head(sb);
    block::payload_of(block)
}

/// Frees a small block previously returned by [`allocate_small`].
pub fn free_small(payload: NonNull<u8>) {
    // SAFETY: `payload` was returned by `allocate_small`, which always
    // hands out a payload immediately preceded by a valid `BlockHeader`.
    let header = unsafe { block::header_of(payload) };
    let sb = unsafe { (*header.as_ptr()).parent_superblock }
        .expect("small block must carry a parent_superblock");
    let c = os::log2_floor(unsafe { (*header.as_ptr()).block_size }) as usize;
    let sb_ref = unsafe { &mut *sb.as_ptr() };

    // Two-step locking (spec.md §4.5 step 4), done as an optimistic
    // read-then-verify loop rather than by holding a superblock-level
    // lock across the class-lock acquisition: `migrate` only ever runs
    // while holding both the source and destination class locks already
    // (see `migrate`), so once we've acquired the class lock for the
    // `parent_heap` we read, a mismatch on re-read means a migration
    // landed in the gap — we drop that lock and retry with the fresh
    // value. This never acquires a class lock while holding any
    // superblock-level lock, keeping the lock order superblock-before-
    // class everywhere (there is no case of the reverse).
    let mut class = loop {
        let heap_id = sb_ref.parent_heap.load(Ordering::Acquire);
        let candidate = heaps()[heap_id as usize].classes[c].lock();
        if sb_ref.parent_heap.load(Ordering::Acquire) == heap_id {
            break candidate;
        }
    };

    sb_ref.push_free(header);
    sb_ref.used_blocks -= 1;
    class.used_blocks -= 1;
    class.superblocks.bubble_toward_tail(sb);

    // Invariant check (spec.md §4.5 step 6): global-heap superblocks are
    // exempt, they're expected to run under the emptiness floor. Reading
    // `parent_heap` here with `Relaxed` is sound: `class` is the lock
    // matching this exact value (just verified above), and `migrate`
    // cannot change it again without first acquiring `class` itself.
    if sb_ref.parent_heap.load(Ordering::Relaxed) != config::GLOBAL_HEAP_INDEX as u8 {
        let s = superblock::capacity_for_class(c);
        let k_floor = class
            .num_of_blocks
            .saturating_sub(config::SLACK_SUPERBLOCKS * s);
        // Compared in floating point, not truncated to `usize` first:
        // truncating `(1.0 - EMPTY_FRACTION) * num_of_blocks` before the
        // comparison can round the threshold down by up to one whole
        // block, so a class sitting exactly at the boundary would fail
        // to trigger eviction even though the invariant is violated
        // (matches `original_source/mtmm.c:377`'s `(float)usedBlocks <
        // (1-F)*numOfBlocks`).
        let f_floor = (1.0 - config::EMPTY_FRACTION) * class.num_of_blocks as f32;

        if class.used_blocks < k_floor && (class.used_blocks as f32) < f_floor {
            // The tail is the emptiest member by sort order (spec.md
            // §4.5's closing rationale) and hence always a sufficient
            // eviction candidate.
            let tail = class
                .superblocks
                .tail
                .expect("a violated invariant implies at least one member superblock");
            let mut global_class = heaps()[config::GLOBAL_HEAP_INDEX].classes[c].lock();
            log::trace!(
                "hoard_alloc: evicting tail superblock of class {c} to global heap \
                 (used={}, num={})",
                class.used_blocks,
                class.num_of_blocks
            );
            migrate(tail, &mut class, &mut global_class, config::GLOBAL_HEAP_INDEX as u8);
        }
    }
}

/// Moves `sb` from `src` to `dst`, both class locks already held by the
/// caller (spec.md §4.6). Installs at `dst`'s head and bubbles toward the
/// tail — freshly migrated superblocks are typically near-empty on
/// either direction of travel, so this settles them close to where
/// they'll end up regardless of which way the migration runs.
///
/// Never takes a superblock-level lock: `src` and `dst` are already held
/// by the caller, and spec.md §5's lock order is superblock-before-class
/// everywhere, so acquiring one here (class-then-superblock) would
/// invert it against `free_small`'s two-step lookup and deadlock. Instead
/// `parent_heap` is a plain atomic that `free_small` reads optimistically
/// and re-verifies once it holds the class lock that value named.
fn migrate(
    sb: NonNull<SuperblockHeader>,
    src: &mut SizeClass,
    dst: &mut SizeClass,
    dst_heap: HeapId,
) {
    src.superblocks.unlink(sb);

    let sb_ref = unsafe { &mut *sb.as_ptr() };
    let (used, cap) = (sb_ref.used_blocks, sb_ref.num_of_blocks);
    src.used_blocks -= used;
    src.num_of_blocks -= cap;

    sb_ref.parent_heap.store(dst_heap, Ordering::Release);

    dst.used_blocks += used;
    dst.num_of_blocks += cap;
    dst.superblocks.push_head(sb);
    dst.superblocks.bubble_toward_tail(sb);
}
