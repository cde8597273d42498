// =============================================================================
// hoard-alloc — OS Adapter
// =============================================================================
//
// The three primitives the core heap machinery treats as external
// collaborators (spec §1):
//   - map / unmap       — raw, zero-filled address space from the OS
//   - thread_id         — a stable per-thread identifier, fed into the
//                          CPU-hash function and nothing else
//   - ceil_log2 / log2_floor — base-2 logarithm over non-negative integers
//
// `map`/`unmap` are the hosted equivalent of `original_source/mtmm.c`'s
// `fetch_memory()`, which opened `/dev/zero` and `mmap`'d it
// `MAP_PRIVATE`. Anonymous mappings (`MAP_ANONYMOUS`) are the modern,
// portable replacement for that `/dev/zero` idiom — same contract
// (zero-filled, private, read-write pages), no file descriptor needed.
//
// `thread_id` is the userspace analogue of the teacher's
// `arch::smp::core_id()`: a cheap, stable handle read out of a fixed
// per-execution-context slot. The teacher reads a core index out of a
// GS-relative `CoreLocal`; here the execution context is an OS thread,
// so the identifier comes from a `thread_local!` counter instead of a
// segment register.
// =============================================================================

use core::ptr::NonNull;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counts of [`map`]/[`unmap`] calls, in the same spirit as the
/// teacher's `memory::pmm::MemoryStats` — ambient accounting, not a
/// test-only instrument. Used by this crate's own tests to check for
/// leaked or double-released mappings (spec.md §8 S6), and available to
/// embedders for the same purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsStats {
    pub map_calls: u64,
    pub unmap_calls: u64,
}

static MAP_CALLS: AtomicU64 = AtomicU64::new(0);
static UNMAP_CALLS: AtomicU64 = AtomicU64::new(0);

/// Snapshots the current map/unmap call counts.
pub fn stats() -> OsStats {
    OsStats {
        map_calls: MAP_CALLS.load(Ordering::Relaxed),
        unmap_calls: UNMAP_CALLS.load(Ordering::Relaxed),
    }
}

/// Requests `bytes` of zero-filled, private, read-write address space
/// from the OS. Rounds up to the platform page size; the rounded size is
/// what the caller must pass back to `unmap` (spec §9's map/unmap
/// rounding question — resolved by always rounding here, so callers
/// never have to reason about it themselves).
///
/// Returns `None` on OS-level exhaustion. Never partially maps: either
/// the whole region is obtained or nothing is.
pub fn map(bytes: usize) -> Option<(NonNull<u8>, usize)> {
    let rounded = round_up_to_page(bytes);

    // SAFETY: `mmap` with MAP_ANONYMOUS ignores fd/offset; the returned
    // pointer, on success, is valid for `rounded` bytes and zero-filled
    // by the kernel.
    let ptr = unsafe {
        libc::mmap(
            core::ptr::null_mut(),
            rounded,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        log::warn!("os::map: mmap failed for {rounded} bytes");
        return None;
    }

    MAP_CALLS.fetch_add(1, Ordering::Relaxed);

    // SAFETY: mmap succeeded, so `ptr` is non-null.
    let non_null = unsafe { NonNull::new_unchecked(ptr as *mut u8) };
    Some((non_null, rounded))
}

/// Releases a region previously returned by [`map`]. `bytes` must be the
/// exact rounded size [`map`] returned alongside the pointer.
///
/// # Safety
/// `ptr` must have been returned by a prior call to [`map`] that has not
/// already been unmapped, and `bytes` must match the size from that call.
pub unsafe fn unmap(ptr: NonNull<u8>, bytes: usize) {
    let rc = unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, bytes) };
    if rc != 0 {
        log::error!("os::unmap: munmap failed for {bytes} bytes at {:p}", ptr.as_ptr());
        return;
    }
    UNMAP_CALLS.fetch_add(1, Ordering::Relaxed);
}

fn round_up_to_page(bytes: usize) -> usize {
    let page = page_size();
    (bytes + page - 1) & !(page - 1)
}

fn page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE has no preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 {
        4096
    } else {
        sz as usize
    }
}

// =============================================================================
// Thread identification
// =============================================================================

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_ID: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Returns a stable identifier for the calling thread, assigned lazily
/// and cached for the thread's lifetime. Used only as input to the
/// CPU-hash function (`heap::hash_to_cpu`) — it carries no other meaning
/// and is not related to the OS's own thread id.
pub fn thread_id() -> u64 {
    THREAD_ID.with(|cell| {
        if let Some(id) = cell.get() {
            return id;
        }
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        cell.set(Some(id));
        id
    })
}

// =============================================================================
// Base-2 logarithm
// =============================================================================

/// `floor(log2(x))` for `x >= 1`.
#[inline]
pub fn log2_floor(x: usize) -> u32 {
    debug_assert!(x >= 1);
    usize::BITS - 1 - x.leading_zeros()
}

/// `ceil(log2(x))`, with `x == 0` and `x == 1` both mapping to `0`
/// (spec §4.1: "Class 0 is permitted; implementations must handle sz = 0
/// and sz = 1 without producing a negative or undefined class").
#[inline]
pub fn ceil_log2(x: usize) -> u32 {
    if x <= 1 {
        return 0;
    }
    log2_floor(x - 1) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_log2_boundaries() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
    }

    #[test]
    fn log2_floor_powers_of_two() {
        for c in 0..20u32 {
            assert_eq!(log2_floor(1usize << c), c);
        }
    }

    #[test]
    fn map_unmap_round_trip() {
        let (ptr, size) = map(4096).expect("map should succeed");
        // The mapping must be zero-filled.
        let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), size) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { unmap(ptr, size) };
    }

    #[test]
    fn thread_id_stable_within_thread() {
        let a = thread_id();
        let b = thread_id();
        assert_eq!(a, b);
    }

    #[test]
    fn thread_id_distinct_across_threads() {
        let main_id = thread_id();
        let other_id = std::thread::spawn(thread_id).join().unwrap();
        assert_ne!(main_id, other_id);
    }
}
