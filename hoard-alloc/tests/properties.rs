// =============================================================================
// hoard-alloc — Property Tests (spec.md §8, invariants 4-8)
// =============================================================================
//
// Randomized allocate/free sequences checked against the public-API-
// observable invariants. Invariants (1)-(3), which need internal heap
// and superblock state, are checked deterministically instead in
// `memory::heap::tests::concurrent_stress_preserves_invariants` and the
// size-class unit tests — proptest's value here is fuzzing the sizes and
// orderings a human wouldn't think to try, not re-deriving internal
// bookkeeping from outside the crate.
// =============================================================================

use proptest::prelude::*;

use hoard_alloc::{allocate, free, resize};

proptest! {
    /// Invariant 5: distinct outstanding allocations never overlap, for
    /// any batch of random sizes.
    #[test]
    fn distinct_allocations_never_overlap(sizes in prop::collection::vec(1usize..8192, 1..40)) {
        let ptrs: Vec<_> = sizes.iter().map(|&sz| allocate(sz).unwrap()).collect();

        for i in 0..ptrs.len() {
            for j in (i + 1)..ptrs.len() {
                let (a, a_sz) = (ptrs[i].as_ptr() as usize, sizes[i]);
                let (b, b_sz) = (ptrs[j].as_ptr() as usize, sizes[j]);
                let overlap = a < b + b_sz && b < a + a_sz;
                prop_assert!(!overlap);
            }
        }

        for p in ptrs {
            free(Some(p));
        }
    }

    /// Invariant 4: every returned block's header size is either an
    /// exact power-of-two class payload or the precise large-path size.
    #[test]
    fn block_size_matches_class_or_large_request(sz in 1usize..200_000) {
        let p = allocate(sz).unwrap();
        let header = unsafe { hoard_alloc::memory::block::header_of(p) };
        let recorded = unsafe { (*header.as_ptr()).block_size };

        if sz > hoard_alloc::config::LARGE_THRESHOLD {
            prop_assert_eq!(recorded, sz);
        } else {
            prop_assert!(recorded.is_power_of_two());
            prop_assert!(recorded >= sz);
        }
        free(Some(p));
    }

    /// Invariant 6: an arbitrary byte pattern written into a live region
    /// is recoverable until freed, regardless of size.
    #[test]
    fn write_then_read_idempotence(sz in 1usize..65536, seed in any::<u8>()) {
        let p = allocate(sz).unwrap();
        unsafe { core::ptr::write_bytes(p.as_ptr(), seed, sz) };
        let bytes = unsafe { core::slice::from_raw_parts(p.as_ptr(), sz) };
        prop_assert!(bytes.iter().all(|&b| b == seed));
        free(Some(p));
    }

    /// Invariant 8: resize preserves exactly `min(old_payload, sz)` bytes
    /// of the original content, for arbitrary old/new size pairs.
    #[test]
    fn resize_preserves_prefix(old_sz in 1usize..8192, new_sz in 1usize..8192, seed in any::<u8>()) {
        let p = allocate(old_sz).unwrap();
        unsafe { core::ptr::write_bytes(p.as_ptr(), seed, old_sz) };

        let resized = resize(Some(p), new_sz).unwrap();
        let prefix_len = old_sz.min(new_sz);
        let bytes = unsafe { core::slice::from_raw_parts(resized.as_ptr(), prefix_len) };
        prop_assert!(bytes.iter().all(|&b| b == seed));

        free(Some(resized));
    }
}
