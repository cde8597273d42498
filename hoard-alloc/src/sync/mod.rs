//! Synchronization primitives.
//!
//! Every per-(heap, size class) mutex and every per-superblock mutex in
//! this crate is a [`spinlock::SpinLock`]. See that module for the
//! lock-acquisition order the rest of the crate must follow.

pub mod spinlock;
