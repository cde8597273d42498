// =============================================================================
// hoard-alloc — Ticket Spinlock
// =============================================================================
//
// A ticket spinlock provides mutual exclusion across threads. It's the
// simplest fair lock: threads acquire the lock in FIFO order, preventing
// starvation under contention on a size class shared by many threads.
//
// HOW IT WORKS:
//   - Two counters: `next_ticket` and `now_serving`
//   - To lock: atomically increment `next_ticket`, get your ticket number.
//     Spin until `now_serving` equals your ticket.
//   - To unlock: increment `now_serving`, which lets the next waiter proceed.
//
// WHY A SPINLOCK AND NOT std::sync::Mutex?
//   Every critical section this crate protects (a free-list pop/push, a
//   handful of counter updates, a list splice) is short and bounded —
//   exactly the case where spinning beats parking a thread. It also
//   keeps every lock a `const fn` value usable directly in the heap
//   array's statics, same as the teacher's SpinLock-backed PMM.
//
// This is adapted from the teacher's `sync::spinlock::SpinLock`
// (`kernel/src/sync/spinlock.rs`): identical ticket-counter design and
// `Acquire`/`Release` discipline, with the kernel-only IRQ disable/
// enable bracketing removed — there are no interrupt handlers in this
// library's execution model, so there is nothing to guard against
// re-entering the lock from a handler on the same thread.
// =============================================================================

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

/// A ticket-based spinlock.
///
/// # Type Parameter
/// - `T`: the data protected by the lock. Must be `Send` because
///   ownership effectively transfers between threads when the lock is
///   acquired.
pub struct SpinLock<T> {
    next_ticket: AtomicU32,
    now_serving: AtomicU32,
    data: UnsafeCell<T>,
}

// SAFETY: SpinLock<T> can be shared between threads as long as T itself
// can be sent between threads. The lock ensures only one thread accesses
// T at a time.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new spinlock wrapping `value`, initially unlocked. A
    /// `const fn` so spinlocks can live in `static`s:
    /// `static CLASS_LOCK: SpinLock<()> = SpinLock::new(());`
    pub const fn new(value: T) -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, spinning (busy-waiting) while it is held by
    /// another thread. Returns a guard that releases the lock on drop.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        // Relaxed is fine here — the spin loop below provides the
        // necessary synchronization barrier.
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        // Acquire ordering ensures we see all writes made by the
        // previous lock holder before we access the protected data.
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            core::hint::spin_loop();
        }

        SpinLockGuard { lock: self }
    }

    /// Attempts to acquire the lock without spinning. Returns `None` if
    /// another thread currently holds it.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let current = self.now_serving.load(Ordering::Relaxed);
        let result = self.next_ticket.compare_exchange(
            current,
            current + 1,
            Ordering::Acquire,
            Ordering::Relaxed,
        );

        match result {
            Ok(_) => Some(SpinLockGuard { lock: self }),
            Err(_) => None,
        }
    }

    /// Returns a mutable reference to the underlying data. Safe because
    /// `&mut self` already guarantees exclusive access — no lock needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// RAII guard for a held [`SpinLock`]. The lock is released when the
/// guard is dropped.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard implies exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard implies exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Release ordering ensures all our writes to the protected data
        // are visible to the next lock holder before they see the
        // incremented `now_serving` value.
        self.lock.now_serving.fetch_add(1, Ordering::Release);
    }
}
