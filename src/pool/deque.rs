//! Bounded Chase–Lev work-stealing deque.

use std::ptr;
use std::sync::atomic::{fence, AtomicPtr, AtomicUsize, Ordering};

/// A unit of work owned by the pool.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Ring capacity per worker. A full ring makes `push` fail; the caller falls
/// back to the pool's shared queue.
pub(crate) const QUEUE_CAPACITY: usize = 1024;

/// Single-owner, multi-stealer deque.
///
/// The owning worker pushes and pops at the bottom; other workers steal from
/// the top. `top` and `bottom` are monotonically increasing counters, indexed
/// into the ring modulo the capacity.
///
/// Slot hand-off is an atomic pointer swap: whichever side swaps a slot to
/// null owns the task, which keeps the owner/stealer race on the last element
/// lossless. A task is boxed twice so the ring can hold thin pointers.
///
/// Memory ordering follows the published algorithm: the stealer acquires
/// `top` before reading `bottom`, the owner publishes `bottom` with release,
/// and the owner's pop issues a sequentially consistent fence before
/// re-reading `top`.
pub(crate) struct WorkStealingQueue {
    top: AtomicUsize,
    bottom: AtomicUsize,
    slots: Box<[AtomicPtr<Task>]>,
}

impl WorkStealingQueue {
    pub fn new() -> Self {
        let slots = (0..QUEUE_CAPACITY)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        WorkStealingQueue {
            top: AtomicUsize::new(0),
            bottom: AtomicUsize::new(0),
            slots,
        }
    }

    /// Owner only. Returns the task back when the ring is full.
    pub fn push(&self, task: Task) -> Result<(), Task> {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        if b.wrapping_sub(t) >= QUEUE_CAPACITY {
            return Err(task);
        }

        let cell = Box::into_raw(Box::new(task));
        self.slots[b % QUEUE_CAPACITY].store(cell, Ordering::Release);
        self.bottom.store(b.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Owner only. Takes the most recently pushed task, racing stealers for
    /// the last element.
    pub fn pop(&self) -> Option<Task> {
        let b = self.bottom.load(Ordering::Relaxed);
        if b == 0 {
            return None;
        }
        let b = b - 1;
        self.bottom.store(b, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Relaxed);

        if t <= b {
            let cell = self.slots[b % QUEUE_CAPACITY].swap(ptr::null_mut(), Ordering::AcqRel);
            if t == b {
                // last element: reconcile indices with any concurrent stealer
                let _ = self.top.compare_exchange(
                    t,
                    t.wrapping_add(1),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                );
                self.bottom.store(b.wrapping_add(1), Ordering::Relaxed);
            }
            if cell.is_null() {
                // a stealer swapped the slot first
                return None;
            }
            // SAFETY: the pointer came from `Box::into_raw` in `push`, and
            // the swap above made this thread its sole owner.
            Some(*unsafe { Box::from_raw(cell) })
        } else {
            self.bottom.store(b.wrapping_add(1), Ordering::Relaxed);
            None
        }
    }

    /// Any thread. Takes the oldest task, if one can be claimed.
    pub fn steal(&self) -> Option<Task> {
        let t = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let b = self.bottom.load(Ordering::Acquire);

        if t < b {
            if self
                .top
                .compare_exchange(t, t.wrapping_add(1), Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                return None;
            }
            let cell = self.slots[t % QUEUE_CAPACITY].swap(ptr::null_mut(), Ordering::AcqRel);
            if cell.is_null() {
                // the owner claimed the slot in the last-element race
                return None;
            }
            // SAFETY: as in `pop`, the swap transferred sole ownership.
            Some(*unsafe { Box::from_raw(cell) })
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        t >= b
    }
}

impl Drop for WorkStealingQueue {
    fn drop(&mut self) {
        // free tasks that were never claimed
        for slot in self.slots.iter() {
            let cell = slot.swap(ptr::null_mut(), Ordering::Relaxed);
            if !cell.is_null() {
                // SAFETY: unclaimed pointers still carry the ownership
                // handed over by `push`.
                drop(unsafe { Box::from_raw(cell) });
            }
        }
    }
}
