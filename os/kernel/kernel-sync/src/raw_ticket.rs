use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Fair FIFO lock: each caller draws a ticket and waits until it is served.
pub struct RawTicket {
    next: AtomicUsize,
    serving: AtomicUsize,
}

impl Default for RawTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTicket {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            serving: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn lock(&self) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        while self.serving.load(Ordering::Acquire) != ticket {
            spin_loop();
        }
    }

    /// Draw a ticket only if it would be served immediately.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let serving = self.serving.load(Ordering::Relaxed);
        self.next
            .compare_exchange(
                serving,
                serving.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// # Safety
    /// The caller must hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        let current = self.serving.load(Ordering::Relaxed);
        self.serving.store(current.wrapping_add(1), Ordering::Release);
    }
}

impl RawLock for RawTicket {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }
}

impl RawUnlock for RawTicket {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}

#[cfg(test)]
mod tests {
    use super::RawTicket;

    #[test]
    fn try_lock_only_takes_a_free_lock() {
        let t = RawTicket::new();
        assert!(t.try_lock());
        assert!(!t.try_lock());
        unsafe { t.unlock() };

        t.lock();
        assert!(!t.try_lock());
        unsafe { t.unlock() };
        assert!(t.try_lock());
        unsafe { t.unlock() };
    }
}
