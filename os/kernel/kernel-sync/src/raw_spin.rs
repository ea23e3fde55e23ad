use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Upper bound on the number of `spin_loop` hints between two checks.
const MAX_BACKOFF: u32 = 64;

/// Unfair test-and-test-and-set lock with bounded exponential backoff.
///
/// Meant for selections that are read and swapped in a handful of
/// instructions; anything that touches a whole frame belongs behind a
/// [`RawTicket`](crate::RawTicket).
pub struct RawSpin {
    held: AtomicBool,
}

impl Default for RawSpin {
    fn default() -> Self {
        Self::new()
    }
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn lock(&self) {
        let mut backoff = 1;
        while !self.try_lock() {
            while self.is_locked() {
                for _ in 0..backoff {
                    spin_loop();
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        self.held
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Snapshot of the lock state; stale as soon as it returns.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }

    /// # Safety
    /// The caller must hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl RawLock for RawSpin {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }
}

impl RawUnlock for RawSpin {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}

#[cfg(test)]
mod tests {
    use super::RawSpin;

    #[test]
    fn try_lock_fails_while_held() {
        let s = RawSpin::new();
        s.lock();
        assert!(s.is_locked());
        assert!(!s.try_lock());
        unsafe { s.unlock() };
        assert!(!s.is_locked());
        s.lock();
        unsafe { s.unlock() };
    }
}
