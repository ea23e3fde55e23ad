//! # Device Lock Primitives
//!
//! A lock-type-parameterized [`Mutex<T, R>`] and two raw lock strategies:
//!
//! * [`RawTicket`]: fair ticket lock. Waiters are served in arrival order, so
//!   no simulated CPU starves while another hammers the same device.
//! * [`RawSpin`]: test-and-test-and-set spin lock for short critical sections
//!   such as swapping the active device selection.
//!
//! ```rust
//! # use kernel_sync::TicketMutex;
//! let device = TicketMutex::new([0u8; 16]);
//! device.lock()[3] = 0xAB;
//! assert_eq!(device.with_lock(|bytes| bytes[3]), 0xAB);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod raw_spin;
mod raw_ticket;

pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use raw_ticket::RawTicket;

/// Mutex backed by [`RawSpin`].
pub type SpinMutex<T> = Mutex<T, RawSpin>;

/// Mutex backed by [`RawTicket`].
pub type TicketMutex<T> = Mutex<T, RawTicket>;

impl<T> SpinMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T> TicketMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

/// Acquire side of a raw lock.
pub trait RawLock {
    /// Block until the lock is held by the caller.
    fn raw_lock(&self);

    /// Take the lock if it is free; never blocks.
    fn raw_try_lock(&self) -> bool;
}

/// Release side of a raw lock.
pub trait RawUnlock {
    /// Release the lock.
    ///
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
