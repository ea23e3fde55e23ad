//! # Simulated Physical Memory
//!
//! A [`MemoryDevice`] is a fixed-size byte store carved into page-sized
//! frames. It backs both RAM and swap devices of the simulator; page tables,
//! page contents and swapped-out pages all live in its bytes.
//!
//! ## Frame Bookkeeping
//!
//! Free frames sit on a LIFO stack. [`MemoryDevice::format`] fills the stack
//! so that frame 0 is handed out first, then frame 1, and so on. Every frame
//! is either on the free stack or flagged in use, never both; releasing a
//! frame that is not in use is rejected instead of corrupting the stack.
//!
//! ## Access Modes
//!
//! * [`AccessMode::Random`]: bytes are indexed directly.
//! * [`AccessMode::Sequential`]: the device behaves like a tape. Every access
//!   rewinds the cursor to 0 and steps it to the target one slot at a time,
//!   so an access costs time proportional to the address.
//!
//! Both modes observe the same contents; only the cost differs.
//!
//! ## Sharing
//!
//! Simulated CPUs share devices through [`SharedDevice`], a reference-counted
//! [`TicketMutex`](kernel_sync::TicketMutex). Multi-step operations hold the
//! lock for their whole duration.
//!
//! ```rust
//! # use kernel_memphy::*;
//! # use kernel_memory_addresses::*;
//! let mut ram = MemoryDevice::new(4 * PAGE_SIZE, AccessMode::Random)?;
//! let frame = ram.acquire_frame()?;
//! assert_eq!(frame, FrameNumber::new(0));
//!
//! ram.write(frame.base() + 8, 0x5A)?;
//! assert_eq!(ram.read(frame.base() + 8)?, 0x5A);
//!
//! ram.release_frame(frame)?;
//! assert_eq!(ram.free_frames(), 4);
//! # Ok::<(), DeviceError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod device;
mod dump;

pub use device::{AccessMode, MemoryDevice};
pub use dump::Dump;

use alloc::sync::Arc;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};
use kernel_sync::TicketMutex;

/// A memory device shared between simulated CPUs.
pub type SharedDevice = Arc<TicketMutex<MemoryDevice>>;

/// Wrap a device for sharing.
#[must_use]
pub fn share(device: MemoryDevice) -> SharedDevice {
    Arc::new(TicketMutex::new(device))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("address {0} lies outside the device")]
    AddressOutOfRange(PhysicalAddress),
    #[error("no free frame left on the device")]
    OutOfFrames,
    #[error("device capacity does not hold a single frame")]
    NoFrames,
    #[error("frame {0} is not in use")]
    FrameNotInUse(FrameNumber),
    #[error("frame {0} lies outside the device")]
    FrameOutOfRange(FrameNumber),
}
