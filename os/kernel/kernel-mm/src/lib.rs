//! # Process Memory Management
//!
//! Ties the lower layers together into the memory system a simulated kernel
//! talks to:
//!
//! - [`MmContext`]: one per process. Owns the page-table root, the virtual
//!   memory areas, the symbol table and the resident-page FIFO.
//! - [`MemorySystem`]: shared by every simulated CPU. Owns the RAM device,
//!   up to four swap devices (one active) and the paging counters.
//!
//! ## Growth
//!
//! Areas only ever grow at their break. [`MemorySystem::grow`] rounds the
//! request up to whole pages, checks the new region against every area of
//! the context and maps it in one all-or-nothing transaction.
//!
//! ```rust
//! # use kernel_memphy::{MemoryDevice, share};
//! # use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
//! # use kernel_vmem::PagingMode;
//! # use kernel_mm::MemorySystem;
//! let ram = share(MemoryDevice::with_frames(32).unwrap());
//! let system = MemorySystem::new(ram, PagingMode::FiveLevel);
//! let mut ctx = system.create_context().unwrap();
//!
//! let region = system.grow(&mut ctx, 0, 300).unwrap();
//! assert_eq!(region.len(), PAGE_SIZE);
//! assert_eq!(ctx.find_vma(0).unwrap().sbrk(), VirtualAddress::new(PAGE_SIZE));
//!
//! system.write_virtual(&mut ctx, VirtualAddress::new(10), 0xAB).unwrap();
//! assert_eq!(system.read_virtual(&mut ctx, VirtualAddress::new(10)).unwrap(), 0xAB);
//! ```
//!
//! ## Swapping
//!
//! Pages leave RAM oldest-first. A read or write that lands on a swapped
//! page counts a fault, brings the page back (evicting the oldest resident
//! page of the same process if RAM is full) and carries on.
//!
//! ## Locking
//!
//! Every device sits behind its own ticket lock. RAM is always locked
//! before a swap device, and at most one swap device is held at a time.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod area;
mod context;
mod swap;
mod system;

pub use crate::area::VirtualMemoryArea;
pub use crate::context::MmContext;
pub use crate::swap::{SwapSlot, copy_page};
pub use crate::system::MemorySystem;

pub use kernel_alloc::MemoryRegion;

use kernel_alloc::MapError;
use kernel_memory_addresses::{FrameNumber, PageNumber, PhysicalAddress};
use kernel_memphy::DeviceError;
use kernel_vmem::WalkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MmError {
    #[error("no swap device in that slot")]
    DeviceUnavailable,
    #[error("out of frames")]
    OutOfFrames,
    #[error("no translation present")]
    TranslationMiss,
    #[error("invalid range [{start:#x}, {end:#x})")]
    InvalidRange { start: u64, end: u64 },
    #[error("region overlaps area {0}")]
    OverlapDetected(MemoryRegion),
    #[error("no area with id {0}")]
    VmaNotFound(usize),
    #[error("address {0} lies outside the device")]
    AddressOutOfRange(PhysicalAddress),
    #[error("frame {0} is not in use")]
    FrameNotInUse(FrameNumber),
    #[error("frame {0} lies outside the device")]
    FrameOutOfRange(FrameNumber),
    #[error("device capacity does not hold a single frame")]
    NoFrames,
    #[error("page {0} is outside the range of the flat table")]
    PageOutOfRange(PageNumber),
    #[error("value {value:#x} does not fit the {field} field of an entry")]
    FieldOverflow { field: &'static str, value: u64 },
    #[error("the RAM device cannot double as a swap device")]
    SwapAliasesRam,
    #[error("symbol index {0} is out of range")]
    SymbolOutOfRange(usize),
}

impl From<DeviceError> for MmError {
    fn from(value: DeviceError) -> Self {
        match value {
            DeviceError::AddressOutOfRange(addr) => Self::AddressOutOfRange(addr),
            DeviceError::OutOfFrames => Self::OutOfFrames,
            DeviceError::NoFrames => Self::NoFrames,
            DeviceError::FrameNotInUse(frame) => Self::FrameNotInUse(frame),
            DeviceError::FrameOutOfRange(frame) => Self::FrameOutOfRange(frame),
        }
    }
}

impl From<WalkError> for MmError {
    fn from(value: WalkError) -> Self {
        match value {
            WalkError::Device(e) => e.into(),
            WalkError::TranslationMiss => Self::TranslationMiss,
            WalkError::PageOutOfRange(page) => Self::PageOutOfRange(page),
            WalkError::FieldOverflow { field, value } => Self::FieldOverflow { field, value },
        }
    }
}

impl From<MapError> for MmError {
    fn from(value: MapError) -> Self {
        match value {
            MapError::ShortAllocation { .. } => Self::OutOfFrames,
            MapError::Partial { source, .. } => source.into(),
            MapError::Device(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_errors_flatten_into_the_taxonomy() {
        assert_eq!(
            MmError::from(MapError::ShortAllocation { wanted: 4, got: 1 }),
            MmError::OutOfFrames
        );
        assert_eq!(
            MmError::from(MapError::Partial {
                mapped: 3,
                source: WalkError::Device(DeviceError::OutOfFrames),
            }),
            MmError::OutOfFrames
        );
        assert_eq!(
            MmError::from(WalkError::PageOutOfRange(PageNumber::new(2048))),
            MmError::PageOutOfRange(PageNumber::new(2048))
        );
        assert_eq!(
            MmError::from(DeviceError::FrameNotInUse(FrameNumber::new(3))),
            MmError::FrameNotInUse(FrameNumber::new(3))
        );
    }
}
