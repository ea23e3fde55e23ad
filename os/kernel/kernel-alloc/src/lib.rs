//! # Frame Allocation and Page Mapping
//!
//! Glue between a [`MemoryDevice`](kernel_memphy::MemoryDevice) that owns
//! frames and an [`AddressSpace`](kernel_vmem::AddressSpace) that maps
//! pages onto them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    map_range                        │
//! │    • all-or-nothing                                 │
//! │    • journaled table writes                         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                    map_pages                        │
//! │    • binds frame i to page start + i                │
//! │    • appends pages to the FIFO replacement queue    │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                    FrameList                        │
//! │    • frames from one allocation                     │
//! │    • released in reverse acquisition order          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Semantics
//!
//! [`map_range`] either maps every requested page or leaves the device
//! exactly as it found it:
//!
//! 1. Allocate all data frames. If the device runs short, return the frames
//!    that were obtained and fail.
//! 2. Map page by page through a journaled
//!    [`TableMemory`](kernel_vmem::TableMemory). If a mapping fails (usually
//!    because a new table needs a frame that is not there), undo every table
//!    write, release every table frame, drop the pages queued for
//!    replacement and release the data frames.
//!
//! Because frames go back in reverse order, the free stack of the device is
//! restored exactly and the next allocation sees the same frames again.
//!
//! The caller holds the device for the whole call.
//!
//! ```rust
//! # use std::collections::VecDeque;
//! # use kernel_alloc::*;
//! # use kernel_memphy::MemoryDevice;
//! # use kernel_memory_addresses::*;
//! # use kernel_vmem::*;
//! let mut ram = MemoryDevice::with_frames(16).unwrap();
//! let stats = PagingStats::new();
//! let space = AddressSpace::create(&mut TableMemory::new(&mut ram, &stats), PagingMode::Flat).unwrap();
//! let mut fifo = VecDeque::new();
//!
//! let region = map_range(&space, &mut ram, &stats, &mut fifo, VirtualAddress::zero(), 3).unwrap();
//! assert_eq!(region, MemoryRegion::new(0, 3 * PAGE_SIZE));
//! assert_eq!(fifo.len(), 3);
//!
//! let err = map_range(&space, &mut ram, &stats, &mut fifo, region.end(), 40).unwrap_err();
//! assert!(matches!(err, MapError::ShortAllocation { wanted: 40, got: 12 }));
//! assert_eq!(ram.free_frames(), 12);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod frame_list;
mod mapper;
mod region;

pub use crate::frame_list::FrameList;
pub use crate::mapper::{allocate_frames, map_pages, map_range, release_frame_list};
pub use crate::region::MemoryRegion;

use kernel_memphy::DeviceError;
use kernel_vmem::WalkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("only {got} of {wanted} frames available")]
    ShortAllocation { wanted: usize, got: usize },
    #[error("mapping stopped after {mapped} pages")]
    Partial {
        mapped: usize,
        #[source]
        source: WalkError,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl MapError {
    /// The walk error that ended a partial mapping, if any.
    #[must_use]
    pub const fn walk_error(&self) -> Option<WalkError> {
        match self {
            Self::Partial { source, .. } => Some(*source),
            _ => None,
        }
    }
}
