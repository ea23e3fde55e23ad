//! # Simulated Page Tables
//!
//! Page tables for the simulator live *inside* a simulated
//! [`MemoryDevice`](kernel_memphy::MemoryDevice). Every table is one frame of
//! that device, every entry is four bytes of it, and walking the hierarchy
//! means reading those bytes back. There are no host-side table objects.
//!
//! ## What you get
//! - [`PageTableEntry`]: the 32-bit entry codec with its *mapped* and
//!   *swapped* bit views ([`MappedBits`], [`SwappedBits`]).
//! - [`TableIndices`]: decomposition of an address or page number into the
//!   five level indices.
//! - [`PageWalker`] with two strategies, [`FiveLevel`] and [`Flat`], selected
//!   once through [`PagingMode`].
//! - [`TableMemory`]: typed entry access over a device, including lazy table
//!   creation and an optional [`Journal`] for undoing a failed transaction.
//! - [`AddressSpace`]: one process' root table with map, swap, query and
//!   translate operations.
//! - [`PagingStats`]: process-wide counters.
//!
//! ## Five-Level Walk
//!
//! Each virtual address is divided into five 9-bit indices and a 12-bit
//! offset:
//!
//! ```text
//! | 56‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PGD  |  P4D  |  PUD  |  PMD  |   PT  | Offset |
//! ```
//!
//! ```text
//!  PGD  →  P4D  →  PUD  →  PMD  →  PT  →  Frame
//!   │       │       │       │       │
//!   │       │       │       │       └───► leaf entry: mapped / swapped / reserved
//!   │       │       │       └───────────► present + frame of the PT
//!   │       │       └───────────────────► present + frame of the PMD
//!   │       └───────────────────────────► present + frame of the PUD
//!   └───────────────────────────────────► present + frame of the P4D
//! ```
//!
//! | Level | Table | Index bits | Notes |
//! |:------|:------|:-----------|:------|
//! | 1 | **PGD** | 56‒48 | Root; allocated when the address space is created. |
//! | 2 | **P4D** | 47‒39 | Created on first use. |
//! | 3 | **PUD** | 38‒30 | Created on first use. |
//! | 4 | **PMD** | 29‒21 | Created on first use. |
//! | 5 | **PT**  | 20‒12 | Holds the leaf entries. |
//!
//! Non-leaf entries use the same 32-bit format as leaves; only the present
//! bit and the frame field are meaningful. A table slot holds four bytes, so
//! a 512-entry table uses the first half of its frame.
//!
//! Tables created during a walk are zeroed before they are linked, and each
//! one adds a page to [`pt_bytes`](StatsSnapshot::pt_bytes).
//!
//! ## Flat Walk
//!
//! The flat strategy indexes the root frame directly by page number. It holds
//! [`FLAT_ENTRIES`](kernel_info::paging::FLAT_ENTRIES) leaves and never
//! allocates further tables; pages beyond that range are rejected.
//!
//! ```rust
//! # use kernel_memphy::MemoryDevice;
//! # use kernel_memory_addresses::*;
//! # use kernel_vmem::*;
//! let mut ram = MemoryDevice::with_frames(16).unwrap();
//! let stats = PagingStats::new();
//! let mut tables = TableMemory::new(&mut ram, &stats);
//!
//! let space = AddressSpace::create(&mut tables, PagingMode::FiveLevel).unwrap();
//! space.set_mapped(&mut tables, PageNumber::new(2), FrameNumber::new(9)).unwrap();
//!
//! let pa = space.translate(&mut tables, VirtualAddress::new(2 * PAGE_SIZE + 5)).unwrap();
//! assert_eq!(pa, FrameNumber::new(9).base() + 5);
//! // root + P4D + PUD + PMD + PT
//! assert_eq!(stats.snapshot().pt_bytes, 5 * PAGE_SIZE);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

extern crate alloc;

pub mod address_space;
mod entry;
mod indices;
mod journal;
mod stats;
mod table_memory;
mod walker;

pub use crate::address_space::AddressSpace;
pub use crate::entry::{EntryState, MappedBits, PageTableEntry, SwappedBits};
pub use crate::indices::TableIndices;
pub use crate::journal::Journal;
pub use crate::stats::{PagingStats, StatsSnapshot};
pub use crate::table_memory::TableMemory;
pub use crate::walker::{FiveLevel, Flat, PageWalker, PagingMode};

/// Re-export of the paging geometry.
pub use kernel_info::paging as info;

use kernel_memory_addresses::PageNumber;
use kernel_memphy::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A level of the walk is absent, or the leaf does not map a frame.
    #[error("no translation present")]
    TranslationMiss,
    #[error("page {0} is outside the range of the flat table")]
    PageOutOfRange(PageNumber),
    #[error("value {value:#x} does not fit the {field} field of an entry")]
    FieldOverflow { field: &'static str, value: u64 },
}
