//! # Paging Geometry

use kernel_memory_addresses::{PAGE_SHIFT, PAGE_SIZE};

/// Size of one page-table entry in bytes.
pub const ENTRY_SIZE: u64 = 4;

/// Entries held by one table of the five-level hierarchy.
pub const ENTRIES_PER_TABLE: u64 = 512;

/// Entries held by the single root table of the flat strategy.
///
/// The flat table fills its frame with entries; it is not limited to the
/// nine index bits of the hierarchical levels.
pub const FLAT_ENTRIES: u64 = PAGE_SIZE / ENTRY_SIZE;

/// Number of index bits per hierarchy level.
pub const LEVEL_INDEX_BITS: u32 = 9;

/// Number of levels in the hierarchy.
pub const LEVELS: usize = 5;

/// Right-shift applied to a virtual address to obtain each level index,
/// root (PGD) first.
pub const LEVEL_SHIFTS: [u32; LEVELS] = [48, 39, 30, 21, PAGE_SHIFT];

/// Width of the frame-number field of a mapped entry.
pub const FRAME_FIELD_BITS: u32 = 13;

/// Width of the swap-type field of a swapped entry.
pub const SWAP_TYPE_BITS: u32 = 5;

/// Width of the swap-offset field of a swapped entry.
pub const SWAP_OFFSET_BITS: u32 = 21;

const _: () = {
    assert!(ENTRIES_PER_TABLE == 1 << LEVEL_INDEX_BITS);
    assert!(ENTRIES_PER_TABLE * ENTRY_SIZE <= PAGE_SIZE);
    assert!(FLAT_ENTRIES * ENTRY_SIZE == PAGE_SIZE);
    assert!(LEVEL_SHIFTS[LEVELS - 1] == PAGE_SHIFT);
    assert!(LEVEL_SHIFTS[0] == PAGE_SHIFT + LEVEL_INDEX_BITS * 4);
};
