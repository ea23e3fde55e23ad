//! # Device Limits

use crate::paging::{FRAME_FIELD_BITS, SWAP_OFFSET_BITS, SWAP_TYPE_BITS};
use kernel_memory_addresses::PAGE_SIZE;

/// Default RAM capacity when the configuration does not name one.
///
/// This is the largest RAM a 13-bit frame field can address.
pub const DEFAULT_RAM_SIZE: u64 = 0x0200_0000; // 32 MiB

/// Default capacity of swap device 0.
pub const DEFAULT_SWAP0_SIZE: u64 = 0x0100_0000; // 16 MiB

/// Number of swap device slots a memory system carries.
pub const MAX_SWAP_DEVICES: usize = 4;

/// Capacity of the per-process symbol table.
pub const SYMBOL_TABLE_SIZE: usize = 30;

/// Highest number of RAM frames a mapped entry can name.
pub const MAX_RAM_FRAMES: u64 = 1 << FRAME_FIELD_BITS;

/// Largest RAM device that can be fully addressed by page-table entries.
pub const MAX_RAM_SIZE: u64 = MAX_RAM_FRAMES * PAGE_SIZE;

/// Highest number of frames a swapped entry can name on one swap device.
pub const MAX_SWAP_FRAMES: u64 = 1 << SWAP_OFFSET_BITS;

/// Largest swap device that can be fully addressed by page-table entries.
pub const MAX_SWAP_SIZE: u64 = MAX_SWAP_FRAMES * PAGE_SIZE;

const _: () = {
    assert!(DEFAULT_RAM_SIZE <= MAX_RAM_SIZE);
    assert!(DEFAULT_SWAP0_SIZE <= MAX_SWAP_SIZE);
    assert!(DEFAULT_RAM_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(DEFAULT_SWAP0_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(MAX_SWAP_DEVICES <= 1 << SWAP_TYPE_BITS);
};
