//! # Simulated Memory Address Types
//!
//! Strongly typed wrappers for the raw numbers flowing through the paging
//! simulator: virtual addresses issued by processes, the page numbers derived
//! from them, frame numbers handed out by a memory device, and byte addresses
//! inside a device ("physical" addresses).
//!
//! ## Overview
//!
//! | Type | Wraps | Meaning |
//! |------|-------|---------|
//! | [`VirtualAddress`] | `u64` | Address in a process' virtual address space. |
//! | [`PageNumber`] | `u64` | Virtual address shifted right by [`PAGE_SHIFT`]. |
//! | [`FrameNumber`] | `u32` | Index of a page-sized frame on a memory device. |
//! | [`PhysicalAddress`] | `u64` | Byte offset into a memory device. |
//!
//! All conversions between the kinds are explicit, which keeps a page number
//! from being used where a byte address is expected (and vice versa).
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x1234);
//! let (page, offset) = va.split();
//! assert_eq!(page, PageNumber::new(1));
//! assert_eq!(offset, 0x234);
//! assert_eq!(page.join(offset), va);
//!
//! let frame = FrameNumber::new(3);
//! assert_eq!(frame.base().as_u64(), 3 * PAGE_SIZE);
//! assert_eq!(frame.base().frame(), frame);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_number;
mod page_number;
mod physical_address;
mod virtual_address;

pub use crate::frame_number::FrameNumber;
pub use crate::page_number::PageNumber;
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Size of a page (and of a frame) in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`, i.e. the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits of an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_page_and_frame_agree() {
        let va = VirtualAddress::new(5 * PAGE_SIZE + 17);
        assert_eq!(va.page(), PageNumber::new(5));
        assert_eq!(va.offset(), 17);

        let pa = FrameNumber::new(9).base() + va.offset();
        assert_eq!(pa.frame(), FrameNumber::new(9));
        assert_eq!(pa.offset(), 17);
    }
}
