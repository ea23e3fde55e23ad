//! # Page-Table Entry Codec
//!
//! One 32-bit word, two interpretations:
//!
//! | Bits  | [`MappedBits`]   | [`SwappedBits`]        |
//! |-------|------------------|------------------------|
//! | 0‒12  | `frame`          | 0‒4 `swap_type`        |
//! | 13‒14 | unused           | 5‒25 `swap_offset`     |
//! | 15‒27 | `usrnum`         | 26‒27 unused           |
//! | 28    | `dirty`          | `dirty`                |
//! | 29    | `reserved`       | `reserved`             |
//! | 30    | `swapped`        | `swapped`              |
//! | 31    | `present`        | `present`              |
//!
//! The flag bits 28‒31 are shared. Which view applies follows from
//! `present` and `swapped`; see [`EntryState`].

use crate::WalkError;
use bitfield_struct::bitfield;
use kernel_info::paging::{FRAME_FIELD_BITS, SWAP_OFFSET_BITS, SWAP_TYPE_BITS};
use kernel_memory_addresses::FrameNumber;

/// Entry bits as seen for a page resident in RAM, and for non-leaf entries.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MappedBits {
    /// RAM frame holding the page (or the next-level table).
    #[bits(13)]
    pub frame: u32,
    #[bits(2)]
    __: u8,
    /// Free-form user number. The simulator never sets it, and swap-in
    /// writes a fresh entry.
    #[bits(13)]
    pub usrnum: u32,
    /// Page was written since it was mapped. Tracked, never enforced.
    pub dirty: bool,
    /// Entry reserves the page without binding a frame.
    pub reserved: bool,
    pub swapped: bool,
    pub present: bool,
}

/// Entry bits as seen for a page that lives on a swap device.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct SwappedBits {
    /// Swap device slot.
    #[bits(5)]
    pub swap_type: u8,
    /// Frame on the swap device.
    #[bits(21)]
    pub swap_offset: u32,
    #[bits(2)]
    __: u8,
    pub dirty: bool,
    pub reserved: bool,
    pub swapped: bool,
    pub present: bool,
}

/// Decoded meaning of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not present.
    Absent,
    /// Present and resident in RAM.
    Mapped(FrameNumber),
    /// Present and stored on swap device `swap_type` at frame `offset`.
    Swapped { swap_type: u8, offset: u32 },
    /// Present, reserved, bound to no frame.
    Reserved,
}

/// A single 32-bit page-table entry.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PageTableEntry(u32);

fn check_width(field: &'static str, value: u64, bits: u32) -> Result<(), WalkError> {
    if value >> bits == 0 {
        Ok(())
    } else {
        Err(WalkError::FieldOverflow { field, value })
    }
}

impl PageTableEntry {
    /// The all-zero (absent) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn mapped_bits(self) -> MappedBits {
        MappedBits::from_bits(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn swapped_bits(self) -> SwappedBits {
        SwappedBits::from_bits(self.0)
    }

    /// A leaf mapping `frame`.
    ///
    /// # Errors
    /// [`WalkError::FieldOverflow`] if the frame number needs more than
    /// 13 bits.
    pub fn mapped(frame: FrameNumber) -> Result<Self, WalkError> {
        Self::zero().with_frame(frame)
    }

    /// A non-leaf entry pointing at the table stored in `frame`.
    ///
    /// # Errors
    /// [`WalkError::FieldOverflow`] if the frame number needs more than
    /// 13 bits.
    pub fn table(frame: FrameNumber) -> Result<Self, WalkError> {
        Self::mapped(frame)
    }

    /// A leaf pointing at frame `offset` of swap device `swap_type`.
    ///
    /// # Errors
    /// [`WalkError::FieldOverflow`] if either value is wider than its field.
    pub fn swapped(swap_type: u8, offset: u32) -> Result<Self, WalkError> {
        Self::zero().with_swap_slot(swap_type, offset)
    }

    /// A present, reserved leaf that binds no frame.
    #[must_use]
    pub const fn reserved() -> Self {
        Self(
            MappedBits::new()
                .with_present(true)
                .with_reserved(true)
                .into_bits(),
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.mapped_bits().present()
    }

    #[inline]
    #[must_use]
    pub const fn is_swapped(self) -> bool {
        self.mapped_bits().swapped()
    }

    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.mapped_bits().reserved()
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        self.mapped_bits().dirty()
    }

    #[must_use]
    pub const fn state(self) -> EntryState {
        let bits = self.mapped_bits();
        if !bits.present() {
            EntryState::Absent
        } else if bits.swapped() {
            let swap = self.swapped_bits();
            EntryState::Swapped {
                swap_type: swap.swap_type(),
                offset: swap.swap_offset(),
            }
        } else if bits.reserved() {
            EntryState::Reserved
        } else {
            EntryState::Mapped(FrameNumber::new(bits.frame()))
        }
    }

    /// The RAM frame if the entry is a resident mapping.
    #[must_use]
    pub const fn frame(self) -> Option<FrameNumber> {
        match self.state() {
            EntryState::Mapped(frame) => Some(frame),
            _ => None,
        }
    }

    /// Frame field read as a next-level table pointer.
    ///
    /// Non-leaf entries are only checked for presence.
    #[inline]
    #[must_use]
    pub const fn table_frame(self) -> FrameNumber {
        FrameNumber::new(self.mapped_bits().frame())
    }

    /// Mark present and resident in `frame`; clears the swapped and reserved
    /// bits and keeps `dirty`.
    ///
    /// # Errors
    /// [`WalkError::FieldOverflow`] if the frame number needs more than
    /// 13 bits.
    pub fn with_frame(self, frame: FrameNumber) -> Result<Self, WalkError> {
        check_width("frame", u64::from(frame.as_u32()), FRAME_FIELD_BITS)?;
        let bits = self
            .mapped_bits()
            .with_present(true)
            .with_swapped(false)
            .with_reserved(false)
            .with_frame(frame.as_u32());
        Ok(Self(bits.into_bits()))
    }

    /// Mark present and swapped out to `(swap_type, offset)`; clears `dirty`.
    ///
    /// # Errors
    /// [`WalkError::FieldOverflow`] if either value is wider than its field.
    pub fn with_swap_slot(self, swap_type: u8, offset: u32) -> Result<Self, WalkError> {
        check_width("swap type", u64::from(swap_type), SWAP_TYPE_BITS)?;
        check_width("swap offset", u64::from(offset), SWAP_OFFSET_BITS)?;
        let bits = self
            .swapped_bits()
            .with_present(true)
            .with_swapped(true)
            .with_dirty(false)
            .with_swap_type(swap_type)
            .with_swap_offset(offset);
        Ok(Self(bits.into_bits()))
    }

    #[must_use]
    pub const fn with_dirty(self, dirty: bool) -> Self {
        Self(self.mapped_bits().with_dirty(dirty).into_bits())
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PTE(0x{:08X}, {:?})", self.0, self.state())
    }
}

impl From<u32> for PageTableEntry {
    #[inline]
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<PageTableEntry> for u32 {
    #[inline]
    fn from(entry: PageTableEntry) -> Self {
        entry.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_layout() {
        let e = PageTableEntry::mapped(FrameNumber::new(0x1ABC)).unwrap();
        assert_eq!(e.raw(), 0x8000_1ABC);
        assert_eq!(e.state(), EntryState::Mapped(FrameNumber::new(0x1ABC)));
        assert_eq!(e.frame(), Some(FrameNumber::new(0x1ABC)));
    }

    #[test]
    fn swapped_layout() {
        let e = PageTableEntry::swapped(3, 0x15).unwrap();
        // present | swapped | offset << 5 | type
        assert_eq!(e.raw(), 0xC000_0000 | (0x15 << 5) | 3);
        assert_eq!(
            e.state(),
            EntryState::Swapped {
                swap_type: 3,
                offset: 0x15
            }
        );
        assert_eq!(e.frame(), None);
    }

    #[test]
    fn usrnum_occupies_bits_15_to_27() {
        let bits = MappedBits::new().with_usrnum(0x1FFF);
        assert_eq!(bits.into_bits(), 0x1FFF << 15);
        assert_eq!(PageTableEntry::from_raw(bits.into_bits()).state(), EntryState::Absent);
    }

    #[test]
    fn swap_slot_clears_dirty_and_frame_rebinds() {
        let e = PageTableEntry::mapped(FrameNumber::new(4))
            .unwrap()
            .with_dirty(true);
        assert!(e.is_dirty());

        let out = e.with_swap_slot(0, 12).unwrap();
        assert!(!out.is_dirty());
        assert!(out.is_swapped());

        let back = out.with_frame(FrameNumber::new(5)).unwrap();
        assert_eq!(back.state(), EntryState::Mapped(FrameNumber::new(5)));
        assert!(!back.is_swapped());
    }

    #[test]
    fn reserved_entry_is_present_but_maps_nothing() {
        let e = PageTableEntry::reserved();
        assert!(e.is_present());
        assert_eq!(e.state(), EntryState::Reserved);
        assert_eq!(e.frame(), None);

        let bound = e.with_frame(FrameNumber::new(1)).unwrap();
        assert_eq!(bound.state(), EntryState::Mapped(FrameNumber::new(1)));
    }

    #[test]
    fn oversized_fields_are_rejected() {
        assert_eq!(
            PageTableEntry::mapped(FrameNumber::new(1 << 13)),
            Err(WalkError::FieldOverflow {
                field: "frame",
                value: 1 << 13
            })
        );
        assert!(PageTableEntry::swapped(32, 0).is_err());
        assert!(PageTableEntry::swapped(0, 1 << 21).is_err());
    }

    #[test]
    fn absent_regardless_of_other_bits() {
        let e = PageTableEntry::from_raw(0x7FFF_FFFF);
        assert_eq!(e.state(), EntryState::Absent);
    }
}
