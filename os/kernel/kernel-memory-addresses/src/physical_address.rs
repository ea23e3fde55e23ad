use crate::{FrameNumber, PAGE_OFFSET_MASK, PAGE_SHIFT};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Byte address on a simulated memory device.
///
/// Page tables, page contents and swap slots all live at physical addresses;
/// like [`VirtualAddress`](super::VirtualAddress), this type carries intent
/// and prevents accidental VA↔PA mix-ups.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(2 * PAGE_SIZE + 0x42);
/// assert_eq!(pa.frame(), FrameNumber::new(2));
/// assert_eq!(pa.offset(), 0x42);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The frame containing this byte.
    ///
    /// Frame numbers are 32 bits wide; device capacities are bounded well
    /// below that by the configuration layer.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn frame(self) -> FrameNumber {
        FrameNumber::new((self.0 >> PAGE_SHIFT) as u32)
    }

    /// Offset of this byte within its frame.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0 & PAGE_OFFSET_MASK
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<FrameNumber> for PhysicalAddress {
    #[inline]
    fn from(frame: FrameNumber) -> Self {
        frame.base()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
