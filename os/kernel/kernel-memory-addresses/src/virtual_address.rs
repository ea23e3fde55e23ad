use crate::{PAGE_OFFSET_MASK, PAGE_SHIFT, PageNumber};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// Issued by simulated processes and translated through their page tables.
/// Carries intent so virtual and device addresses cannot be mixed up.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(2 * PAGE_SIZE + 7);
/// assert_eq!(va.page(), PageNumber::new(2));
/// assert_eq!(va.offset(), 7);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page containing this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PageNumber {
        PageNumber::new(self.0 >> PAGE_SHIFT)
    }

    /// Byte offset of this address within its page.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0 & PAGE_OFFSET_MASK
    }

    /// Split into (page, in-page offset).
    #[inline]
    #[must_use]
    pub const fn split(self) -> (PageNumber, u64) {
        (self.page(), self.offset())
    }

    /// Returns `true` if the address sits on a page boundary.
    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.offset() == 0
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PageNumber> for VirtualAddress {
    #[inline]
    fn from(page: PageNumber) -> Self {
        page.base()
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
