use crate::{PAGE_SHIFT, VirtualAddress};
use core::fmt;
use core::ops::Add;

/// Virtual page number.
///
/// The page containing virtual address `va` is `va >> PAGE_SHIFT`. Page
/// numbers are what the page-table walker indexes by; a page number and the
/// base address of that page decompose into the same table indices.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = PageNumber::new(3);
/// assert_eq!(page.base(), VirtualAddress::new(3 * PAGE_SIZE));
/// assert_eq!(page + 2, PageNumber::new(5));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageNumber(u64);

impl PageNumber {
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

    /// First virtual address of this page.
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0 << PAGE_SHIFT)
    }

    /// Combine with an in-page offset into a full address.
    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> VirtualAddress {
        VirtualAddress::new((self.0 << PAGE_SHIFT) + offset)
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u64> for PageNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}
