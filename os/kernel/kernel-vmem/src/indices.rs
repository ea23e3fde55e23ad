use kernel_info::paging::{LEVEL_SHIFTS, LEVELS};
use kernel_memory_addresses::{PageNumber, VirtualAddress};

const INDEX_MASK: u64 = 0x1FF;

/// The five level indices of a virtual address, root first.
///
/// A page number and the base address of that page decompose identically.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// # use kernel_vmem::TableIndices;
/// let va = VirtualAddress::new((1 << 48) | (2 << 39) | (3 << 30) | (4 << 21) | (5 << 12) | 0x7FF);
/// let idx = TableIndices::of_address(va);
/// assert_eq!((idx.pgd(), idx.p4d(), idx.pud(), idx.pmd(), idx.pt()), (1, 2, 3, 4, 5));
/// assert_eq!(TableIndices::of_page(va.page()), idx);
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TableIndices([u16; LEVELS]);

impl TableIndices {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of_address(va: VirtualAddress) -> Self {
        let raw = va.as_u64();
        let mut out = [0u16; LEVELS];
        let mut level = 0;
        while level < LEVELS {
            out[level] = ((raw >> LEVEL_SHIFTS[level]) & INDEX_MASK) as u16;
            level += 1;
        }
        Self(out)
    }

    #[inline]
    #[must_use]
    pub const fn of_page(page: PageNumber) -> Self {
        Self::of_address(page.base())
    }

    #[inline]
    #[must_use]
    pub const fn pgd(self) -> u16 {
        self.0[0]
    }

    #[inline]
    #[must_use]
    pub const fn p4d(self) -> u16 {
        self.0[1]
    }

    #[inline]
    #[must_use]
    pub const fn pud(self) -> u16 {
        self.0[2]
    }

    #[inline]
    #[must_use]
    pub const fn pmd(self) -> u16 {
        self.0[3]
    }

    #[inline]
    #[must_use]
    pub const fn pt(self) -> u16 {
        self.0[LEVELS - 1]
    }

    /// Indices of the four directory levels (PGD to PMD).
    #[inline]
    #[must_use]
    pub const fn directories(self) -> [u16; LEVELS - 1] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }

    #[inline]
    #[must_use]
    pub const fn as_array(self) -> [u16; LEVELS] {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PAGE_SIZE;

    #[test]
    fn low_pages_only_touch_the_leaf_index() {
        for page in 0..512 {
            let idx = TableIndices::of_page(PageNumber::new(page));
            assert_eq!(idx.directories(), [0; 4]);
            assert_eq!(u64::from(idx.pt()), page);
        }
        let idx = TableIndices::of_page(PageNumber::new(512));
        assert_eq!(idx.pmd(), 1);
        assert_eq!(idx.pt(), 0);
    }

    #[test]
    fn offset_bits_are_ignored() {
        let a = TableIndices::of_address(VirtualAddress::new(7 * PAGE_SIZE));
        let b = TableIndices::of_address(VirtualAddress::new(8 * PAGE_SIZE - 1));
        assert_eq!(a, b);
    }

    #[test]
    fn top_bits_above_the_root_are_dropped() {
        let idx = TableIndices::of_address(VirtualAddress::new(u64::MAX));
        assert_eq!(idx.as_array(), [0x1FF; LEVELS]);
    }
}
