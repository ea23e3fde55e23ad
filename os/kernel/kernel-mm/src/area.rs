use alloc::vec;
use alloc::vec::Vec;
use kernel_alloc::MemoryRegion;
use kernel_memory_addresses::VirtualAddress;

/// A contiguous, growable part of a process' virtual address space.
///
/// The area covers `[start, end)`; its break (`sbrk`) marks where the next
/// growth begins. `start <= sbrk <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMemoryArea {
    id: usize,
    start: u64,
    end: u64,
    sbrk: u64,
    free_regions: Vec<MemoryRegion>,
}

impl VirtualMemoryArea {
    /// An empty area at `start` with an empty free region at the same spot.
    #[must_use]
    pub fn new(id: usize, start: VirtualAddress) -> Self {
        let start = start.as_u64();
        Self {
            id,
            start,
            end: start,
            sbrk: start,
            free_regions: vec![MemoryRegion::new(start, start)],
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        VirtualAddress::new(self.start)
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.end)
    }

    #[inline]
    #[must_use]
    pub const fn sbrk(&self) -> VirtualAddress {
        VirtualAddress::new(self.sbrk)
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        MemoryRegion::new(self.start, self.end)
    }

    /// Free regions recorded for this area. Growth never consults them.
    #[inline]
    #[must_use]
    pub fn free_regions(&self) -> &[MemoryRegion] {
        &self.free_regions
    }

    /// Move the break to `new_break`, extending the end if needed.
    pub(crate) fn advance_break(&mut self, new_break: VirtualAddress) {
        debug_assert!(new_break.as_u64() >= self.sbrk);
        self.sbrk = new_break.as_u64();
        self.end = self.end.max(self.sbrk);
    }
}
