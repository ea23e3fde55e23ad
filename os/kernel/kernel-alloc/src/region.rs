use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// Half-open virtual range `[start, end)`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MemoryRegion {
    start: u64,
    end: u64,
}

impl MemoryRegion {
    #[inline]
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(0, 0)
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
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `true` if both ranges share at least one byte. Adjacent ranges and
    /// empty ranges never overlap.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: VirtualAddress) -> bool {
        self.start <= addr.as_u64() && addr.as_u64() < self.end
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:X}, 0x{:X})", self.start, self.end)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
