use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_memory_addresses::PAGE_SIZE;

/// Process-wide paging counters.
///
/// Counters only grow; they are updated with relaxed atomics from every
/// simulated CPU.
#[derive(Debug, Default)]
pub struct PagingStats {
    mem_access: AtomicU64,
    page_faults: AtomicU64,
    swap_in: AtomicU64,
    swap_out: AtomicU64,
    pt_bytes: AtomicU64,
}

/// Point-in-time copy of [`PagingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Page-table lookups (entry reads and translations).
    pub mem_access: u64,
    /// Accesses that found their page swapped out.
    pub page_faults: u64,
    pub swap_in: u64,
    pub swap_out: u64,
    /// Bytes of device memory holding page tables.
    pub pt_bytes: u64,
}

impl PagingStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mem_access: AtomicU64::new(0),
            page_faults: AtomicU64::new(0),
            swap_in: AtomicU64::new(0),
            swap_out: AtomicU64::new(0),
            pt_bytes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_access(&self) {
        self.mem_access.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fault(&self) {
        self.page_faults.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_swap_in(&self) {
        self.swap_in.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_swap_out(&self) {
        self.swap_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Account one page worth of table memory.
    #[inline]
    pub fn record_table(&self) {
        self.pt_bytes.fetch_add(PAGE_SIZE, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            mem_access: self.mem_access.load(Ordering::Relaxed),
            page_faults: self.page_faults.load(Ordering::Relaxed),
            swap_in: self.swap_in.load(Ordering::Relaxed),
            swap_out: self.swap_out.load(Ordering::Relaxed),
            pt_bytes: self.pt_bytes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.mem_access,
            &self.page_faults,
            &self.swap_in,
            &self.swap_out,
            &self.pt_bytes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[STATS] mem_access = {}", self.mem_access)?;
        writeln!(f, "[STATS] page_faults = {}", self.page_faults)?;
        writeln!(f, "[STATS] swap_in = {}", self.swap_in)?;
        writeln!(f, "[STATS] swap_out = {}", self.swap_out)?;
        writeln!(f, "[STATS] pt_bytes = {}", self.pt_bytes)
    }
}

impl fmt::Display for PagingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_five_lines_in_order() {
        let stats = PagingStats::new();
        stats.record_access();
        stats.record_access();
        stats.record_fault();
        stats.record_swap_out();
        stats.record_table();

        assert_eq!(
            stats.to_string(),
            "[STATS] mem_access = 2\n\
             [STATS] page_faults = 1\n\
             [STATS] swap_in = 0\n\
             [STATS] swap_out = 1\n\
             [STATS] pt_bytes = 4096\n"
        );
    }

    #[test]
    fn reset_zeroes_everything() {
        let stats = PagingStats::new();
        stats.record_swap_in();
        stats.record_table();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
