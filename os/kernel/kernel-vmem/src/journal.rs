use crate::PageTableEntry;
use crate::table_memory::store_entry;
use alloc::vec::Vec;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};
use kernel_memphy::{DeviceError, MemoryDevice};
use log::debug;

/// Undo log for one page-table transaction.
///
/// Records the previous value of every entry overwritten and every table
/// frame allocated through a journaled [`TableMemory`](crate::TableMemory).
#[derive(Debug, Default)]
pub struct Journal {
    writes: Vec<(PhysicalAddress, PageTableEntry)>,
    tables: Vec<FrameNumber>,
}

impl Journal {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writes: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Table frames allocated under this journal, oldest first.
    #[must_use]
    pub fn table_frames(&self) -> &[FrameNumber] {
        &self.tables
    }

    pub(crate) fn record_write(&mut self, at: PhysicalAddress, previous: PageTableEntry) {
        self.writes.push((at, previous));
    }

    pub(crate) fn record_table(&mut self, frame: FrameNumber) {
        self.tables.push(frame);
    }

    /// Restore every recorded entry and release every recorded table frame,
    /// newest first.
    ///
    /// # Errors
    /// Device errors from the restoring writes or frame releases.
    pub fn rollback(self, device: &mut MemoryDevice) -> Result<(), DeviceError> {
        debug!(
            "rolling back {} entry writes and {} table frames",
            self.writes.len(),
            self.tables.len()
        );
        for (at, previous) in self.writes.into_iter().rev() {
            store_entry(device, at, previous)?;
        }
        for frame in self.tables.into_iter().rev() {
            device.release_frame(frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PagingStats, TableMemory};

    #[test]
    fn rollback_restores_entries_and_the_free_stack() {
        let mut dev = MemoryDevice::with_frames(4).unwrap();
        let root = dev.acquire_frame().unwrap();
        let free_before = dev.free_frames();

        let stats = PagingStats::new();
        let mut journal = Journal::new();
        {
            let mut tables = TableMemory::journaled(&mut dev, &stats, &mut journal);
            let a = tables.resolve_or_create_level(root.base(), true).unwrap();
            tables.resolve_or_create_level(a, true).unwrap();
        }
        assert_eq!(journal.table_frames().len(), 2);
        assert_eq!(dev.free_frames(), free_before - 2);

        journal.rollback(&mut dev).unwrap();
        assert_eq!(dev.free_frames(), free_before);
        assert_eq!(load(&mut dev, root.base()), PageTableEntry::zero());
        // the next acquisition must yield what the walk took first
        assert_eq!(dev.acquire_frame().unwrap(), FrameNumber::new(1));
    }

    fn load(dev: &mut MemoryDevice, at: PhysicalAddress) -> PageTableEntry {
        crate::table_memory::load_entry(dev, at).unwrap()
    }
}
