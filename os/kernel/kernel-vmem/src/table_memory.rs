//! # Entry Access over a Device
//!
//! [`TableMemory`] is the only path through which page-table bytes are read
//! or written. Entries are stored little-endian, one byte per device access.

use crate::{Journal, PageTableEntry, PagingStats, WalkError};
use kernel_memory_addresses::{FrameNumber, PhysicalAddress};
use kernel_memphy::{DeviceError, MemoryDevice};
use log::debug;

/// Read the entry stored at `at`.
pub(crate) fn load_entry(
    device: &mut MemoryDevice,
    at: PhysicalAddress,
) -> Result<PageTableEntry, DeviceError> {
    let mut bytes = [0u8; 4];
    for (i, byte) in (0u64..).zip(bytes.iter_mut()) {
        *byte = device.read(at + i)?;
    }
    Ok(PageTableEntry::from_raw(u32::from_le_bytes(bytes)))
}

/// Store `entry` at `at`.
pub(crate) fn store_entry(
    device: &mut MemoryDevice,
    at: PhysicalAddress,
    entry: PageTableEntry,
) -> Result<(), DeviceError> {
    for (i, byte) in (0u64..).zip(entry.raw().to_le_bytes()) {
        device.write(at + i, byte)?;
    }
    Ok(())
}

/// Typed page-table access to a borrowed device.
///
/// Created per operation while the caller holds the device. With a journal
/// attached every entry write and every table frame is recorded so the
/// whole operation can be undone.
pub struct TableMemory<'a> {
    device: &'a mut MemoryDevice,
    stats: &'a PagingStats,
    journal: Option<&'a mut Journal>,
}

impl<'a> TableMemory<'a> {
    pub fn new(device: &'a mut MemoryDevice, stats: &'a PagingStats) -> Self {
        Self {
            device,
            stats,
            journal: None,
        }
    }

    pub fn journaled(
        device: &'a mut MemoryDevice,
        stats: &'a PagingStats,
        journal: &'a mut Journal,
    ) -> Self {
        Self {
            device,
            stats,
            journal: Some(journal),
        }
    }

    #[inline]
    pub fn device(&mut self) -> &mut MemoryDevice {
        self.device
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &PagingStats {
        self.stats
    }

    /// # Errors
    /// Device errors if any of the four bytes is out of range.
    pub fn read_entry(&mut self, at: PhysicalAddress) -> Result<PageTableEntry, WalkError> {
        Ok(load_entry(self.device, at)?)
    }

    /// # Errors
    /// Device errors if any of the four bytes is out of range.
    pub fn write_entry(&mut self, at: PhysicalAddress, entry: PageTableEntry) -> Result<(), WalkError> {
        if let Some(journal) = self.journal.as_deref_mut() {
            let previous = load_entry(self.device, at)?;
            journal.record_write(at, previous);
        }
        Ok(store_entry(self.device, at, entry)?)
    }

    /// Take a frame for a new table, zero it and account it in `pt_bytes`.
    ///
    /// # Errors
    /// [`DeviceError::OutOfFrames`] when the device is exhausted, or
    /// [`WalkError::FieldOverflow`] when the frame cannot be named by an entry.
    pub fn allocate_table(&mut self) -> Result<FrameNumber, WalkError> {
        let frame = self.device.acquire_frame()?;
        if let Err(e) = self.prepare_table(frame) {
            self.device.release_frame(frame)?;
            return Err(e);
        }

        self.stats.record_table();
        if let Some(journal) = self.journal.as_deref_mut() {
            journal.record_table(frame);
        }
        debug!("allocated table frame {frame}");
        Ok(frame)
    }

    fn prepare_table(&mut self, frame: FrameNumber) -> Result<(), WalkError> {
        PageTableEntry::table(frame)?;
        self.device.zero_frame(frame)?;
        Ok(())
    }

    /// Follow the non-leaf entry at `parent_slot` to the base of its table.
    ///
    /// An absent entry is filled with a fresh, zeroed table when `allocate`
    /// is set.
    ///
    /// # Errors
    /// [`WalkError::TranslationMiss`] for an absent entry without
    /// `allocate`; device errors otherwise.
    pub fn resolve_or_create_level(
        &mut self,
        parent_slot: PhysicalAddress,
        allocate: bool,
    ) -> Result<PhysicalAddress, WalkError> {
        let entry = self.read_entry(parent_slot)?;
        if entry.is_present() {
            return Ok(entry.table_frame().base());
        }
        if !allocate {
            return Err(WalkError::TranslationMiss);
        }

        let frame = self.allocate_table()?;
        self.write_entry(parent_slot, PageTableEntry::table(frame)?)?;
        Ok(frame.base())
    }
}
