//! # Address Space
//!
//! A process' page-table root plus the walk strategy used to reach its
//! leaves. The handle is a plain value; all state lives in the device that
//! the caller lends through a [`TableMemory`].
//!
//! ## Operations
//!
//! - [`AddressSpace::create`] allocates and zeroes the root table.
//! - [`AddressSpace::set_mapped`] binds a page to a RAM frame, creating
//!   intermediate tables as needed.
//! - [`AddressSpace::set_swapped`] records a swap slot in a leaf.
//! - [`AddressSpace::reserve`] writes a reserved leaf.
//! - [`AddressSpace::get_entry`] / [`AddressSpace::set_entry`] access raw
//!   leaves. Like the other writers, `set_entry` creates missing tables.
//! - [`AddressSpace::translate`] resolves a virtual address to a device
//!   address.
//!
//! ## Accounting
//!
//! [`get_entry`](AddressSpace::get_entry) and
//! [`translate`](AddressSpace::translate) each count one `mem_access`,
//! whether or not the walk succeeds. Mutations are not counted.

use crate::{EntryState, PageTableEntry, PageWalker, PagingMode, TableMemory, WalkError};
use kernel_memory_addresses::{FrameNumber, PageNumber, PhysicalAddress, VirtualAddress};
use log::debug;

/// Handle to one process' page tables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    root: FrameNumber,
    mode: PagingMode,
}

impl AddressSpace {
    /// Allocate a zeroed root table.
    ///
    /// # Errors
    /// Device errors, most notably running out of frames.
    pub fn create(tables: &mut TableMemory<'_>, mode: PagingMode) -> Result<Self, WalkError> {
        let root = tables.allocate_table()?;
        debug!("created {mode:?} address space rooted at frame {root}");
        Ok(Self { root, mode })
    }

    /// Wrap an existing root table.
    #[inline]
    #[must_use]
    pub const fn from_root(root: FrameNumber, mode: PagingMode) -> Self {
        Self { root, mode }
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> FrameNumber {
        self.root
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    /// Device address of the leaf entry for `page`.
    ///
    /// # Errors
    /// See [`PageWalker::leaf_slot`].
    pub fn leaf_slot(
        &self,
        tables: &mut TableMemory<'_>,
        page: PageNumber,
        allocate: bool,
    ) -> Result<PhysicalAddress, WalkError> {
        self.mode.leaf_slot(tables, self.root, page, allocate)
    }

    /// Bind `page` to `frame`.
    ///
    /// The leaf becomes present and not swapped; the dirty bit is kept.
    ///
    /// # Errors
    /// Device errors (including running out of frames for new tables),
    /// [`WalkError::PageOutOfRange`] and [`WalkError::FieldOverflow`].
    pub fn set_mapped(
        &self,
        tables: &mut TableMemory<'_>,
        page: PageNumber,
        frame: FrameNumber,
    ) -> Result<(), WalkError> {
        let slot = self.leaf_slot(tables, page, true)?;
        let entry = tables.read_entry(slot)?.with_frame(frame)?;
        tables.write_entry(slot, entry)
    }

    /// Record that `page` now lives at frame `offset` of swap device
    /// `swap_type`, creating tables as needed. Clears the dirty bit.
    ///
    /// # Errors
    /// Device errors (including running out of frames for new tables),
    /// [`WalkError::PageOutOfRange`] and [`WalkError::FieldOverflow`] for
    /// oversized slot values.
    pub fn set_swapped(
        &self,
        tables: &mut TableMemory<'_>,
        page: PageNumber,
        swap_type: u8,
        offset: u32,
    ) -> Result<(), WalkError> {
        let slot = self.leaf_slot(tables, page, true)?;
        let entry = tables.read_entry(slot)?.with_swap_slot(swap_type, offset)?;
        tables.write_entry(slot, entry)
    }

    /// Write a reserved leaf for `page`, creating tables as needed.
    ///
    /// # Errors
    /// Device errors and [`WalkError::PageOutOfRange`].
    pub fn reserve(&self, tables: &mut TableMemory<'_>, page: PageNumber) -> Result<(), WalkError> {
        let slot = self.leaf_slot(tables, page, true)?;
        tables.write_entry(slot, PageTableEntry::reserved())
    }

    /// Read the leaf for `page`; a missing level reads as the zero entry.
    ///
    /// # Errors
    /// Device errors and [`WalkError::PageOutOfRange`].
    pub fn get_entry(
        &self,
        tables: &mut TableMemory<'_>,
        page: PageNumber,
    ) -> Result<PageTableEntry, WalkError> {
        tables.stats().record_access();
        match self.leaf_slot(tables, page, false) {
            Ok(slot) => tables.read_entry(slot),
            Err(WalkError::TranslationMiss) => Ok(PageTableEntry::zero()),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the leaf for `page` with `entry`, creating tables as needed.
    ///
    /// # Errors
    /// Device errors (including running out of frames for new tables) and
    /// [`WalkError::PageOutOfRange`].
    pub fn set_entry(
        &self,
        tables: &mut TableMemory<'_>,
        page: PageNumber,
        entry: PageTableEntry,
    ) -> Result<(), WalkError> {
        let slot = self.leaf_slot(tables, page, true)?;
        tables.write_entry(slot, entry)
    }

    /// Resolve `va` to the device byte that backs it.
    ///
    /// # Errors
    /// [`WalkError::TranslationMiss`] if any level is absent or the leaf is
    /// not a resident mapping (swapped and reserved leaves included).
    pub fn translate(
        &self,
        tables: &mut TableMemory<'_>,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, WalkError> {
        tables.stats().record_access();
        let slot = self.leaf_slot(tables, va.page(), false)?;
        match tables.read_entry(slot)?.state() {
            EntryState::Mapped(frame) => Ok(frame.base() + va.offset()),
            _ => Err(WalkError::TranslationMiss),
        }
    }
}
