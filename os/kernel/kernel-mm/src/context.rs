//! # Per-Process Memory Context
//!
//! An [`MmContext`] bundles everything the memory system tracks for one
//! process: its page-table root, its areas, a fixed-size symbol table and
//! the FIFO queue of resident pages used to pick eviction victims.
//!
//! A context is owned by exactly one simulated CPU at a time; operations
//! that touch shared devices go through [`MemorySystem`](crate::MemorySystem)
//! and take the context by `&mut`.

use crate::{MmError, VirtualMemoryArea};
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use kernel_alloc::MemoryRegion;
use kernel_info::memory::SYMBOL_TABLE_SIZE;
use kernel_memory_addresses::{PageNumber, VirtualAddress};
use kernel_vmem::AddressSpace;
use log::debug;

pub struct MmContext {
    pid: u32,
    pub(crate) space: AddressSpace,
    areas: Vec<VirtualMemoryArea>,
    symbols: [MemoryRegion; SYMBOL_TABLE_SIZE],
    pub(crate) fifo: VecDeque<PageNumber>,
}

impl MmContext {
    /// A context with one empty area (id 0) at address 0.
    #[must_use]
    pub fn new(pid: u32, space: AddressSpace) -> Self {
        Self {
            pid,
            space,
            areas: vec![VirtualMemoryArea::new(0, VirtualAddress::zero())],
            symbols: [MemoryRegion::empty(); SYMBOL_TABLE_SIZE],
            fifo: VecDeque::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[inline]
    #[must_use]
    pub const fn space(&self) -> &AddressSpace {
        &self.space
    }

    /// Areas in ascending id order.
    #[inline]
    #[must_use]
    pub fn areas(&self) -> &[VirtualMemoryArea] {
        &self.areas
    }

    /// Resident pages, oldest first.
    #[inline]
    #[must_use]
    pub const fn fifo(&self) -> &VecDeque<PageNumber> {
        &self.fifo
    }

    /// Look up the area with id `id`.
    ///
    /// # Errors
    /// [`MmError::VmaNotFound`] if no area carries that id.
    pub fn find_vma(&self, id: usize) -> Result<&VirtualMemoryArea, MmError> {
        self.areas
            .iter()
            .take_while(|vma| vma.id() <= id)
            .find(|vma| vma.id() == id)
            .ok_or(MmError::VmaNotFound(id))
    }

    pub(crate) fn find_vma_mut(&mut self, id: usize) -> Result<&mut VirtualMemoryArea, MmError> {
        self.areas
            .iter_mut()
            .find(|vma| vma.id() == id)
            .ok_or(MmError::VmaNotFound(id))
    }

    /// The `size`-byte region starting at the break of area `id`.
    ///
    /// # Errors
    /// [`MmError::VmaNotFound`] for an unknown area, [`MmError::InvalidRange`]
    /// if the region would wrap around the address space.
    pub fn region_at_break(&self, id: usize, size: u64) -> Result<MemoryRegion, MmError> {
        let start = self.find_vma(id)?.sbrk().as_u64();
        let end = start
            .checked_add(size)
            .ok_or(MmError::InvalidRange { start, end: u64::MAX })?;
        Ok(MemoryRegion::new(start, end))
    }

    /// Check that `[start, end)` is a proper range that no area intersects.
    ///
    /// # Errors
    /// [`MmError::InvalidRange`] if `start >= end`, [`MmError::OverlapDetected`]
    /// with the first area it hits otherwise.
    pub fn validate_no_overlap(&self, start: u64, end: u64) -> Result<(), MmError> {
        if start >= end {
            return Err(MmError::InvalidRange { start, end });
        }
        let candidate = MemoryRegion::new(start, end);
        match self.areas.iter().find(|vma| vma.region().overlaps(&candidate)) {
            Some(vma) => {
                debug!(
                    "pid {}: {candidate} overlaps area {} {}",
                    self.pid,
                    vma.id(),
                    vma.region()
                );
                Err(MmError::OverlapDetected(vma.region()))
            }
            None => Ok(()),
        }
    }

    /// Append an empty area at `start` with the next free id.
    ///
    /// # Errors
    /// [`MmError::InvalidRange`] if `start` is not page aligned,
    /// [`MmError::OverlapDetected`] if `start` lies inside an existing area.
    pub fn add_area(&mut self, start: VirtualAddress) -> Result<usize, MmError> {
        if !start.is_page_aligned() {
            return Err(MmError::InvalidRange {
                start: start.as_u64(),
                end: start.as_u64(),
            });
        }
        if let Some(vma) = self.areas.iter().find(|vma| vma.region().contains(start)) {
            return Err(MmError::OverlapDetected(vma.region()));
        }
        let id = self.areas.last().map_or(0, |vma| vma.id() + 1);
        self.areas.push(VirtualMemoryArea::new(id, start));
        debug!("pid {}: added area {id} at {start}", self.pid);
        Ok(id)
    }

    /// # Errors
    /// [`MmError::SymbolOutOfRange`] for an index past the table.
    pub fn symbol(&self, index: usize) -> Result<MemoryRegion, MmError> {
        self.symbols
            .get(index)
            .copied()
            .ok_or(MmError::SymbolOutOfRange(index))
    }

    /// # Errors
    /// [`MmError::SymbolOutOfRange`] for an index past the table.
    pub fn set_symbol(&mut self, index: usize, region: MemoryRegion) -> Result<(), MmError> {
        let slot = self
            .symbols
            .get_mut(index)
            .ok_or(MmError::SymbolOutOfRange(index))?;
        *slot = region;
        Ok(())
    }
}

impl core::fmt::Debug for MmContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MmContext")
            .field("pid", &self.pid)
            .field("space", &self.space)
            .field("areas", &self.areas)
            .field("resident", &self.fifo.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
    use kernel_vmem::PagingMode;

    fn context() -> MmContext {
        MmContext::new(1, AddressSpace::from_root(FrameNumber::new(0), PagingMode::FiveLevel))
    }

    #[test]
    fn starts_with_one_empty_area() {
        let ctx = context();
        let vma = ctx.find_vma(0).unwrap();
        assert_eq!(vma.region(), MemoryRegion::new(0, 0));
        assert_eq!(vma.sbrk(), VirtualAddress::zero());
        assert_eq!(vma.free_regions(), &[MemoryRegion::new(0, 0)]);
        assert_eq!(ctx.find_vma(1).unwrap_err(), MmError::VmaNotFound(1));
    }

    #[test]
    fn region_at_break_starts_at_sbrk() {
        let mut ctx = context();
        ctx.find_vma_mut(0)
            .unwrap()
            .advance_break(VirtualAddress::new(2 * PAGE_SIZE));
        assert_eq!(
            ctx.region_at_break(0, PAGE_SIZE).unwrap(),
            MemoryRegion::new(2 * PAGE_SIZE, 3 * PAGE_SIZE)
        );
        assert!(matches!(
            ctx.region_at_break(0, u64::MAX),
            Err(MmError::InvalidRange { .. })
        ));
    }

    #[test]
    fn overlap_rules_are_half_open() {
        let mut ctx = context();
        ctx.find_vma_mut(0)
            .unwrap()
            .advance_break(VirtualAddress::new(0x4000));

        assert_eq!(
            ctx.validate_no_overlap(0x5000, 0x5000),
            Err(MmError::InvalidRange {
                start: 0x5000,
                end: 0x5000
            })
        );
        assert_eq!(
            ctx.validate_no_overlap(0x3000, 0x5000),
            Err(MmError::OverlapDetected(MemoryRegion::new(0, 0x4000)))
        );
        assert_eq!(ctx.validate_no_overlap(0x4000, 0x5000), Ok(()));
    }

    #[test]
    fn areas_get_ascending_ids() {
        let mut ctx = context();
        ctx.find_vma_mut(0)
            .unwrap()
            .advance_break(VirtualAddress::new(0x2000));

        assert_eq!(
            ctx.add_area(VirtualAddress::new(0x1000)),
            Err(MmError::OverlapDetected(MemoryRegion::new(0, 0x2000)))
        );
        assert_eq!(ctx.add_area(VirtualAddress::new(0x10_0000)), Ok(1));
        assert_eq!(ctx.add_area(VirtualAddress::new(0x20_0000)), Ok(2));
        assert_eq!(ctx.find_vma(2).unwrap().start(), VirtualAddress::new(0x20_0000));
    }

    #[test]
    fn areas_start_on_a_page_boundary() {
        let mut ctx = context();
        assert_eq!(
            ctx.add_area(VirtualAddress::new(0x1800)),
            Err(MmError::InvalidRange {
                start: 0x1800,
                end: 0x1800
            })
        );
        assert!(ctx.find_vma(1).is_err());
    }

    #[test]
    fn symbol_table_is_bounded() {
        let mut ctx = context();
        let r = MemoryRegion::new(0x100, 0x200);
        ctx.set_symbol(SYMBOL_TABLE_SIZE - 1, r).unwrap();
        assert_eq!(ctx.symbol(SYMBOL_TABLE_SIZE - 1), Ok(r));
        assert_eq!(ctx.symbol(0), Ok(MemoryRegion::empty()));
        assert_eq!(
            ctx.set_symbol(SYMBOL_TABLE_SIZE, r),
            Err(MmError::SymbolOutOfRange(SYMBOL_TABLE_SIZE))
        );
    }
}
