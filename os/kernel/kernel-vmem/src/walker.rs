//! # Walk Strategies
//!
//! A [`PageWalker`] finds the device address of the leaf entry for a page.
//! The strategy is fixed per memory system through [`PagingMode`].

use crate::{TableIndices, TableMemory, WalkError};
use kernel_info::paging::{ENTRY_SIZE, FLAT_ENTRIES};
use kernel_memory_addresses::{FrameNumber, PageNumber, PhysicalAddress};

pub trait PageWalker {
    /// Device address of the leaf entry for `page` below the table in `root`.
    ///
    /// With `allocate`, missing intermediate tables are created (and zeroed).
    /// Without it the walk stops at the first absent level.
    ///
    /// # Errors
    /// [`WalkError::TranslationMiss`] for a missing level on a read-only
    /// walk, [`WalkError::PageOutOfRange`] for pages the strategy cannot
    /// index, and device errors.
    fn leaf_slot(
        &self,
        tables: &mut TableMemory<'_>,
        root: FrameNumber,
        page: PageNumber,
        allocate: bool,
    ) -> Result<PhysicalAddress, WalkError>;
}

/// PGD → P4D → PUD → PMD → PT.
#[derive(Debug, Default, Copy, Clone)]
pub struct FiveLevel;

/// A single root table indexed by page number.
#[derive(Debug, Default, Copy, Clone)]
pub struct Flat;

#[inline]
fn slot(table: PhysicalAddress, index: u16) -> PhysicalAddress {
    table + u64::from(index) * ENTRY_SIZE
}

impl PageWalker for FiveLevel {
    fn leaf_slot(
        &self,
        tables: &mut TableMemory<'_>,
        root: FrameNumber,
        page: PageNumber,
        allocate: bool,
    ) -> Result<PhysicalAddress, WalkError> {
        let indices = TableIndices::of_page(page);
        let mut table = root.base();
        for index in indices.directories() {
            table = tables.resolve_or_create_level(slot(table, index), allocate)?;
        }
        Ok(slot(table, indices.pt()))
    }
}

impl PageWalker for Flat {
    fn leaf_slot(
        &self,
        _tables: &mut TableMemory<'_>,
        root: FrameNumber,
        page: PageNumber,
        _allocate: bool,
    ) -> Result<PhysicalAddress, WalkError> {
        if page.as_u64() >= FLAT_ENTRIES {
            return Err(WalkError::PageOutOfRange(page));
        }
        Ok(root.base() + page.as_u64() * ENTRY_SIZE)
    }
}

/// Which [`PageWalker`] a memory system uses.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PagingMode {
    #[default]
    FiveLevel,
    Flat,
}

impl PageWalker for PagingMode {
    #[inline]
    fn leaf_slot(
        &self,
        tables: &mut TableMemory<'_>,
        root: FrameNumber,
        page: PageNumber,
        allocate: bool,
    ) -> Result<PhysicalAddress, WalkError> {
        match self {
            Self::FiveLevel => FiveLevel.leaf_slot(tables, root, page, allocate),
            Self::Flat => Flat.leaf_slot(tables, root, page, allocate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PagingStats;
    use kernel_memphy::MemoryDevice;

    #[test]
    fn five_level_walk_creates_four_tables_once() {
        let mut dev = MemoryDevice::with_frames(8).unwrap();
        let stats = PagingStats::new();
        let mut tables = TableMemory::new(&mut dev, &stats);
        let root = tables.allocate_table().unwrap();

        let first = FiveLevel
            .leaf_slot(&mut tables, root, PageNumber::new(3), true)
            .unwrap();
        assert_eq!(tables.device().used_frames(), 5);

        // neighbours share the whole chain
        let second = FiveLevel
            .leaf_slot(&mut tables, root, PageNumber::new(4), true)
            .unwrap();
        assert_eq!(tables.device().used_frames(), 5);
        assert_eq!(second, first + ENTRY_SIZE);
    }

    #[test]
    fn read_only_walk_stops_at_the_first_gap() {
        let mut dev = MemoryDevice::with_frames(8).unwrap();
        let stats = PagingStats::new();
        let mut tables = TableMemory::new(&mut dev, &stats);
        let root = tables.allocate_table().unwrap();

        assert_eq!(
            FiveLevel.leaf_slot(&mut tables, root, PageNumber::new(0), false),
            Err(WalkError::TranslationMiss)
        );
        assert_eq!(tables.device().used_frames(), 1);
    }

    #[test]
    fn flat_walk_is_bounded_by_its_frame() {
        let mut dev = MemoryDevice::with_frames(2).unwrap();
        let stats = PagingStats::new();
        let mut tables = TableMemory::new(&mut dev, &stats);
        let root = tables.allocate_table().unwrap();

        let last = PageNumber::new(FLAT_ENTRIES - 1);
        assert_eq!(
            Flat.leaf_slot(&mut tables, root, last, true),
            Ok(root.base() + (FLAT_ENTRIES - 1) * ENTRY_SIZE)
        );

        let past = PageNumber::new(FLAT_ENTRIES);
        assert_eq!(
            PagingMode::Flat.leaf_slot(&mut tables, root, past, true),
            Err(WalkError::PageOutOfRange(past))
        );
        assert_eq!(tables.device().used_frames(), 1);
    }
}
