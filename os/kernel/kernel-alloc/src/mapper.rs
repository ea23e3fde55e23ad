use crate::{FrameList, MapError, MemoryRegion};
use alloc::collections::VecDeque;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PageNumber, VirtualAddress};
use kernel_memphy::MemoryDevice;
use kernel_vmem::{AddressSpace, Journal, PagingStats, TableMemory};
use log::{debug, warn};

/// Take up to `count` frames from `device`; see [`FrameList::allocate`].
pub fn allocate_frames(device: &mut MemoryDevice, count: usize) -> FrameList {
    FrameList::allocate(device, count)
}

/// Return a frame list to `device`; see [`FrameList::release`].
///
/// # Errors
/// Device errors if a frame was already released elsewhere.
pub fn release_frame_list(
    device: &mut MemoryDevice,
    list: FrameList,
) -> Result<(), kernel_memphy::DeviceError> {
    list.release(device)
}

fn region_of(start: PageNumber, pages: usize) -> MemoryRegion {
    let start = start.base().as_u64();
    MemoryRegion::new(start, start + pages as u64 * PAGE_SIZE)
}

/// Bind `frames[i]` to page `start + i` and queue each page for replacement.
///
/// Stops at the first failure; pages mapped up to that point stay mapped and
/// queued.
///
/// # Errors
/// [`MapError::Partial`] with the number of pages mapped before the failure.
pub fn map_pages(
    space: &AddressSpace,
    tables: &mut TableMemory<'_>,
    start: PageNumber,
    frames: &[FrameNumber],
    fifo: &mut VecDeque<PageNumber>,
) -> Result<MemoryRegion, MapError> {
    for (i, &frame) in frames.iter().enumerate() {
        let page = start + i as u64;
        if let Err(source) = space.set_mapped(tables, page, frame) {
            debug!("mapping page {page} to frame {frame} failed: {source}");
            return Err(MapError::Partial { mapped: i, source });
        }
        fifo.push_back(page);
    }
    Ok(region_of(start, frames.len()))
}

/// Map `pages` fresh frames at `map_start`, all or nothing.
///
/// On failure the device (free stack, table bytes) and `fifo` are left as
/// they were before the call. `pt_bytes` keeps counting tables that were
/// created and then rolled back. Zero pages yield an empty region at
/// `map_start` and touch nothing.
///
/// # Errors
/// [`MapError::ShortAllocation`] when the device cannot supply `pages`
/// frames, [`MapError::Partial`] when a page could not be mapped.
pub fn map_range(
    space: &AddressSpace,
    device: &mut MemoryDevice,
    stats: &PagingStats,
    fifo: &mut VecDeque<PageNumber>,
    map_start: VirtualAddress,
    pages: usize,
) -> Result<MemoryRegion, MapError> {
    let start = map_start.page();
    let frames = FrameList::allocate(device, pages);
    if frames.len() < pages {
        let got = frames.len();
        frames.release(device)?;
        warn!("cannot map {pages} pages at {map_start}: only {got} frames free");
        return Err(MapError::ShortAllocation { wanted: pages, got });
    }

    let queued = fifo.len();
    let mut journal = Journal::new();
    let mapped = {
        let mut tables = TableMemory::journaled(device, stats, &mut journal);
        map_pages(space, &mut tables, start, frames.as_slice(), fifo)
    };

    match mapped {
        Ok(region) => {
            debug!(
                "mapped {region} onto {pages} frames, {} new tables",
                journal.table_frames().len()
            );
            frames.commit();
            Ok(region)
        }
        Err(e) => {
            warn!("cannot map {pages} pages at {map_start}: {e}");
            journal.rollback(device)?;
            fifo.truncate(queued);
            frames.release(device)?;
            Err(e)
        }
    }
}
