use crate::swap::{SwapSlot, copy_page};
use crate::{MemoryRegion, MmContext, MmError};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};
use kernel_alloc::map_range;
use kernel_info::memory::MAX_SWAP_DEVICES;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PageNumber, PhysicalAddress, VirtualAddress};
use kernel_memphy::{DeviceError, MemoryDevice, SharedDevice};
use kernel_sync::SpinMutex;
use kernel_vmem::{
    AddressSpace, EntryState, Journal, PageTableEntry, PagingMode, PagingStats, TableMemory,
};
use log::{debug, info, warn};

/// The machine-wide half of the memory system.
///
/// One instance is shared by every simulated CPU; per-process state lives in
/// [`MmContext`] and is passed in by `&mut`.
#[derive(Debug)]
pub struct MemorySystem {
    ram: SharedDevice,
    swaps: [Option<SharedDevice>; MAX_SWAP_DEVICES],
    active_swap: SpinMutex<Option<usize>>,
    stats: PagingStats,
    mode: PagingMode,
    next_pid: AtomicU32,
}

impl MemorySystem {
    /// A system over `ram` with no swap devices attached.
    #[must_use]
    pub fn new(ram: SharedDevice, mode: PagingMode) -> Self {
        Self {
            ram,
            swaps: Default::default(),
            active_swap: SpinMutex::new(None),
            stats: PagingStats::new(),
            mode,
            next_pid: AtomicU32::new(1),
        }
    }

    /// Put `device` into swap slot `slot`. The first device attached becomes
    /// the active one.
    ///
    /// # Errors
    /// [`MmError::DeviceUnavailable`] for a slot past the last one, and
    /// [`MmError::SwapAliasesRam`] if `device` is the RAM device.
    pub fn attach_swap(&mut self, slot: usize, device: SharedDevice) -> Result<(), MmError> {
        if Arc::ptr_eq(&device, &self.ram) {
            return Err(MmError::SwapAliasesRam);
        }
        let target = self.swaps.get_mut(slot).ok_or(MmError::DeviceUnavailable)?;
        *target = Some(device);
        let active = self.active_swap.get_mut();
        if active.is_none() {
            *active = Some(slot);
        }
        info!("swap device attached to slot {slot}");
        Ok(())
    }

    /// Make swap slot `slot` the target of future evictions.
    ///
    /// # Errors
    /// [`MmError::DeviceUnavailable`] if the slot is empty or out of range.
    pub fn select_swap(&self, slot: usize) -> Result<(), MmError> {
        self.swap_device(slot)?;
        *self.active_swap.lock() = Some(slot);
        debug!("swap slot {slot} is now active");
        Ok(())
    }

    #[must_use]
    pub fn active_swap(&self) -> Option<usize> {
        *self.active_swap.lock()
    }

    /// # Errors
    /// [`MmError::DeviceUnavailable`] if the slot is empty or out of range.
    pub fn swap_device(&self, slot: usize) -> Result<&SharedDevice, MmError> {
        self.swaps
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(MmError::DeviceUnavailable)
    }

    #[inline]
    #[must_use]
    pub const fn ram(&self) -> &SharedDevice {
        &self.ram
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &PagingStats {
        &self.stats
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> PagingMode {
        self.mode
    }

    /// Set up a new process: a root table and one empty area at address 0.
    ///
    /// # Errors
    /// [`MmError::OutOfFrames`] if RAM has no frame left for the root table.
    pub fn create_context(&self) -> Result<MmContext, MmError> {
        let mut ram = self.ram.lock();
        let space = AddressSpace::create(&mut TableMemory::new(&mut ram, &self.stats), self.mode)?;
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        info!("pid {pid}: root table in frame {}", space.root());
        Ok(MmContext::new(pid, space))
    }

    /// Grow area `vma_id` by `bytes` (rounded up to whole pages) at its break.
    ///
    /// Returns the newly mapped region. On failure the context and RAM are
    /// left as they were.
    ///
    /// # Errors
    /// [`MmError::VmaNotFound`], [`MmError::InvalidRange`] if the region
    /// would wrap, [`MmError::OverlapDetected`] and [`MmError::OutOfFrames`].
    pub fn grow(
        &self,
        ctx: &mut MmContext,
        vma_id: usize,
        bytes: u64,
    ) -> Result<MemoryRegion, MmError> {
        if bytes == 0 {
            return Ok(MemoryRegion::empty());
        }

        let sbrk = ctx.find_vma(vma_id)?.sbrk().as_u64();
        let size = bytes
            .checked_next_multiple_of(PAGE_SIZE)
            .ok_or(MmError::InvalidRange { start: sbrk, end: u64::MAX })?;
        let region = ctx.region_at_break(vma_id, size)?;
        ctx.validate_no_overlap(region.start().as_u64(), region.end().as_u64())?;
        let pages = usize::try_from(size / PAGE_SIZE).map_err(|_| MmError::InvalidRange {
            start: sbrk,
            end: region.end().as_u64(),
        })?;

        let mut ram = self.ram.lock();
        let space = ctx.space;
        map_range(&space, &mut ram, &self.stats, &mut ctx.fifo, region.start(), pages)?;
        drop(ram);

        ctx.find_vma_mut(vma_id)?.advance_break(region.end());
        debug!("pid {}: area {vma_id} grew by {region}", ctx.pid());
        Ok(region)
    }

    /// Write reserved leaves for `pages` pages starting at `addr`.
    ///
    /// Missing tables are created. Nothing changes if any page in the range
    /// is already in use.
    ///
    /// # Errors
    /// [`MmError::InvalidRange`] if `addr` is not page aligned,
    /// [`MmError::OverlapDetected`] with the first page that is in use,
    /// [`MmError::OutOfFrames`] if tables cannot be allocated.
    pub fn reserve_pages(
        &self,
        ctx: &MmContext,
        addr: VirtualAddress,
        pages: usize,
    ) -> Result<(), MmError> {
        if !addr.is_page_aligned() {
            warn!("pid {}: reservation at unaligned {addr}", ctx.pid());
            return Err(MmError::InvalidRange {
                start: addr.as_u64(),
                end: addr.as_u64(),
            });
        }
        let start = addr.page();
        let mut ram = self.ram.lock();
        let mut journal = Journal::new();
        let reserved = {
            let mut tables = TableMemory::journaled(&mut ram, &self.stats, &mut journal);
            (0..pages as u64).try_for_each(|i| reserve_one(&ctx.space, &mut tables, start + i))
        };

        if let Err(e) = reserved {
            warn!("pid {}: cannot reserve {pages} pages at {addr}: {e}", ctx.pid());
            journal.rollback(&mut ram)?;
            return Err(e);
        }
        debug!("pid {}: reserved {pages} pages at {addr}", ctx.pid());
        Ok(())
    }

    /// Copy RAM frame `victim` to frame `swap_frame` of the active swap device.
    ///
    /// Page tables are not touched.
    ///
    /// # Errors
    /// [`MmError::DeviceUnavailable`] without an active swap device, and
    /// [`MmError::FrameOutOfRange`] for a frame outside either device.
    pub fn swap_out(&self, victim: FrameNumber, swap_frame: FrameNumber) -> Result<(), MmError> {
        let mut ram = self.ram.lock();
        let (_, swap) = self.active_swap_device()?;
        let mut swap = swap.lock();
        copy_page(&mut ram, victim, &mut swap, swap_frame)?;
        self.stats.record_swap_out();
        Ok(())
    }

    /// Move resident `page` to a free slot on the active swap device.
    ///
    /// # Errors
    /// [`MmError::TranslationMiss`] if the page is not resident,
    /// [`MmError::DeviceUnavailable`] without an active swap device and
    /// [`MmError::OutOfFrames`] if the swap device is full.
    pub fn evict_page(&self, ctx: &mut MmContext, page: PageNumber) -> Result<SwapSlot, MmError> {
        let mut ram = self.ram.lock();
        let (slot, swap) = self.active_swap_device()?;
        self.evict_locked(ctx, &mut ram, slot, swap, page)
    }

    /// Bring swapped-out `page` back into RAM.
    ///
    /// If RAM is full, the oldest resident page of `ctx` is evicted first.
    ///
    /// # Errors
    /// [`MmError::TranslationMiss`] if the page is not swapped out,
    /// [`MmError::DeviceUnavailable`] if its swap device is gone.
    pub fn swap_in_page(
        &self,
        ctx: &mut MmContext,
        page: PageNumber,
    ) -> Result<FrameNumber, MmError> {
        let mut ram = self.ram.lock();
        self.swap_in_locked(ctx, &mut ram, page)
    }

    /// Read one byte through the page tables of `ctx`.
    ///
    /// A swapped-out page is faulted back in first.
    ///
    /// # Errors
    /// [`MmError::TranslationMiss`] for absent and reserved pages, plus any
    /// error of [`swap_in_page`](Self::swap_in_page).
    pub fn read_virtual(&self, ctx: &mut MmContext, va: VirtualAddress) -> Result<u8, MmError> {
        let mut ram = self.ram.lock();
        let pa = self.resolve_locked(ctx, &mut ram, va)?;
        Ok(ram.read(pa)?)
    }

    /// Write one byte through the page tables of `ctx` and mark the page
    /// dirty.
    ///
    /// # Errors
    /// As for [`read_virtual`](Self::read_virtual).
    pub fn write_virtual(
        &self,
        ctx: &mut MmContext,
        va: VirtualAddress,
        value: u8,
    ) -> Result<(), MmError> {
        let mut ram = self.ram.lock();
        let pa = self.resolve_locked(ctx, &mut ram, va)?;
        ram.write(pa, value)?;

        let mut tables = TableMemory::new(&mut ram, &self.stats);
        let slot = ctx.space.leaf_slot(&mut tables, va.page(), false)?;
        let entry = tables.read_entry(slot)?;
        tables.write_entry(slot, entry.with_dirty(true))?;
        Ok(())
    }

    /// Resolve `va` without faulting.
    ///
    /// # Errors
    /// [`MmError::TranslationMiss`] unless the page is resident.
    pub fn translate(
        &self,
        ctx: &MmContext,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, MmError> {
        let mut ram = self.ram.lock();
        Ok(ctx
            .space
            .translate(&mut TableMemory::new(&mut ram, &self.stats), va)?)
    }

    /// The leaf entry for `page`; the zero entry if no leaf exists.
    ///
    /// # Errors
    /// Device errors and [`MmError::PageOutOfRange`].
    pub fn entry(&self, ctx: &MmContext, page: PageNumber) -> Result<PageTableEntry, MmError> {
        let mut ram = self.ram.lock();
        Ok(ctx
            .space
            .get_entry(&mut TableMemory::new(&mut ram, &self.stats), page)?)
    }

    /// # Errors
    /// [`MmError::AddressOutOfRange`] outside RAM.
    pub fn io_read(&self, addr: PhysicalAddress) -> Result<u8, MmError> {
        Ok(self.ram.lock().read(addr)?)
    }

    /// # Errors
    /// [`MmError::AddressOutOfRange`] outside RAM.
    pub fn io_write(&self, addr: PhysicalAddress, value: u8) -> Result<(), MmError> {
        Ok(self.ram.lock().write(addr, value)?)
    }

    fn active_swap_device(&self) -> Result<(usize, &SharedDevice), MmError> {
        let slot = self.active_swap().ok_or(MmError::DeviceUnavailable)?;
        Ok((slot, self.swap_device(slot)?))
    }

    fn leaf_entry(
        &self,
        space: &AddressSpace,
        ram: &mut MemoryDevice,
        page: PageNumber,
    ) -> Result<PageTableEntry, MmError> {
        let mut tables = TableMemory::new(ram, &self.stats);
        let slot = space.leaf_slot(&mut tables, page, false)?;
        Ok(tables.read_entry(slot)?)
    }

    fn resolve_locked(
        &self,
        ctx: &mut MmContext,
        ram: &mut MemoryDevice,
        va: VirtualAddress,
    ) -> Result<PhysicalAddress, MmError> {
        let page = va.page();
        let entry = ctx
            .space
            .get_entry(&mut TableMemory::new(ram, &self.stats), page)?;
        let frame = match entry.state() {
            EntryState::Mapped(frame) => frame,
            EntryState::Swapped { swap_type, offset } => {
                self.stats.record_fault();
                debug!(
                    "pid {}: page fault at {va}, page in swap {swap_type}:{offset}",
                    ctx.pid()
                );
                self.swap_in_locked(ctx, ram, page)?
            }
            EntryState::Absent | EntryState::Reserved => return Err(MmError::TranslationMiss),
        };
        Ok(frame.base() + va.offset())
    }

    fn evict_locked(
        &self,
        ctx: &mut MmContext,
        ram: &mut MemoryDevice,
        slot: usize,
        swap: &SharedDevice,
        page: PageNumber,
    ) -> Result<SwapSlot, MmError> {
        let entry = self.leaf_entry(&ctx.space, ram, page)?;
        let frame = entry.frame().ok_or(MmError::TranslationMiss)?;
        let device = u8::try_from(slot).map_err(|_| MmError::DeviceUnavailable)?;

        let mut swap = swap.lock();
        let swap_frame = swap.acquire_frame()?;
        let stored = copy_page(ram, frame, &mut swap, swap_frame)
            .map_err(MmError::from)
            .and_then(|()| {
                let mut tables = TableMemory::new(ram, &self.stats);
                ctx.space
                    .set_swapped(&mut tables, page, device, swap_frame.as_u32())
                    .map_err(MmError::from)
            });
        if let Err(e) = stored {
            swap.release_frame(swap_frame)?;
            return Err(e);
        }
        drop(swap);

        ram.release_frame(frame)?;
        ctx.fifo.retain(|&queued| queued != page);
        self.stats.record_swap_out();
        debug!(
            "pid {}: page {page} moved from frame {frame} to swap {device}:{swap_frame}",
            ctx.pid()
        );
        Ok(SwapSlot {
            device,
            frame: swap_frame,
        })
    }

    /// Evict the oldest resident page of `ctx`, skipping queue entries whose
    /// pages are no longer resident.
    fn evict_oldest(&self, ctx: &mut MmContext, ram: &mut MemoryDevice) -> Result<(), MmError> {
        let (slot, swap) = self.active_swap_device()?;
        while let Some(&victim) = ctx.fifo.front() {
            match self.evict_locked(ctx, ram, slot, swap, victim) {
                Ok(_) => return Ok(()),
                Err(MmError::TranslationMiss) => {
                    ctx.fifo.pop_front();
                }
                Err(e) => return Err(e),
            }
        }
        Err(MmError::OutOfFrames)
    }

    fn obtain_frame(
        &self,
        ctx: &mut MmContext,
        ram: &mut MemoryDevice,
    ) -> Result<FrameNumber, MmError> {
        match ram.acquire_frame() {
            Ok(frame) => Ok(frame),
            Err(DeviceError::OutOfFrames) => {
                self.evict_oldest(ctx, ram)?;
                Ok(ram.acquire_frame()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn swap_in_locked(
        &self,
        ctx: &mut MmContext,
        ram: &mut MemoryDevice,
        page: PageNumber,
    ) -> Result<FrameNumber, MmError> {
        let EntryState::Swapped { swap_type, offset } =
            self.leaf_entry(&ctx.space, ram, page)?.state()
        else {
            return Err(MmError::TranslationMiss);
        };
        let source = self.swap_device(usize::from(swap_type))?;
        let swap_frame = FrameNumber::new(offset);

        let frame = self.obtain_frame(ctx, ram)?;
        let mapped = give_back(ram, frame, PageTableEntry::mapped(frame))?;

        let mut swap = source.lock();
        let copied = copy_page(&mut swap, swap_frame, ram, frame);
        give_back(ram, frame, copied)?;
        let written = ctx
            .space
            .set_entry(&mut TableMemory::new(ram, &self.stats), page, mapped);
        give_back(ram, frame, written)?;
        swap.release_frame(swap_frame)?;
        drop(swap);

        ctx.fifo.push_back(page);
        self.stats.record_swap_in();
        debug!(
            "pid {}: page {page} back in frame {frame} from swap {swap_type}:{offset}",
            ctx.pid()
        );
        Ok(frame)
    }
}

/// Release `frame` back to RAM if `result` failed.
fn give_back<T, E: Into<MmError>>(
    ram: &mut MemoryDevice,
    frame: FrameNumber,
    result: Result<T, E>,
) -> Result<T, MmError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            ram.release_frame(frame)?;
            Err(e.into())
        }
    }
}

fn reserve_one(
    space: &AddressSpace,
    tables: &mut TableMemory<'_>,
    page: PageNumber,
) -> Result<(), MmError> {
    let slot = space.leaf_slot(tables, page, true)?;
    if tables.read_entry(slot)?.is_present() {
        let base = page.base().as_u64();
        return Err(MmError::OverlapDetected(MemoryRegion::new(base, base + PAGE_SIZE)));
    }
    Ok(space.reserve(tables, page)?)
}
