use crate::{DeviceError, Dump};
use alloc::vec;
use alloc::vec::Vec;
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, PhysicalAddress};
use log::{debug, trace};

/// How bytes of a [`MemoryDevice`] are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Random,
    Sequential,
}

/// Byte-addressable device with frame-granular allocation.
pub struct MemoryDevice {
    storage: Vec<u8>,
    mode: AccessMode,
    /// Tape head of a sequential device.
    cursor: usize,
    /// Free stack; the top is the next frame handed out.
    free: Vec<FrameNumber>,
    in_use: Vec<bool>,
}

impl MemoryDevice {
    /// Create a zero-filled device of `capacity` bytes and format it.
    ///
    /// # Errors
    /// [`DeviceError::NoFrames`] if `capacity` is smaller than one page.
    pub fn new(capacity: u64, mode: AccessMode) -> Result<Self, DeviceError> {
        let len = usize::try_from(capacity).map_err(|_| DeviceError::NoFrames)?;
        let mut device = Self {
            storage: vec![0; len],
            mode,
            cursor: 0,
            free: Vec::new(),
            in_use: Vec::new(),
        };
        device.format()?;
        Ok(device)
    }

    /// Create a random-access device holding exactly `frames` frames.
    ///
    /// # Errors
    /// [`DeviceError::NoFrames`] if `frames` is zero.
    pub fn with_frames(frames: u32) -> Result<Self, DeviceError> {
        Self::new(u64::from(frames) * PAGE_SIZE, AccessMode::Random)
    }

    /// Mark every frame free. Frame 0 becomes the top of the free stack.
    ///
    /// Contents are left untouched.
    ///
    /// # Errors
    /// [`DeviceError::NoFrames`] if the device holds no whole frame.
    pub fn format(&mut self) -> Result<(), DeviceError> {
        let frames = self.frame_count();
        if frames == 0 {
            return Err(DeviceError::NoFrames);
        }

        self.free.clear();
        self.free.extend((0..frames).rev().map(FrameNumber::new));
        self.in_use.clear();
        self.in_use.resize(frames as usize, false);

        debug!("formatted device: {} bytes, {frames} frames", self.capacity());
        Ok(())
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Size of the device in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.storage.len() as u64
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frame_count(&self) -> u32 {
        (self.capacity() / PAGE_SIZE) as u32
    }

    #[inline]
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.free.len()
    }

    #[inline]
    #[must_use]
    pub fn used_frames(&self) -> usize {
        self.in_use.len() - self.free.len()
    }

    /// First byte of `frame`.
    ///
    /// # Errors
    /// [`DeviceError::FrameOutOfRange`] if the frame is past the end.
    pub fn frame_base(&self, frame: FrameNumber) -> Result<PhysicalAddress, DeviceError> {
        if frame.as_u32() >= self.frame_count() {
            return Err(DeviceError::FrameOutOfRange(frame));
        }
        Ok(frame.base())
    }

    /// Pop the top of the free stack.
    ///
    /// # Errors
    /// [`DeviceError::OutOfFrames`] if no frame is free.
    pub fn acquire_frame(&mut self) -> Result<FrameNumber, DeviceError> {
        let frame = self.free.pop().ok_or(DeviceError::OutOfFrames)?;
        self.in_use[frame.as_usize()] = true;
        trace!("acquired frame {frame}");
        Ok(frame)
    }

    /// Push `frame` back onto the free stack.
    ///
    /// # Errors
    /// [`DeviceError::FrameOutOfRange`] for frames past the end,
    /// [`DeviceError::FrameNotInUse`] for frames that are already free.
    pub fn release_frame(&mut self, frame: FrameNumber) -> Result<(), DeviceError> {
        let Some(used) = self.in_use.get_mut(frame.as_usize()) else {
            return Err(DeviceError::FrameOutOfRange(frame));
        };
        if !*used {
            return Err(DeviceError::FrameNotInUse(frame));
        }
        *used = false;
        self.free.push(frame);
        trace!("released frame {frame}");
        Ok(())
    }

    /// Fill `frame` with zero bytes.
    ///
    /// # Errors
    /// [`DeviceError::FrameOutOfRange`] if the frame is past the end.
    pub fn zero_frame(&mut self, frame: FrameNumber) -> Result<(), DeviceError> {
        let base = self.frame_base(frame)?;
        for offset in 0..PAGE_SIZE {
            self.write(base + offset, 0)?;
        }
        Ok(())
    }

    /// Read one byte.
    ///
    /// # Errors
    /// [`DeviceError::AddressOutOfRange`] if `addr` is past the end.
    pub fn read(&mut self, addr: PhysicalAddress) -> Result<u8, DeviceError> {
        let index = self.locate(addr)?;
        let value = self.storage[index];
        trace!("read {addr} -> 0x{value:02X}");
        Ok(value)
    }

    /// Write one byte.
    ///
    /// # Errors
    /// [`DeviceError::AddressOutOfRange`] if `addr` is past the end.
    pub fn write(&mut self, addr: PhysicalAddress, value: u8) -> Result<(), DeviceError> {
        let index = self.locate(addr)?;
        self.storage[index] = value;
        trace!("write {addr} <- 0x{value:02X}");
        Ok(())
    }

    /// Hex view of the first bytes of the device.
    #[must_use]
    pub fn dump(&self) -> Dump<'_> {
        Dump::new(&self.storage)
    }

    /// Resolve `addr` to a storage index, moving the tape head if needed.
    fn locate(&mut self, addr: PhysicalAddress) -> Result<usize, DeviceError> {
        let index = usize::try_from(addr.as_u64())
            .ok()
            .filter(|&i| i < self.storage.len())
            .ok_or(DeviceError::AddressOutOfRange(addr))?;

        match self.mode {
            AccessMode::Random => Ok(index),
            AccessMode::Sequential => {
                let len = self.storage.len();
                self.cursor = 0;
                for _ in 0..index {
                    self.cursor = (self.cursor + 1) % len;
                }
                Ok(self.cursor)
            }
        }
    }
}

impl core::fmt::Debug for MemoryDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryDevice")
            .field("capacity", &self.capacity())
            .field("mode", &self.mode)
            .field("free_frames", &self.free_frames())
            .field("used_frames", &self.used_frames())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hands_out_frames_in_ascending_order() {
        let mut dev = MemoryDevice::with_frames(4).unwrap();
        let got: Vec<_> = (0..4).map(|_| dev.acquire_frame().unwrap()).collect();
        assert_eq!(got, (0..4).map(FrameNumber::new).collect::<Vec<_>>());
        assert_eq!(dev.acquire_frame(), Err(DeviceError::OutOfFrames));
    }

    #[test]
    fn release_pushes_to_the_top() {
        let mut dev = MemoryDevice::with_frames(4).unwrap();
        let a = dev.acquire_frame().unwrap();
        let b = dev.acquire_frame().unwrap();
        dev.release_frame(a).unwrap();
        assert_eq!(dev.acquire_frame().unwrap(), a);
        dev.release_frame(b).unwrap();
        assert_eq!(dev.acquire_frame().unwrap(), b);
    }

    #[test]
    fn frames_are_conserved() {
        let mut dev = MemoryDevice::with_frames(8).unwrap();
        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(dev.acquire_frame().unwrap());
            assert_eq!(dev.free_frames() + dev.used_frames(), 8);
        }
        for f in held.into_iter().rev() {
            dev.release_frame(f).unwrap();
            assert_eq!(dev.free_frames() + dev.used_frames(), 8);
        }
        assert_eq!(dev.used_frames(), 0);
    }

    #[test]
    fn double_free_and_out_of_range_are_rejected() {
        let mut dev = MemoryDevice::with_frames(2).unwrap();
        let f = dev.acquire_frame().unwrap();
        dev.release_frame(f).unwrap();
        assert_eq!(dev.release_frame(f), Err(DeviceError::FrameNotInUse(f)));

        let far = FrameNumber::new(2);
        assert_eq!(dev.release_frame(far), Err(DeviceError::FrameOutOfRange(far)));
        assert_eq!(dev.free_frames(), 2);
    }

    #[test]
    fn undersized_device_has_no_frames() {
        assert_eq!(
            MemoryDevice::new(PAGE_SIZE - 1, AccessMode::Random).err(),
            Some(DeviceError::NoFrames)
        );
        assert_eq!(MemoryDevice::with_frames(0).err(), Some(DeviceError::NoFrames));
    }

    #[test]
    fn access_past_capacity_fails() {
        let mut dev = MemoryDevice::with_frames(1).unwrap();
        let end = PhysicalAddress::new(PAGE_SIZE);
        assert_eq!(dev.read(end), Err(DeviceError::AddressOutOfRange(end)));
        assert_eq!(dev.write(end, 1), Err(DeviceError::AddressOutOfRange(end)));
        assert!(dev.write(PhysicalAddress::new(u64::MAX), 1).is_err());
    }

    #[test]
    fn sequential_device_sees_the_same_bytes() {
        let mut seq = MemoryDevice::new(2 * PAGE_SIZE, AccessMode::Sequential).unwrap();
        let mut rnd = MemoryDevice::new(2 * PAGE_SIZE, AccessMode::Random).unwrap();
        for (i, addr) in [0u64, 1, 4095, 4096, 8191].into_iter().enumerate() {
            let pa = PhysicalAddress::new(addr);
            let value = u8::try_from(i + 1).unwrap();
            seq.write(pa, value).unwrap();
            rnd.write(pa, value).unwrap();
        }
        for addr in 0..2 * PAGE_SIZE {
            let pa = PhysicalAddress::new(addr);
            assert_eq!(seq.read(pa).unwrap(), rnd.read(pa).unwrap());
        }
    }

    #[test]
    fn zero_frame_clears_only_that_frame() {
        let mut dev = MemoryDevice::with_frames(2).unwrap();
        dev.write(PhysicalAddress::new(10), 0xFF).unwrap();
        dev.write(PhysicalAddress::new(PAGE_SIZE + 10), 0xEE).unwrap();
        dev.zero_frame(FrameNumber::new(0)).unwrap();
        assert_eq!(dev.read(PhysicalAddress::new(10)).unwrap(), 0);
        assert_eq!(dev.read(PhysicalAddress::new(PAGE_SIZE + 10)).unwrap(), 0xEE);
        assert!(dev.zero_frame(FrameNumber::new(2)).is_err());
    }
}
