use alloc::vec::Vec;
use kernel_memory_addresses::FrameNumber;
use kernel_memphy::{DeviceError, MemoryDevice};
use log::trace;

/// Frames obtained by one allocation, in acquisition order.
///
/// A list is consumed by exactly one mapping attempt: its frames either end
/// up bound to pages or are handed back with [`FrameList::release`].
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use = "frames leak unless they are mapped or released"]
pub struct FrameList {
    frames: Vec<FrameNumber>,
}

impl FrameList {
    /// Take up to `count` frames; stops quietly at the first failure.
    pub fn allocate(device: &mut MemoryDevice, count: usize) -> Self {
        let mut frames = Vec::with_capacity(count.min(device.free_frames()));
        while frames.len() < count {
            match device.acquire_frame() {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    trace!("frame allocation stopped after {} of {count}: {e}", frames.len());
                    break;
                }
            }
        }
        Self { frames }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[FrameNumber] {
        &self.frames
    }

    /// Return every frame to `device`, newest first.
    ///
    /// # Errors
    /// Device errors if a frame was already released elsewhere.
    pub fn release(self, device: &mut MemoryDevice) -> Result<(), DeviceError> {
        for frame in self.frames.into_iter().rev() {
            device.release_frame(frame)?;
        }
        Ok(())
    }

    /// Hand ownership of the frames to the page tables.
    pub fn commit(self) {
        trace!("committed {} frames to the page tables", self.frames.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_allocation_keeps_what_it_got() {
        let mut dev = MemoryDevice::with_frames(3).unwrap();
        let list = FrameList::allocate(&mut dev, 5);
        assert_eq!(list.len(), 3);
        assert_eq!(dev.free_frames(), 0);
        list.release(&mut dev).unwrap();
        assert_eq!(dev.free_frames(), 3);
    }

    #[test]
    fn release_restores_the_stack_order() {
        let mut dev = MemoryDevice::with_frames(6).unwrap();
        let first = FrameList::allocate(&mut dev, 4);
        let taken = first.as_slice().to_vec();
        first.release(&mut dev).unwrap();

        let again = FrameList::allocate(&mut dev, 4);
        assert_eq!(again.as_slice(), taken.as_slice());
        again.commit();
    }
}
