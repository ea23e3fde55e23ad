use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
use kernel_memphy::{DeviceError, MemoryDevice};
use log::trace;

/// Location of a page on a swap device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSlot {
    /// Swap device slot (0..4).
    pub device: u8,
    pub frame: FrameNumber,
}

/// Copy one page from frame `src_frame` of `src` to frame `dst_frame` of `dst`.
///
/// Both frames are range-checked before the first byte moves, so a failed
/// copy leaves the destination untouched.
///
/// # Errors
/// [`DeviceError::FrameOutOfRange`] if either frame lies outside its device.
pub fn copy_page(
    src: &mut MemoryDevice,
    src_frame: FrameNumber,
    dst: &mut MemoryDevice,
    dst_frame: FrameNumber,
) -> Result<(), DeviceError> {
    let from = src.frame_base(src_frame)?;
    let to = dst.frame_base(dst_frame)?;
    for i in 0..PAGE_SIZE {
        let byte = src.read(from + i)?;
        dst.write(to + i, byte)?;
    }
    trace!("copied frame {src_frame} to frame {dst_frame}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn copies_every_byte() {
        let mut ram = MemoryDevice::with_frames(4).unwrap();
        let mut swap = MemoryDevice::with_frames(4).unwrap();
        let base = FrameNumber::new(1).base();
        for i in 0..PAGE_SIZE {
            ram.write(base + i, (i % 251) as u8).unwrap();
        }

        copy_page(&mut ram, FrameNumber::new(1), &mut swap, FrameNumber::new(3)).unwrap();

        let dst = FrameNumber::new(3).base();
        for i in 0..PAGE_SIZE {
            assert_eq!(swap.read(dst + i).unwrap(), (i % 251) as u8);
        }
    }

    #[test]
    fn rejects_frames_outside_either_device() {
        let mut ram = MemoryDevice::with_frames(4).unwrap();
        let mut swap = MemoryDevice::with_frames(2).unwrap();
        ram.write(FrameNumber::new(0).base(), 7).unwrap();

        assert_eq!(
            copy_page(&mut ram, FrameNumber::new(0), &mut swap, FrameNumber::new(2)),
            Err(DeviceError::FrameOutOfRange(FrameNumber::new(2)))
        );
        assert_eq!(
            copy_page(&mut ram, FrameNumber::new(4), &mut swap, FrameNumber::new(0)),
            Err(DeviceError::FrameOutOfRange(FrameNumber::new(4)))
        );
        assert_eq!(swap.read(FrameNumber::new(0).base()).unwrap(), 0);
    }
}
