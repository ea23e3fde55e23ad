use core::fmt;

/// Number of leading device bytes shown by [`Dump`].
pub const DUMP_BYTES: usize = 256;

const BYTES_PER_LINE: usize = 16;

/// Hex dump of the first [`DUMP_BYTES`] bytes of a device.
///
/// ```text
/// 00000000: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F
/// 00000010: ...
/// ```
pub struct Dump<'a> {
    bytes: &'a [u8],
}

impl<'a> Dump<'a> {
    pub(crate) fn new(storage: &'a [u8]) -> Self {
        let len = storage.len().min(DUMP_BYTES);
        Self {
            bytes: &storage[..len],
        }
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, chunk) in self.bytes.chunks(BYTES_PER_LINE).enumerate() {
            write!(f, "{:08X}:", line * BYTES_PER_LINE)?;
            for byte in chunk {
                write!(f, " {byte:02X}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::MemoryDevice;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn dump_shows_sixteen_lines() {
        let mut dev = MemoryDevice::with_frames(1).unwrap();
        dev.write(PhysicalAddress::new(0x11), 0xAB).unwrap();

        let text = dev.dump().to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(
            lines[1],
            "00000010: 00 AB 00 00 00 00 00 00 00 00 00 00 00 00 00 00"
        );
        assert!(lines[15].starts_with("000000F0:"));
    }
}
