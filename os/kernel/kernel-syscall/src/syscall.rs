use crate::SyscallError;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_mm::{MemorySystem, MmContext};
use log::{trace, warn};

/// Operation selector carried in `a1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MemOp {
    /// Reserve `a3` pages at page-aligned virtual address `a2`.
    Map = 1,
    /// Grow area `a2` by `a3` bytes.
    Inc = 2,
    /// Copy RAM frame `a2` to frame `a3` of the active swap device.
    Swap = 3,
    /// Read the RAM byte at `a2` into `a3`.
    IoRead = 4,
    /// Write the low byte of `a3` to RAM address `a2`.
    IoWrite = 5,
}

impl TryFrom<u64> for MemOp {
    type Error = SyscallError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(match value {
            x if x == Self::Map as u64 => Self::Map,
            x if x == Self::Inc as u64 => Self::Inc,
            x if x == Self::Swap as u64 => Self::Swap,
            x if x == Self::IoRead as u64 => Self::IoRead,
            x if x == Self::IoWrite as u64 => Self::IoWrite,
            _ => return Err(SyscallError::UnknownSyscall(value)),
        })
    }
}

/// Argument registers of one `memmap` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SyscallRegs {
    pub a1: u64,
    pub a2: u64,
    pub a3: u64,
}

impl SyscallRegs {
    #[must_use]
    pub const fn new(op: MemOp, a2: u64, a3: u64) -> Self {
        Self {
            a1: op as u64,
            a2,
            a3,
        }
    }
}

/// Execute the `memmap` call described by `regs` on behalf of `ctx`.
///
/// Only [`MemOp::IoRead`] writes back into `regs`.
///
/// # Errors
/// [`SyscallError::UnknownSyscall`] for an unknown selector,
/// [`SyscallError::BadArgument`] for an argument that does not fit its
/// type, and the error of the memory operation otherwise.
pub fn sys_memmap(
    system: &MemorySystem,
    ctx: &mut MmContext,
    regs: &mut SyscallRegs,
) -> Result<(), SyscallError> {
    let op = MemOp::try_from(regs.a1)?;
    trace!("pid {}: memmap {op:?} a2={:#x} a3={:#x}", ctx.pid(), regs.a2, regs.a3);

    let result = match op {
        MemOp::Map => {
            let pages = usize::try_from(regs.a3).map_err(|_| bad("a3", regs.a3))?;
            system.reserve_pages(ctx, VirtualAddress::new(regs.a2), pages)
        }
        MemOp::Inc => {
            let id = usize::try_from(regs.a2).map_err(|_| bad("a2", regs.a2))?;
            system.grow(ctx, id, regs.a3).map(|_| ())
        }
        MemOp::Swap => {
            let victim = u32::try_from(regs.a2).map_err(|_| bad("a2", regs.a2))?;
            let slot = u32::try_from(regs.a3).map_err(|_| bad("a3", regs.a3))?;
            system.swap_out(FrameNumber::new(victim), FrameNumber::new(slot))
        }
        MemOp::IoRead => system
            .io_read(PhysicalAddress::new(regs.a2))
            .map(|byte| regs.a3 = u64::from(byte)),
        MemOp::IoWrite => {
            let [byte, ..] = regs.a3.to_le_bytes();
            system.io_write(PhysicalAddress::new(regs.a2), byte)
        }
    };

    result.map_err(|e| {
        warn!("pid {}: memmap {op:?} failed: {e}", ctx.pid());
        e.into()
    })
}

const fn bad(register: &'static str, value: u64) -> SyscallError {
    SyscallError::BadArgument { register, value }
}
