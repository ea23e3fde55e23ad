//! # Memory System Calls
//!
//! The single `memmap` system call through which simulated processes reach
//! the memory system. A call is described by three registers: `a1` selects
//! the operation, `a2` and `a3` carry its arguments.
//!
//! | `a1` | Operation | `a2` | `a3` |
//! |------|-----------|------|------|
//! | 1 | [`MemOp::Map`] | virtual address | page count |
//! | 2 | [`MemOp::Inc`] | area id | byte count |
//! | 3 | [`MemOp::Swap`] | RAM frame | swap frame |
//! | 4 | [`MemOp::IoRead`] | RAM address | receives the byte |
//! | 5 | [`MemOp::IoWrite`] | RAM address | byte to write |
//!
//! ```rust
//! # use kernel_memphy::{MemoryDevice, share};
//! # use kernel_mm::MemorySystem;
//! # use kernel_syscall::{MemOp, SyscallRegs, sys_memmap};
//! # use kernel_vmem::PagingMode;
//! let system = MemorySystem::new(share(MemoryDevice::with_frames(16).unwrap()), PagingMode::Flat);
//! let mut ctx = system.create_context().unwrap();
//!
//! let mut write = SyscallRegs::new(MemOp::IoWrite, 0x42, 0xEE);
//! sys_memmap(&system, &mut ctx, &mut write).unwrap();
//!
//! let mut read = SyscallRegs::new(MemOp::IoRead, 0x42, 0);
//! sys_memmap(&system, &mut ctx, &mut read).unwrap();
//! assert_eq!(read.a3, 0xEE);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod syscall;

pub use crate::syscall::{MemOp, SyscallRegs, sys_memmap};

use kernel_mm::MmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("unknown memmap operation {0}")]
    UnknownSyscall(u64),
    #[error("register {register} holds unusable value {value:#x}")]
    BadArgument { register: &'static str, value: u64 },
    #[error(transparent)]
    Mm(#[from] MmError),
}
