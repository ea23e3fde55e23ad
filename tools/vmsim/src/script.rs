//! Process scripts: one memory operation per line.
//!
//! | Line | Effect |
//! |------|--------|
//! | `inc <vma> <bytes>` | grow an area (memmap `INC`) |
//! | `map <vaddr> <pages>` | reserve pages (memmap `MAP`) |
//! | `swap <ram_frame> <swap_frame>` | copy a frame to swap (memmap `SWAP`) |
//! | `ioread <paddr>` | read a RAM byte (memmap `IO_READ`) |
//! | `iowrite <paddr> <value>` | write a RAM byte (memmap `IO_WRITE`) |
//! | `read <vaddr>` | read through the page tables |
//! | `write <vaddr> <value>` | write through the page tables |
//! | `evict <vaddr>` | push the page holding `vaddr` out to swap |
//! | `area <vaddr>` | add an empty area starting at `vaddr` |
//! | `swapdev <slot>` | send future evictions to swap slot `slot` |
//! | `alloc <vma> <sym> <bytes>` | grow an area and name the new bytes `sym` |
//! | `load <sym> <offset>` | read byte `offset` of symbol `sym` |
//! | `store <sym> <offset> <value>` | write byte `offset` of symbol `sym` |

use crate::config::parse_number;
use kernel_memory_addresses::VirtualAddress;
use kernel_mm::{MemoryRegion, MemorySystem, MmContext, MmError};
use kernel_syscall::{MemOp, SyscallError, SyscallRegs, sys_memmap};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: unknown instruction `{op}`")]
    UnknownInstruction { line: usize, op: String },
    #[error("line {line}: `{op}` takes {expected} arguments")]
    Arity {
        line: usize,
        op: &'static str,
        expected: usize,
    },
    #[error("line {line}: `{token}` is not a valid argument")]
    BadArgument { line: usize, token: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Syscall(#[from] SyscallError),
    #[error(transparent)]
    Mm(#[from] MmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Inc { vma: u64, bytes: u64 },
    Map { addr: u64, pages: u64 },
    Swap { victim: u64, slot: u64 },
    IoRead { addr: u64 },
    IoWrite { addr: u64, value: u64 },
    Read { addr: VirtualAddress },
    Write { addr: VirtualAddress, value: u8 },
    Evict { addr: VirtualAddress },
    Area { start: VirtualAddress },
    SwapDev { slot: usize },
    Alloc { vma: usize, sym: usize, bytes: u64 },
    Load { sym: usize, offset: u64 },
    Store { sym: usize, offset: u64, value: u8 },
}

impl Instruction {
    /// Run the instruction for `ctx`. Reads yield the byte they fetched.
    ///
    /// # Errors
    /// The error of the underlying memory operation.
    pub fn execute(
        self,
        system: &MemorySystem,
        ctx: &mut MmContext,
    ) -> Result<Option<u8>, ExecError> {
        let memmap = |ctx: &mut MmContext, op, a2, a3| {
            let mut regs = SyscallRegs::new(op, a2, a3);
            sys_memmap(system, ctx, &mut regs).map(|()| regs)
        };

        let fetched = match self {
            Self::Inc { vma, bytes } => {
                memmap(ctx, MemOp::Inc, vma, bytes)?;
                None
            }
            Self::Map { addr, pages } => {
                memmap(ctx, MemOp::Map, addr, pages)?;
                None
            }
            Self::Swap { victim, slot } => {
                memmap(ctx, MemOp::Swap, victim, slot)?;
                None
            }
            Self::IoRead { addr } => {
                let [byte, ..] = memmap(ctx, MemOp::IoRead, addr, 0)?.a3.to_le_bytes();
                Some(byte)
            }
            Self::IoWrite { addr, value } => {
                memmap(ctx, MemOp::IoWrite, addr, value)?;
                None
            }
            Self::Read { addr } => Some(system.read_virtual(ctx, addr)?),
            Self::Write { addr, value } => {
                system.write_virtual(ctx, addr, value)?;
                None
            }
            Self::Evict { addr } => {
                system.evict_page(ctx, addr.page())?;
                None
            }
            Self::Area { start } => {
                ctx.add_area(start)?;
                None
            }
            Self::SwapDev { slot } => {
                system.select_swap(slot)?;
                None
            }
            Self::Alloc { vma, sym, bytes } => {
                let start = system.grow(ctx, vma, bytes)?.start().as_u64();
                ctx.set_symbol(sym, MemoryRegion::new(start, start + bytes))?;
                None
            }
            Self::Load { sym, offset } => {
                let addr = symbol_byte(ctx, sym, offset)?;
                Some(system.read_virtual(ctx, addr)?)
            }
            Self::Store { sym, offset, value } => {
                let addr = symbol_byte(ctx, sym, offset)?;
                system.write_virtual(ctx, addr, value)?;
                None
            }
        };
        Ok(fetched)
    }
}

/// Address of byte `offset` inside symbol `sym`.
fn symbol_byte(ctx: &MmContext, sym: usize, offset: u64) -> Result<VirtualAddress, MmError> {
    let region = ctx.symbol(sym)?;
    let start = region.start().as_u64();
    match start.checked_add(offset).map(VirtualAddress::new) {
        Some(addr) if region.contains(addr) => Ok(addr),
        _ => Err(MmError::InvalidRange {
            start,
            end: region.end().as_u64(),
        }),
    }
}

/// Parse a whole script. Blank lines and `#` comments are skipped.
///
/// # Errors
/// The first [`ScriptError`] encountered.
pub fn parse_script(text: &str) -> Result<Vec<Instruction>, ScriptError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let code = line.split_once('#').map_or(line, |(code, _)| code).trim();
            (!code.is_empty()).then_some((i + 1, code))
        })
        .map(|(line, code)| parse_line(line, code))
        .collect()
}

fn parse_line(line: usize, code: &str) -> Result<Instruction, ScriptError> {
    let mut tokens = code.split_whitespace();
    let op = tokens.next().unwrap_or_default();
    let args = tokens
        .map(|token| {
            parse_number(token).ok_or_else(|| ScriptError::BadArgument {
                line,
                token: token.to_owned(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let arity = |op: &'static str, expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ScriptError::Arity { line, op, expected })
        }
    };
    let vaddr = |i: usize| VirtualAddress::new(args[i]);
    let index = |i: usize| {
        usize::try_from(args[i]).map_err(|_| ScriptError::BadArgument {
            line,
            token: args[i].to_string(),
        })
    };
    let byte = |i: usize| {
        u8::try_from(args[i]).map_err(|_| ScriptError::BadArgument {
            line,
            token: args[i].to_string(),
        })
    };

    Ok(match op {
        "inc" => {
            arity("inc", 2)?;
            Instruction::Inc {
                vma: args[0],
                bytes: args[1],
            }
        }
        "map" => {
            arity("map", 2)?;
            Instruction::Map {
                addr: args[0],
                pages: args[1],
            }
        }
        "swap" => {
            arity("swap", 2)?;
            Instruction::Swap {
                victim: args[0],
                slot: args[1],
            }
        }
        "ioread" => {
            arity("ioread", 1)?;
            Instruction::IoRead { addr: args[0] }
        }
        "iowrite" => {
            arity("iowrite", 2)?;
            Instruction::IoWrite {
                addr: args[0],
                value: args[1],
            }
        }
        "read" => {
            arity("read", 1)?;
            Instruction::Read { addr: vaddr(0) }
        }
        "write" => {
            arity("write", 2)?;
            Instruction::Write {
                addr: vaddr(0),
                value: byte(1)?,
            }
        }
        "evict" => {
            arity("evict", 1)?;
            Instruction::Evict { addr: vaddr(0) }
        }
        "area" => {
            arity("area", 1)?;
            Instruction::Area { start: vaddr(0) }
        }
        "swapdev" => {
            arity("swapdev", 1)?;
            Instruction::SwapDev { slot: index(0)? }
        }
        "alloc" => {
            arity("alloc", 3)?;
            Instruction::Alloc {
                vma: index(0)?,
                sym: index(1)?,
                bytes: args[2],
            }
        }
        "load" => {
            arity("load", 2)?;
            Instruction::Load {
                sym: index(0)?,
                offset: args[1],
            }
        }
        "store" => {
            arity("store", 3)?;
            Instruction::Store {
                sym: index(0)?,
                offset: args[1],
                value: byte(2)?,
            }
        }
        _ => {
            return Err(ScriptError::UnknownInstruction {
                line,
                op: op.to_owned(),
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::PAGE_SIZE;
    use kernel_memphy::{MemoryDevice, share};
    use kernel_vmem::PagingMode;

    #[test]
    fn parses_every_instruction() {
        let script = "\
            # grow, touch, push out
            inc 0 0x2000
            write 0x10 7
            read 0x10     # comment after code
            evict 0x10
            map 0x400000 2
            swap 1 0
            iowrite 0x20 0xFF
            ioread 0x20
            area 0x100000
            swapdev 1
            alloc 1 3 100
            store 3 4 9
            load 3 4
        ";
        let code = parse_script(script).unwrap();
        assert_eq!(
            code,
            [
                Instruction::Inc {
                    vma: 0,
                    bytes: 0x2000
                },
                Instruction::Write {
                    addr: VirtualAddress::new(0x10),
                    value: 7
                },
                Instruction::Read {
                    addr: VirtualAddress::new(0x10)
                },
                Instruction::Evict {
                    addr: VirtualAddress::new(0x10)
                },
                Instruction::Map {
                    addr: 0x40_0000,
                    pages: 2
                },
                Instruction::Swap { victim: 1, slot: 0 },
                Instruction::IoWrite {
                    addr: 0x20,
                    value: 0xFF
                },
                Instruction::IoRead { addr: 0x20 },
                Instruction::Area {
                    start: VirtualAddress::new(0x10_0000)
                },
                Instruction::SwapDev { slot: 1 },
                Instruction::Alloc {
                    vma: 1,
                    sym: 3,
                    bytes: 100
                },
                Instruction::Store {
                    sym: 3,
                    offset: 4,
                    value: 9
                },
                Instruction::Load { sym: 3, offset: 4 },
            ]
        );
    }

    #[test]
    fn reports_bad_lines() {
        assert_eq!(
            parse_script("inc 0 1\nfree 1\n"),
            Err(ScriptError::UnknownInstruction {
                line: 2,
                op: "free".into()
            })
        );
        assert_eq!(
            parse_script("read 1 2"),
            Err(ScriptError::Arity {
                line: 1,
                op: "read",
                expected: 1
            })
        );
        assert_eq!(
            parse_script("write 0 256"),
            Err(ScriptError::BadArgument {
                line: 1,
                token: "256".into()
            })
        );
        assert_eq!(
            parse_script("inc zero 1"),
            Err(ScriptError::BadArgument {
                line: 1,
                token: "zero".into()
            })
        );
    }

    #[test]
    fn executes_against_a_memory_system() {
        let mut system = MemorySystem::new(
            share(MemoryDevice::with_frames(32).unwrap()),
            PagingMode::FiveLevel,
        );
        system
            .attach_swap(0, share(MemoryDevice::with_frames(4).unwrap()))
            .unwrap();
        let mut ctx = system.create_context().unwrap();

        let code = parse_script("inc 0 8192\nwrite 0x1008 42\nevict 0x1000\nread 0x1008\n").unwrap();
        let results = code
            .into_iter()
            .map(|instruction| instruction.execute(&system, &mut ctx).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(results, [None, None, None, Some(42)]);
        assert_eq!(system.stats().snapshot().page_faults, 1);

        let err = Instruction::Read {
            addr: VirtualAddress::new(4 * PAGE_SIZE),
        }
        .execute(&system, &mut ctx)
        .unwrap_err();
        assert!(matches!(err, ExecError::Mm(MmError::TranslationMiss)));
    }

    #[test]
    fn symbols_name_allocated_bytes() {
        let mut system = MemorySystem::new(
            share(MemoryDevice::with_frames(32).unwrap()),
            PagingMode::FiveLevel,
        );
        for slot in 0..2 {
            system
                .attach_swap(slot, share(MemoryDevice::with_frames(4).unwrap()))
                .unwrap();
        }
        let mut ctx = system.create_context().unwrap();

        let code = parse_script(
            "area 0x100000\nalloc 1 2 300\nstore 2 299 0x2A\nswapdev 1\nevict 0x100000\nload 2 299\n",
        )
        .unwrap();
        let results = code
            .into_iter()
            .map(|instruction| instruction.execute(&system, &mut ctx).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(results, [None, None, None, None, None, Some(0x2A)]);
        assert_eq!(ctx.symbol(2), Ok(MemoryRegion::new(0x10_0000, 0x10_0000 + 300)));
        assert_eq!(system.active_swap(), Some(1));
        assert_eq!(system.stats().snapshot().swap_in, 1);

        let err = Instruction::Load { sym: 2, offset: 300 }
            .execute(&system, &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            ExecError::Mm(MmError::InvalidRange {
                start: 0x10_0000,
                ..
            })
        ));
        let err = Instruction::Area {
            start: VirtualAddress::new(0x20_0800),
        }
        .execute(&system, &mut ctx)
        .unwrap_err();
        assert!(matches!(err, ExecError::Mm(MmError::InvalidRange { .. })));
        let err = Instruction::SwapDev { slot: 3 }
            .execute(&system, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ExecError::Mm(MmError::DeviceUnavailable)));
    }
}
