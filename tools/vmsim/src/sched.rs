//! Round-robin scheduling of process scripts over simulated CPUs.
//!
//! Each CPU is a thread. Processes are admitted once the simulation clock
//! reaches their start time; a CPU runs a process for one time slice, then
//! puts it back at the end of the ready queue.

use crate::script::Instruction;
use kernel_mm::{MemorySystem, MmContext};
use kernel_sync::SpinMutex;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

/// A program waiting for its start time.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub start_time: u64,
    pub code: Vec<Instruction>,
}

#[derive(Debug)]
struct Process {
    name: String,
    ctx: MmContext,
    code: Vec<Instruction>,
    pc: usize,
}

impl Process {
    fn is_finished(&self) -> bool {
        self.pc == self.code.len()
    }

    fn step(&mut self, system: &MemorySystem, cpu: usize) {
        let instruction = self.code[self.pc];
        self.pc += 1;
        match instruction.execute(system, &mut self.ctx) {
            Ok(Some(byte)) => info!(
                "CPU {cpu}: process {} {instruction:?} -> {byte:#04x}",
                self.ctx.pid()
            ),
            Ok(None) => debug!("CPU {cpu}: process {} {instruction:?}", self.ctx.pid()),
            Err(e) => warn!(
                "CPU {cpu}: process {} {instruction:?} failed: {e}",
                self.ctx.pid()
            ),
        }
    }
}

#[derive(Debug, Default)]
struct Queues {
    pending: VecDeque<Program>,
    ready: VecDeque<Process>,
    running: usize,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub finished: usize,
    /// Programs dropped because their memory context could not be created.
    pub rejected: usize,
    /// Final value of the simulation clock.
    pub ticks: u64,
}

pub struct Scheduler<'a> {
    system: &'a MemorySystem,
    time_slice: u32,
    clock: AtomicU64,
    finished: AtomicUsize,
    rejected: AtomicUsize,
    queues: SpinMutex<Queues>,
}

impl<'a> Scheduler<'a> {
    #[must_use]
    pub fn new(system: &'a MemorySystem, time_slice: u32, mut programs: Vec<Program>) -> Self {
        programs.sort_by_key(|p| p.start_time);
        Self {
            system,
            time_slice,
            clock: AtomicU64::new(0),
            finished: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            queues: SpinMutex::new(Queues {
                pending: programs.into(),
                ..Queues::default()
            }),
        }
    }

    /// Run every program to completion on `cpus` threads.
    #[must_use]
    pub fn run(&self, cpus: usize) -> RunSummary {
        thread::scope(|s| {
            for cpu in 0..cpus {
                s.spawn(move || self.cpu_loop(cpu));
            }
        });
        RunSummary {
            finished: self.finished.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ticks: self.clock.load(Ordering::Relaxed),
        }
    }

    fn cpu_loop(&self, cpu: usize) {
        debug!("CPU {cpu}: started");
        while let Some(mut process) = self.dispatch(cpu) {
            for _ in 0..self.time_slice {
                if process.is_finished() {
                    break;
                }
                process.step(self.system, cpu);
                self.clock.fetch_add(1, Ordering::Relaxed);
            }
            self.release(cpu, process);
        }
        debug!("CPU {cpu}: stopped");
    }

    /// Next process to run, or `None` once nothing is left anywhere.
    fn dispatch(&self, cpu: usize) -> Option<Process> {
        loop {
            {
                let mut queues = self.queues.lock();
                self.admit(&mut queues);
                if let Some(process) = queues.ready.pop_front() {
                    queues.running += 1;
                    debug!("CPU {cpu}: dispatched process {}", process.ctx.pid());
                    return Some(process);
                }
                if queues.running == 0 {
                    // Nobody can advance the clock; skip ahead to the next arrival.
                    let next = queues.pending.front()?.start_time;
                    self.clock.fetch_max(next, Ordering::Relaxed);
                    continue;
                }
            }
            thread::yield_now();
        }
    }

    fn admit(&self, queues: &mut Queues) {
        let now = self.clock.load(Ordering::Relaxed);
        while queues.pending.front().is_some_and(|p| p.start_time <= now) {
            let Some(program) = queues.pending.pop_front() else {
                break;
            };
            match self.system.create_context() {
                Ok(ctx) => {
                    info!("loaded {} as process {} at tick {now}", program.name, ctx.pid());
                    queues.ready.push_back(Process {
                        name: program.name,
                        ctx,
                        code: program.code,
                        pc: 0,
                    });
                }
                Err(e) => {
                    error!("cannot load {}: {e}", program.name);
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn release(&self, cpu: usize, process: Process) {
        let mut queues = self.queues.lock();
        queues.running -= 1;
        if process.is_finished() {
            info!(
                "CPU {cpu}: process {} ({}) has finished",
                process.ctx.pid(),
                process.name
            );
            self.finished.fetch_add(1, Ordering::Relaxed);
        } else {
            queues.ready.push_back(process);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use kernel_memory_addresses::PAGE_SIZE;
    use kernel_memphy::{MemoryDevice, share};
    use kernel_vmem::PagingMode;

    fn program(name: &str, start_time: u64, script: &str) -> Program {
        Program {
            name: name.into(),
            start_time,
            code: parse_script(script).unwrap(),
        }
    }

    #[test]
    fn runs_all_programs_to_completion() {
        let system = MemorySystem::new(
            share(MemoryDevice::with_frames(128).unwrap()),
            PagingMode::FiveLevel,
        );
        let script = "inc 0 4096\nwrite 0 1\nread 0\ninc 0 4096\nwrite 0x1000 2\nread 0x1000\n";
        let programs = vec![
            program("late", 40, script),
            program("p0", 0, script),
            program("p1", 2, script),
        ];

        let summary = Scheduler::new(&system, 2, programs).run(2);
        assert_eq!(summary.finished, 3);
        assert_eq!(summary.rejected, 0);
        assert!(summary.ticks >= 40 + 6);

        // Three roots plus four lower tables each, and two data pages each.
        let used = system.ram().lock().used_frames() as u64;
        assert_eq!(used, 3 * 5 + 3 * 2);
        assert_eq!(system.stats().snapshot().pt_bytes, 15 * PAGE_SIZE);
    }

    #[test]
    fn rejects_programs_that_cannot_get_a_context() {
        let system = MemorySystem::new(
            share(MemoryDevice::with_frames(1).unwrap()),
            PagingMode::Flat,
        );
        let programs = vec![program("a", 0, "ioread 0\n"), program("b", 0, "ioread 0\n")];
        let summary = Scheduler::new(&system, 1, programs).run(1);
        assert_eq!(summary.finished, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn empty_program_list_terminates() {
        let system = MemorySystem::new(
            share(MemoryDevice::with_frames(4).unwrap()),
            PagingMode::Flat,
        );
        let summary = Scheduler::new(&system, 1, Vec::new()).run(3);
        assert_eq!(summary, RunSummary::default());
    }
}
