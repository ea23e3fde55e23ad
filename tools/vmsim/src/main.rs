//! # vmsim
//!
//! Runs process scripts against the paging memory system on a configurable
//! number of simulated CPUs and prints the paging counters at the end.
//!
//! ```text
//! vmsim demos/paging.conf
//! VMSIM_LOG=debug vmsim --flat demos/paging.conf
//! vmsim --dump demos/paging.conf
//! ```

mod config;
mod logger;
mod sched;
mod script;

use crate::config::Config;
use crate::logger::ConsoleLogger;
use crate::sched::{Program, Scheduler};
use crate::script::parse_script;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use kernel_memphy::{AccessMode, MemoryDevice, share};
use kernel_mm::MemorySystem;
use kernel_vmem::PagingMode;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "vmsim")]
#[command(about = "Paging virtual-memory simulator")]
struct Cli {
    /// Configuration file
    config: PathBuf,

    /// Directory holding the process scripts [default: `proc/` next to the configuration]
    #[arg(long)]
    proc_dir: Option<PathBuf>,

    /// Use one flat table per process instead of the five-level hierarchy
    #[arg(long)]
    flat: bool,

    /// Model swap devices as sequential-access media
    #[arg(long)]
    sequential_swap: bool,

    /// Hex dump the start of RAM after the run
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    ConsoleLogger::from_env()
        .init()
        .map_err(|e| anyhow!("cannot install logger: {e}"))?;
    let cli = Cli::parse();

    let text = fs::read_to_string(&cli.config)
        .with_context(|| format!("cannot read {}", cli.config.display()))?;
    let config = Config::parse(&text)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    info!(
        "time_slice={} cpus={} procs={}",
        config.time_slice,
        config.cpus,
        config.processes.len()
    );

    let proc_dir = cli.proc_dir.unwrap_or_else(|| {
        cli.config
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("proc")
    });
    let programs = load_programs(&config, &proc_dir)?;
    let system = build_system(&config, cli.flat, cli.sequential_swap)?;

    let summary = Scheduler::new(&system, config.time_slice, programs).run(config.cpus);
    info!(
        "{} processes finished, {} rejected, {} ticks",
        summary.finished, summary.rejected, summary.ticks
    );
    print!("{}", system.stats());
    if cli.dump {
        print!("{}", system.ram().lock().dump());
    }
    Ok(())
}

fn load_programs(config: &Config, proc_dir: &Path) -> Result<Vec<Program>> {
    config
        .processes
        .iter()
        .map(|process| {
            let path = proc_dir.join(&process.script);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("cannot read process script {}", path.display()))?;
            let code = parse_script(&text).with_context(|| format!("in {}", path.display()))?;
            Ok(Program {
                name: process.script.clone(),
                start_time: process.start_time,
                code,
            })
        })
        .collect()
}

fn build_system(config: &Config, flat: bool, sequential_swap: bool) -> Result<MemorySystem> {
    let ram = MemoryDevice::new(config.ram_size, AccessMode::Random).context("RAM device")?;
    info!("RAM: {:#x} bytes, {} frames", config.ram_size, ram.frame_count());
    let mode = if flat {
        PagingMode::Flat
    } else {
        PagingMode::FiveLevel
    };
    let mut system = MemorySystem::new(share(ram), mode);

    let access = if sequential_swap {
        AccessMode::Sequential
    } else {
        AccessMode::Random
    };
    for (slot, &size) in config.swap_sizes.iter().enumerate() {
        if size == 0 {
            info!("swap {slot}: disabled");
            continue;
        }
        let device =
            MemoryDevice::new(size, access).with_context(|| format!("swap device {slot}"))?;
        info!("swap {slot}: {size:#x} bytes, {} frames", device.frame_count());
        system.attach_swap(slot, share(device))?;
    }
    Ok(system)
}
