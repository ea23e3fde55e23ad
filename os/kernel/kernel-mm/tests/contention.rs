use kernel_memory_addresses::{PAGE_SIZE, PageNumber, VirtualAddress};
use kernel_memphy::{MemoryDevice, share};
use kernel_mm::{MemorySystem, MmContext, MmError};
use kernel_vmem::PagingMode;
use std::sync::Barrier;
use std::thread;

const CPUS: usize = 4;
const PAGES_PER_PROCESS: u64 = 12;

/// Every process grows its first area one page at a time and stamps each
/// page with its pid.
fn run_process(system: &MemorySystem, barrier: &Barrier) -> MmContext {
    let mut ctx = system.create_context().unwrap();
    barrier.wait();
    for page in 0..PAGES_PER_PROCESS {
        system.grow(&mut ctx, 0, PAGE_SIZE).unwrap();
        let va = PageNumber::new(page).join(page);
        let stamp = u8::try_from(ctx.pid()).unwrap();
        system.write_virtual(&mut ctx, va, stamp).unwrap();
    }
    ctx
}

#[test]
fn concurrent_growth_keeps_processes_apart() {
    let ram = share(MemoryDevice::with_frames(256).unwrap());
    let system = MemorySystem::new(ram, PagingMode::FiveLevel);
    let barrier = Barrier::new(CPUS);

    let mut contexts: Vec<MmContext> = thread::scope(|s| {
        let handles: Vec<_> = (0..CPUS)
            .map(|_| s.spawn(|| run_process(&system, &barrier)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ctx in &mut contexts {
        assert_eq!(
            ctx.find_vma(0).unwrap().sbrk(),
            VirtualAddress::new(PAGES_PER_PROCESS * PAGE_SIZE)
        );
        for page in 0..PAGES_PER_PROCESS {
            let va = PageNumber::new(page).join(page);
            let expected = u8::try_from(ctx.pid()).unwrap();
            assert_eq!(system.read_virtual(ctx, va), Ok(expected));
        }
    }

    // Frame conservation: every used frame is either a table or a data page.
    let tables = system.stats().snapshot().pt_bytes / PAGE_SIZE;
    let data = CPUS as u64 * PAGES_PER_PROCESS;
    assert_eq!(system.ram().lock().used_frames() as u64, tables + data);
    // One root plus four lower tables per process.
    assert_eq!(tables, CPUS as u64 * 5);
}

#[test]
fn exhausted_ram_fails_cleanly_under_contention() {
    let ram = share(MemoryDevice::with_frames(48).unwrap());
    let system = MemorySystem::new(ram, PagingMode::FiveLevel);
    let barrier = Barrier::new(CPUS);

    let outcomes: Vec<(MmContext, usize)> = thread::scope(|s| {
        let handles: Vec<_> = (0..CPUS)
            .map(|_| {
                s.spawn(|| {
                    let mut ctx = system.create_context().unwrap();
                    barrier.wait();
                    let mut failures = 0;
                    for _ in 0..PAGES_PER_PROCESS {
                        match system.grow(&mut ctx, 0, PAGE_SIZE) {
                            Ok(_) => {}
                            Err(MmError::OutOfFrames) => failures += 1,
                            Err(e) => panic!("unexpected error {e:?}"),
                        }
                    }
                    (ctx, failures)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mapped: u64 = outcomes
        .iter()
        .map(|(ctx, _)| ctx.find_vma(0).unwrap().sbrk().as_u64() / PAGE_SIZE)
        .sum();
    let failures: usize = outcomes.iter().map(|(_, f)| f).sum();
    assert!(failures > 0);
    assert_eq!(mapped + failures as u64, CPUS as u64 * PAGES_PER_PROCESS);

    for (ctx, _) in &outcomes {
        let pages = ctx.find_vma(0).unwrap().sbrk().as_u64() / PAGE_SIZE;
        assert_eq!(ctx.fifo().len() as u64, pages);
    }
}
