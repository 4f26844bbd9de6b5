//! Kernel entry point.

use core::{cell::UnsafeCell, ptr::addr_of_mut};

use crate::{
    config::LOG_LEVEL,
    console,
    error::KernelResult,
    kernel::Kernel,
    logging,
    mm::{allocator::BumpFrameAllocator, MemoryLayout, PhysAddr},
    panic::fatal,
    proc::ProcessTable,
};

use super::{instructions::wfi, trap, RiscvHart, SbiConsole};

type RiscvKernel = Kernel<'static, RiscvHart, SbiConsole>;

/// Holds the kernel context once boot is complete.
struct KernelCell(UnsafeCell<Option<RiscvKernel>>);

// SAFETY: there is a single hart, and the kernel never runs with interrupts enabled, so only
// one context at a time ever touches the cell. Contexts switched out in the middle of a kernel
// call hold a pointer to it, never a reference.
unsafe impl Sync for KernelCell {}

static KERNEL: KernelCell = KernelCell(UnsafeCell::new(None));

static mut PROCS: ProcessTable = ProcessTable::new();

static CONSOLE: SbiConsole = SbiConsole;

extern "C" {
    static mut __bss: u8;
    static mut __bss_end: u8;
    static __kernel_base: u8;
    static __free_ram: u8;
    static __free_ram_end: u8;
}

/// Returns the kernel context.
///
/// Processes share the context across switches, so callers must only access it through the
/// returned pointer, without holding references into it across a yield.
///
/// # Panics
///
/// Panics if called before `kmain` has created the context.
pub(super) fn kernel() -> *mut RiscvKernel {
    // SAFETY: see `KernelCell`. The borrow ends before returning.
    match unsafe { (*KERNEL.0.get()).as_mut() } {
        Some(kernel) => kernel as *mut _,
        None => panic!("kernel context used before initialization"),
    }
}

/// Reads the physical memory layout from the symbols of the linker script.
fn memory_layout() -> MemoryLayout {
    let addr = |sym: *const u8| PhysAddr::new(sym as u32);

    // SAFETY: only the addresses of the linker symbols are taken
    unsafe {
        MemoryLayout {
            kernel_base: addr(core::ptr::addr_of!(__kernel_base)),
            free_start: addr(core::ptr::addr_of!(__free_ram)),
            free_end: addr(core::ptr::addr_of!(__free_ram_end)),
        }
    }
}

/// Body of the demo processes: print a letter, then give up the processor.
#[cfg(not(user_image))]
fn demo_loop(letter: char) -> ! {
    loop {
        kprint!("{}", letter);
        // SAFETY: no reference into the kernel is held across the yield
        unsafe { Kernel::yield_now(kernel()) };
    }
}

#[cfg(not(user_image))]
extern "C" fn proc_a_entry() -> ! {
    demo_loop('A')
}

#[cfg(not(user_image))]
extern "C" fn proc_b_entry() -> ! {
    demo_loop('B')
}

/// Creates the processes run after boot.
fn spawn_initial(kernel: &mut RiscvKernel) -> KernelResult<()> {
    #[cfg(user_image)]
    {
        static USER_IMAGE: &[u8] = include_bytes!(env!("RVK_USER_IMAGE"));

        kernel.create_process(trap::user_entry as usize, Some(USER_IMAGE))?;
    }

    #[cfg(not(user_image))]
    {
        kernel.create_process(proc_a_entry as usize, None)?;
        kernel.create_process(proc_b_entry as usize, None)?;
    }

    Ok(())
}

/// Kernel entry point, jumped to by the boot stub with the boot stack set up.
#[no_mangle]
pub extern "C" fn kmain() -> ! {
    // SAFETY: nothing lives in .bss yet, and the symbols delimit it exactly
    unsafe {
        let start = addr_of_mut!(__bss);
        let end = addr_of_mut!(__bss_end);
        start.write_bytes(0, end as usize - start as usize);
    }

    console::register(&CONSOLE);
    if let Err(err) = logging::init(LOG_LEVEL) {
        kprintln!("logger unavailable: {}", err);
    }

    kprintln!();
    match sbi::Base::get_spec_version() {
        Ok(version) => log::info!("SBI specification {}", version),
        Err(err) => log::warn!("SBI version unavailable: {}", err),
    }

    trap::init();

    let layout = memory_layout();
    log::info!(
        "kernel at {}, free RAM {}-{}",
        layout.kernel_base,
        layout.free_start,
        layout.free_end
    );

    // SAFETY: the free RAM region is reserved by the linker script for the allocator
    let frames = unsafe { BumpFrameAllocator::new(layout.free_start, layout.free_end) };
    // SAFETY: the table is only ever accessed through the kernel context created here
    let procs = unsafe { &mut *addr_of_mut!(PROCS) };

    // SAFETY: no process exists yet, so nothing else can access the cell
    unsafe {
        *KERNEL.0.get() = Some(Kernel::new(procs, frames, layout, RiscvHart, CONSOLE));
    }

    // SAFETY: no process runs yet, so this is the only reference to the kernel
    if let Err(err) = spawn_initial(unsafe { &mut *kernel() }) {
        fatal(err);
    }

    // From now on, the boot context is the idle process
    // SAFETY: no reference into the kernel is held across the yield
    unsafe { Kernel::yield_now(kernel()) };

    log::info!("no runnable process left");
    loop {
        wfi();
    }
}
