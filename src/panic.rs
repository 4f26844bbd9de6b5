//! Fatal error handling.
//!
//! Kernel errors are never recovered: they bubble up to the architecture entry points, which
//! hand them to [`fatal`]. Rust panics end up in the same place.

use crate::error::KernelError;

/// Reports a fatal kernel error and halts the machine.
pub fn fatal(err: KernelError) -> ! {
    log::error!("{}", err);
    kprintln!("PANIC: {}", err);
    kprintln!("Halting!");

    crate::arch::halt()
}

/// Implements the kernel's panic behavior.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    kprintln!("Kernel panic: {}", info);
    kprintln!("Halting!");

    crate::arch::halt()
}
