//! Architecture-specific code.

pub mod hal;

#[cfg(target_arch = "riscv32")]
pub mod riscv;
#[cfg(target_arch = "riscv32")]
pub use self::riscv::halt;

pub use hal::Hart;

/// Stops the machine. On hosts there is no hart to park, so the thread just spins.
#[cfg(not(target_arch = "riscv32"))]
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}
