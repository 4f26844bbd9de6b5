//! rvk is a minimal supervisor-mode kernel for single-hart 32-bit RISC-V machines.
//!
//! It provides a bump allocator for physical frames, Sv32 address spaces built per process,
//! cooperative round-robin multitasking over a fixed process table, and a three-call syscall
//! ABI (`putchar`, `getchar`, `exit`) for user programs.
//!
//! The scheduling, memory-management and trap-dispatch logic is architecture-agnostic and can
//! be unit-tested on the host. Everything touching control registers or assembly lives in
//! [`arch`] and is only built for `riscv32` targets.

// We are building a freestanding binary, so no standard library support for us
#![cfg_attr(not(test), no_std)]
// Keep things clean and tidy
#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![deny(unsafe_op_in_unsafe_fn)]

#[macro_use]
pub mod macros;

pub mod arch;
pub mod config;
pub mod console;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod mm;
pub mod panic;
pub mod proc;
pub mod sched;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use error::{KernelError, KernelResult};
pub use kernel::Kernel;
