//! QEMU `virt` machine.

use log::LevelFilter;

/// Capacity of the process table.
pub const PROCS_MAX: usize = 8;

/// Size of each process' kernel stack.
pub const KERNEL_STACK_SIZE: usize = 8192;

/// Virtual address at which user images are mapped.
pub const USER_BASE: u32 = 0x0100_0000;

/// Maximum level of kernel log records.
pub const LOG_LEVEL: LevelFilter = LevelFilter::Info;
