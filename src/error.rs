//! Kernel error type.
//!
//! Every error in this kernel is fatal. Errors are still returned and propagated as values so
//! that the single sink, [`crate::panic::fatal`], is the only place where the machine halts.

use core::fmt;

use crate::{proc::Pid, trap::TrapCause};

/// Fatal conditions detected by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The free-memory region cannot satisfy a frame allocation.
    OutOfMemory {
        /// Number of frames requested.
        requested: usize,
    },
    /// An address passed to the mapper is not page-aligned.
    UnalignedAddress(u32),
    /// Every slot of the process table is in use.
    NoFreeSlot,
    /// A trap was taken for a cause the kernel does not handle.
    UnexpectedTrap {
        /// Decoded trap cause.
        cause: TrapCause,
        /// Raw content of `stval`.
        tval: usize,
        /// Program counter at the time of the trap.
        epc: usize,
    },
    /// A syscall was invoked with an unrecognized selector.
    UnknownSyscall(usize),
    /// A process resumed execution after it had exited.
    ExitedProcessResumed(Pid),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::OutOfMemory { requested } => {
                write!(f, "out of memory (requested {} frames)", requested)
            }
            KernelError::UnalignedAddress(addr) => write!(f, "unaligned address {:08x}", addr),
            KernelError::NoFreeSlot => write!(f, "no free process slots"),
            KernelError::UnexpectedTrap { cause, tval, epc } => write!(
                f,
                "unexpected trap {:?} (scause={:x}), stval={:08x}, sepc={:08x}",
                cause,
                cause.code(),
                tval,
                epc
            ),
            KernelError::UnknownSyscall(n) => write!(f, "unexpected syscall a3={:x}", n),
            KernelError::ExitedProcessResumed(pid) => {
                write!(f, "exited process {} was resumed", pid)
            }
        }
    }
}

/// Result type used throughout the kernel.
pub type KernelResult<T> = Result<T, KernelError>;
