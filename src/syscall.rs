//! Syscalls implementation.
//!
//! The calling convention follows the trap frame: the syscall number is passed in `a3`, the
//! single argument and the return value travel in `a0`.

use crate::{
    arch::Hart,
    console::Console,
    error::{KernelError, KernelResult},
    kernel::Kernel,
    trap::TrapFrame,
};

/// Syscall numbers.
#[repr(usize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Sysno {
    /// Write one byte to the console.
    PutChar = 1,
    /// Read one byte from the console, blocking until one is available.
    GetChar = 2,
    /// Terminate the calling process.
    Exit = 3,
}

impl TryFrom<usize> for Sysno {
    type Error = KernelError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Sysno::PutChar),
            2 => Ok(Sysno::GetChar),
            3 => Ok(Sysno::Exit),
            n => Err(KernelError::UnknownSyscall(n)),
        }
    }
}

/// Syscall arguments passed from user space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SysArgs {
    /// The syscall number, still undecoded.
    pub sysno: usize,
    /// The single syscall argument.
    pub arg: usize,
}

impl From<&TrapFrame> for SysArgs {
    fn from(frame: &TrapFrame) -> Self {
        Self {
            sysno: frame.a3,
            arg: frame.a0,
        }
    }
}

impl<H, C> Kernel<'_, H, C>
where
    H: Hart + Copy,
    C: Console,
{
    /// Services the syscall described by `frame` on behalf of the current process.
    ///
    /// Results are written back into `frame`. An unknown syscall number is fatal.
    ///
    /// # Safety
    ///
    /// Same as [`Kernel::yield_now`], which blocking syscalls call into.
    pub unsafe fn handle_syscall(this: *mut Self, frame: &mut TrapFrame) -> KernelResult<()> {
        let args = SysArgs::from(&*frame);

        match Sysno::try_from(args.sysno)? {
            // SAFETY: the console borrow ends with the call
            Sysno::PutChar => unsafe { (*this).console.put(args.arg as u8) },
            // SAFETY: assuming the caller has upheld the safety contract
            Sysno::GetChar => frame.a0 = unsafe { Self::getchar(this) } as usize,
            // SAFETY: assuming the caller has upheld the safety contract
            Sysno::Exit => return unsafe { Self::exit_current(this) },
        }

        Ok(())
    }

    /// Polls the console until a byte arrives, yielding between polls.
    ///
    /// # Safety
    ///
    /// Same as [`Kernel::yield_now`].
    unsafe fn getchar(this: *mut Self) -> u8 {
        loop {
            // SAFETY: the console borrow ends before yielding
            if let Some(byte) = unsafe { (*this).console.get() } {
                return byte;
            }
            // SAFETY: assuming the caller has upheld the safety contract
            unsafe { Self::yield_now(this) };
        }
    }

    /// Terminates the current process and gives up the processor for good.
    ///
    /// An exited process is never scheduled again, so returning at all is an error.
    ///
    /// # Safety
    ///
    /// Same as [`Kernel::yield_now`].
    unsafe fn exit_current(this: *mut Self) -> KernelResult<()> {
        let pid = {
            // SAFETY: the borrow ends before yielding
            let kernel = unsafe { &mut *this };
            let pid = kernel.current;
            kernel.procs.get_mut(pid).exit();
            pid
        };

        log::info!("process {} exited", pid);

        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { Self::yield_now(this) };

        Err(KernelError::ExitedProcessResumed(pid))
    }
}
