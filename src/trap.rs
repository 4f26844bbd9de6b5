//! Trap dispatching.
//!
//! The architecture entry code spills every general-purpose register into a [`TrapFrame`] on
//! the kernel stack of the trapped process, collects the trap CSRs into a [`TrapInfo`] and
//! hands both to [`Kernel::handle_trap`]. The return value is the program counter at which the
//! trapped process resumes.

use core::mem::{offset_of, size_of};

use crate::{
    arch::Hart,
    console::Console,
    error::{KernelError, KernelResult},
    kernel::Kernel,
};

/// Size in bytes of the instruction raising an environment call.
pub const ECALL_SIZE: usize = 4;

// scause flag set for interrupts
const CAUSE_IRQ_FLAG_MASK: usize = 1 << (usize::BITS - 1);

/// Decoded content of the `scause` register.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TrapCause {
    /// An asynchronous interrupt with the given code.
    Interrupt(usize),
    InstrAddrMisaligned,
    InstrAccessFault,
    IllegalInstr,
    Breakpoint,
    LoadAddrMisaligned,
    LoadAccessFault,
    StoreAddrMisaligned,
    StoreAccessFault,
    /// Environment call from U-mode, i.e. a syscall.
    EnvCallFromU,
    EnvCallFromS,
    InstrPageFault,
    LoadPageFault,
    StorePageFault,
    /// An exception code not defined by the privileged architecture.
    Reserved(usize),
}

impl From<usize> for TrapCause {
    fn from(scause: usize) -> Self {
        use TrapCause::*;

        if scause & CAUSE_IRQ_FLAG_MASK != 0 {
            return Interrupt(scause & !CAUSE_IRQ_FLAG_MASK);
        }

        match scause {
            0 => InstrAddrMisaligned,
            1 => InstrAccessFault,
            2 => IllegalInstr,
            3 => Breakpoint,
            4 => LoadAddrMisaligned,
            5 => LoadAccessFault,
            6 => StoreAddrMisaligned,
            7 => StoreAccessFault,
            8 => EnvCallFromU,
            9 => EnvCallFromS,
            12 => InstrPageFault,
            13 => LoadPageFault,
            15 => StorePageFault,
            n => Reserved(n),
        }
    }
}

impl TrapCause {
    /// Returns the raw `scause` value this cause was decoded from.
    pub fn code(&self) -> usize {
        use TrapCause::*;

        match *self {
            Interrupt(n) => n | CAUSE_IRQ_FLAG_MASK,
            InstrAddrMisaligned => 0,
            InstrAccessFault => 1,
            IllegalInstr => 2,
            Breakpoint => 3,
            LoadAddrMisaligned => 4,
            LoadAccessFault => 5,
            StoreAddrMisaligned => 6,
            StoreAccessFault => 7,
            EnvCallFromU => 8,
            EnvCallFromS => 9,
            InstrPageFault => 12,
            LoadPageFault => 13,
            StorePageFault => 15,
            Reserved(n) => n,
        }
    }
}

/// Trap CSRs sampled on trap entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrapInfo {
    /// Decoded `scause`.
    pub cause: TrapCause,
    /// Content of `stval`.
    pub tval: usize,
    /// Content of `sepc`.
    pub epc: usize,
}

/// Register snapshot taken on trap entry.
///
/// Note: the order of the fields in this structure **must** match the order in which registers
/// are pushed to the stack in the trap entry trampoline.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    pub ra: usize,
    pub gp: usize,
    pub tp: usize,
    pub t0: usize,
    pub t1: usize,
    pub t2: usize,
    pub t3: usize,
    pub t4: usize,
    pub t5: usize,
    pub t6: usize,
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
    pub s0: usize,
    pub s1: usize,
    pub s2: usize,
    pub s3: usize,
    pub s4: usize,
    pub s5: usize,
    pub s6: usize,
    pub s7: usize,
    pub s8: usize,
    pub s9: usize,
    pub s10: usize,
    pub s11: usize,
    /// Stack pointer of the trapped context.
    pub sp: usize,
}

/// Number of registers saved in a [`TrapFrame`].
pub const TRAP_FRAME_REGS: usize = 31;

// Offsets used by `trap_entry`, in words
const _: () = assert!(size_of::<TrapFrame>() == TRAP_FRAME_REGS * size_of::<usize>());
const _: () = assert!(offset_of!(TrapFrame, ra) == 0);
const _: () = assert!(offset_of!(TrapFrame, a0) == 10 * size_of::<usize>());
const _: () = assert!(offset_of!(TrapFrame, a3) == 13 * size_of::<usize>());
const _: () = assert!(offset_of!(TrapFrame, s0) == 18 * size_of::<usize>());
const _: () = assert!(offset_of!(TrapFrame, sp) == 30 * size_of::<usize>());

impl TrapFrame {
    /// Prints the content of the trap frame to the console.
    #[rustfmt::skip]
    pub fn dump(&self, pc: usize) {
        let s = self;
        kprintln!(" PC was at {:08x}", pc);
        kprintln!(" RA was at {:08x}", s.ra);
        kprintln!(" sp : {:08x}  gp : {:08x}  tp : {:08x}", s.sp, s.gp, s.tp);
        kprintln!(" t0 : {:08x}  t1 : {:08x}  t2 : {:08x}", s.t0, s.t1, s.t2);
        kprintln!(" t3 : {:08x}  t4 : {:08x}  t5 : {:08x}", s.t3, s.t4, s.t5);
        kprintln!(" t6 : {:08x}  a0 : {:08x}  a1 : {:08x}", s.t6, s.a0, s.a1);
        kprintln!(" a2 : {:08x}  a3 : {:08x}  a4 : {:08x}", s.a2, s.a3, s.a4);
        kprintln!(" a5 : {:08x}  a6 : {:08x}  a7 : {:08x}", s.a5, s.a6, s.a7);
        kprintln!(" s0 : {:08x}  s1 : {:08x}  s2 : {:08x}", s.s0, s.s1, s.s2);
        kprintln!(" s3 : {:08x}  s4 : {:08x}  s5 : {:08x}", s.s3, s.s4, s.s5);
        kprintln!(" s6 : {:08x}  s7 : {:08x}  s8 : {:08x}", s.s6, s.s7, s.s8);
        kprintln!(" s9 : {:08x}  s10: {:08x}  s11: {:08x}", s.s9, s.s10, s.s11);
    }
}

impl<H, C> Kernel<'_, H, C>
where
    H: Hart + Copy,
    C: Console,
{
    /// Handles a trap taken by the current process and returns the address to resume it at.
    ///
    /// Syscalls are serviced and resume past the `ecall` instruction. Every other cause is
    /// fatal.
    ///
    /// Servicing a syscall may yield, in which case this only returns once the trapped process
    /// is scheduled again.
    ///
    /// # Safety
    ///
    /// Same as [`Kernel::yield_now`].
    pub unsafe fn handle_trap(
        this: *mut Self,
        frame: &mut TrapFrame,
        info: TrapInfo,
    ) -> KernelResult<usize> {
        match info.cause {
            TrapCause::EnvCallFromU => {
                // SAFETY: assuming the caller has upheld the safety contract
                unsafe { Self::handle_syscall(this, frame) }?;
                Ok(info.epc + ECALL_SIZE)
            }
            cause => Err(KernelError::UnexpectedTrap {
                cause,
                tval: info.tval,
                epc: info.epc,
            }),
        }
    }
}
