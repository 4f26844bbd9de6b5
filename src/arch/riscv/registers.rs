//! Access to the supervisor control and status registers.

use core::arch::asm;

use bitflags::bitflags;

macro_rules! csr {
    ($(#[$meta:meta])* $name:ident, $csr:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name;

        impl $name {
            #[doc = concat!("Reads the content of `", $csr, "`.")]
            #[inline]
            pub fn read() -> usize {
                let value: usize;
                // SAFETY: reading this CSR has no side effects
                unsafe {
                    asm!(concat!("csrr {}, ", $csr), out(reg) value, options(nomem, nostack));
                }
                value
            }

            #[doc = concat!("Writes `value` to `", $csr, "`.")]
            ///
            /// # Safety
            ///
            /// This function is unsafe because it's possible to violate memory safety through it.
            #[inline]
            pub unsafe fn write(value: usize) {
                // SAFETY: assuming the caller has upheld the safety contract
                unsafe { asm!(concat!("csrw ", $csr, ", {}"), in(reg) value, options(nostack)) };
            }
        }
    };
}

csr!(
    /// The `stvec` register holds the address of the trap vector.
    Stvec,
    "stvec"
);
csr!(
    /// The `sscratch` register holds the kernel stack pointer used on trap entry.
    Sscratch,
    "sscratch"
);
csr!(
    /// The `sepc` register holds the address of the instruction that trapped.
    Sepc,
    "sepc"
);
csr!(
    /// The `scause` register holds the cause of the last trap.
    Scause,
    "scause"
);
csr!(
    /// The `stval` register holds trap-specific information, such as a faulting address.
    Stval,
    "stval"
);
csr!(
    /// The `satp` register controls S-Mode address translation.
    Satp,
    "satp"
);

/// `satp` mode field selecting Sv32 translation.
pub const SATP_SV32: usize = 1 << 31;

bitflags! {
    /// Flags for the `sstatus` register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SstatusFlags: usize {
        /// S-Mode interrupt enable.
        const SIE = 1 << 1;
        /// S-Mode previous interrupt enable.
        const SPIE = 1 << 5;
        /// S-Mode previous privilege level.
        const SPP = 1 << 8;
        /// Permit S-Mode user memory access.
        const SUM = 1 << 18;
    }
}

/// The `sstatus` register keeps track of the processor’s current operating state.
#[derive(Debug)]
pub struct Sstatus;

impl Sstatus {
    /// Reads the content of `sstatus`.
    #[inline]
    pub fn read() -> SstatusFlags {
        let value: usize;
        // SAFETY: reading sstatus has no side effects
        unsafe { asm!("csrr {}, sstatus", out(reg) value, options(nomem, nostack)) };
        SstatusFlags::from_bits_retain(value)
    }

    /// Updates the content of `sstatus`.
    ///
    /// # Safety
    ///
    /// This function is unsafe because it's possible to violate memory safety through it.
    #[inline]
    pub unsafe fn update<F>(f: F)
    where
        F: FnOnce(&mut SstatusFlags),
    {
        let mut v = Self::read();
        f(&mut v);
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { asm!("csrw sstatus, {}", in(reg) v.bits(), options(nostack)) };
    }

    /// Clears the specified flags from `sstatus`.
    ///
    /// # Safety
    ///
    /// This function is unsafe because it's possible to violate memory safety through it.
    #[inline]
    pub unsafe fn clear(flags: SstatusFlags) {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { asm!("csrc sstatus, {}", in(reg) flags.bits(), options(nostack)) };
    }
}
