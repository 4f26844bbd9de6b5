//! Special RISC-V instructions.

use core::arch::asm;

/// Halts the hart until the next interrupt arrives.
#[inline]
pub fn wfi() {
    // SAFETY: `wfi` has no side effects
    unsafe {
        asm!("wfi", options(nostack, nomem));
    }
}

/// Flushes every address translation cached by the hart.
#[inline]
pub fn sfence_vma() {
    // SAFETY: flushing the TLB does not change any mapping
    unsafe {
        asm!("sfence.vma zero, zero", options(nostack));
    }
}
