//! This module provides RISC-V specific functions and data structures,
//! and access to various system registers.

use crate::{arch::Hart, mm::PhysAddr};

use self::{
    instructions::{sfence_vma, wfi},
    registers::{Satp, Sscratch, Sstatus, SstatusFlags, SATP_SV32},
};

mod earlycon;
mod entry;
mod instructions;
mod registers;
mod trap;

pub use earlycon::SbiConsole;

extern "C" {
    // Defined in trap.S
    fn switch_context(prev_sp: *mut usize, next_sp: *const usize);
}

/// The hart the kernel is running on.
#[derive(Debug, Clone, Copy)]
pub struct RiscvHart;

impl Hart for RiscvHart {
    fn activate_address_space(&self, root: Option<PhysAddr>) {
        let satp = root.map_or(0, |root| SATP_SV32 | root.page_index() as usize);

        sfence_vma();
        // SAFETY: every address space identity-maps the whole kernel, so execution continues
        // undisturbed after the switch
        unsafe { Satp::write(satp) };
        sfence_vma();
    }

    fn set_trap_stack(&self, top: usize) {
        // SAFETY: `sscratch` is only consumed by the trap entry code
        unsafe { Sscratch::write(top) };
    }

    unsafe fn switch_context(&self, prev_sp: *mut usize, next_sp: *const usize) {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { switch_context(prev_sp, next_sp) };
    }
}

/// Halts execution on the current hart forever.
pub fn halt() -> ! {
    // SAFETY: disabling interrupts cannot violate memory safety
    unsafe { Sstatus::clear(SstatusFlags::SIE) };

    // Loop forever
    loop {
        wfi();
    }
}
