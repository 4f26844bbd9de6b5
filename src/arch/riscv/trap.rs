//! RISC-V trap handling.

use core::arch::asm;

use crate::{
    config::USER_BASE,
    error::KernelError,
    kernel::Kernel,
    panic::fatal,
    trap::{TrapCause, TrapFrame, TrapInfo},
};

use super::{
    entry::kernel,
    registers::{Scause, Sepc, Sstatus, SstatusFlags, Stval, Stvec},
};

/// Called by `trap_entry` with a pointer to the registers it saved on the kernel stack.
#[no_mangle]
extern "C" fn handle_trap(frame: &mut TrapFrame) {
    // Sampled before dispatching, since servicing a syscall may switch to another process
    // which will trap in turn
    let info = TrapInfo {
        cause: TrapCause::from(Scause::read()),
        tval: Stval::read(),
        epc: Sepc::read(),
    };

    // SAFETY: no reference into the kernel is held across the call
    match unsafe { Kernel::handle_trap(kernel(), frame, info) } {
        // SAFETY: `pc` follows an instruction of the process that trapped
        Ok(pc) => unsafe { Sepc::write(pc) },
        Err(err) => {
            if let KernelError::UnexpectedTrap { .. } = err {
                frame.dump(info.epc);
            }
            fatal(err)
        }
    }
}

/// First code run by processes created from a user image: drops to U-Mode at the user base.
pub extern "C" fn user_entry() -> ! {
    // SAFETY: the user image is mapped at `USER_BASE` in the active address space, and
    // `sscratch` points to the top of this process' kernel stack.
    unsafe {
        Sepc::write(USER_BASE as usize);
        Sstatus::update(|f| {
            f.remove(SstatusFlags::SPP); // Return to U-Mode
            f.insert(SstatusFlags::SPIE); // Enable interrupts on return to U-Mode
        });

        asm!("sret", options(noreturn));
    }
}

/// Configures the trap vector used to handle traps in S-mode.
pub fn init() {
    extern "C" {
        // Defined in trap.S
        fn trap_entry();
    }

    // SAFETY: `trap_entry` is 4-byte aligned, as required by direct mode
    unsafe { Stvec::write(trap_entry as usize) };
}
