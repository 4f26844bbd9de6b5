//! Hardware abstraction layer.
//!
//! The scheduler needs three privileged operations from the hart it runs on. They are gathered
//! behind [`Hart`] so that the process-switching logic stays architecture-agnostic.

use crate::mm::PhysAddr;

/// Privileged per-hart operations required by the scheduler.
pub trait Hart {
    /// Installs the address space rooted at `root` and flushes stale translations.
    ///
    /// `None` selects bare mode, i.e. no translation at all.
    fn activate_address_space(&self, root: Option<PhysAddr>);

    /// Sets the kernel stack on which the next trap taken from user mode will land.
    fn set_trap_stack(&self, top: usize);

    /// Saves the callee-saved registers on the current stack, stores the stack pointer into
    /// `*prev_sp`, then loads the stack pointer from `*next_sp` and restores the registers found
    /// there. Returns when some other switch resumes `prev_sp`.
    ///
    /// # Safety
    ///
    /// `next_sp` must point to a stack pointer previously saved by this function, or to a stack
    /// prepared with an initial switch frame. Both pointers must stay valid until the switch
    /// back happens.
    unsafe fn switch_context(&self, prev_sp: *mut usize, next_sp: *const usize);
}

impl<T: Hart + ?Sized> Hart for &T {
    fn activate_address_space(&self, root: Option<PhysAddr>) {
        (**self).activate_address_space(root)
    }

    fn set_trap_stack(&self, top: usize) {
        (**self).set_trap_stack(top)
    }

    unsafe fn switch_context(&self, prev_sp: *mut usize, next_sp: *const usize) {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { (**self).switch_context(prev_sp, next_sp) }
    }
}
