//! The kernel context.
//!
//! [`Kernel`] bundles every piece of mutable kernel state: the process table, the frame
//! allocator cursor and the id of the running process. Every kernel entry point (process
//! creation, traps, yields) operates on it, which keeps the core free of global state.

use crate::{
    arch::Hart,
    console::Console,
    error::{KernelError, KernelResult},
    mm::{address_space, allocator::BumpFrameAllocator, MemoryLayout},
    proc::{Pid, Process, ProcessTable},
};

/// Mutable kernel state, generic over the hart and the console collaborator.
pub struct Kernel<'a, H, C> {
    pub(crate) procs: &'a mut ProcessTable,
    pub(crate) frames: BumpFrameAllocator,
    layout: MemoryLayout,
    pub(crate) current: Pid,
    pub(crate) hart: H,
    pub(crate) console: C,
}

impl<'a, H, C> Kernel<'a, H, C>
where
    H: Hart,
    C: Console,
{
    /// Creates a kernel context. Execution continues as the idle process.
    pub fn new(
        procs: &'a mut ProcessTable,
        frames: BumpFrameAllocator,
        layout: MemoryLayout,
        hart: H,
        console: C,
    ) -> Self {
        Self {
            procs,
            frames,
            layout,
            current: Pid::IDLE,
            hart,
            console,
        }
    }

    /// Creates a runnable process that will start executing at `entry`.
    ///
    /// The process gets its own address space mapping the kernel and, if provided, `image` at
    /// the user base address. It first runs when the scheduler picks it.
    pub fn create_process(&mut self, entry: usize, image: Option<&[u8]>) -> KernelResult<Pid> {
        // Fail before spending frames on a process that has nowhere to live
        if !self.procs.has_free_slot() {
            return Err(KernelError::NoFreeSlot);
        }

        let root = address_space::build(&mut self.frames, &self.layout, image)?;
        let pid = self.procs.create(entry, root)?;

        log::info!(
            "created process {} (entry {:#010x}, page table {}, image {} bytes)",
            pid,
            entry,
            root,
            image.map_or(0, <[u8]>::len)
        );

        Ok(pid)
    }

    /// Returns the id of the running process.
    pub fn current(&self) -> Pid {
        self.current
    }

    /// Returns the running process.
    pub fn current_process(&self) -> &Process {
        self.procs.get(self.current)
    }

    /// Returns the process table.
    pub fn processes(&self) -> &ProcessTable {
        self.procs
    }

    /// Returns the physical memory layout the kernel was booted with.
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Returns the frame allocator.
    pub fn frames(&self) -> &BumpFrameAllocator {
        &self.frames
    }
}
