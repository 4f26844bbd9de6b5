//! Process management.
//!
//! Processes live in a fixed-capacity [`ProcessTable`]. Slots are allocated once and never
//! recycled: an exited process keeps its slot, its kernel stack and its frames for the lifetime
//! of the kernel. The idle process, which stands for the boot context, is kept outside of the
//! table so that every slot is available to real processes.

use core::{
    fmt,
    mem::{offset_of, size_of},
    ptr::addr_of_mut,
};

use crate::{
    config::{KERNEL_STACK_SIZE, PROCS_MAX},
    error::{KernelError, KernelResult},
    mm::PhysAddr,
};

/// A process identifier.
///
/// Real processes are numbered from 1, following their slot in the process table. Negative ids
/// are reserved for the idle process; 0 is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(i32);

impl Pid {
    /// The id of the idle process.
    pub const IDLE: Pid = Pid(-1);

    /// Returns the id of the process living in table slot `slot`.
    pub const fn from_slot(slot: usize) -> Self {
        Pid(slot as i32 + 1)
    }

    /// Returns the table slot of this process, or `None` for the idle process.
    pub fn slot(self) -> Option<usize> {
        (self.0 > 0).then(|| self.0 as usize - 1)
    }

    /// Returns whether this is the idle process.
    pub fn is_idle(self) -> bool {
        self.0 < 0
    }

    /// Returns the raw value of this id.
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// The slot holds no process.
    Unused,
    /// The process can be scheduled.
    Runnable,
    /// The process has terminated and will never be scheduled again.
    Exited,
}

/// Callee-saved register frame consumed by the context switch routine.
///
/// Note: the order of the fields in this structure **must** match the order in which registers
/// are saved by `switch_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SwitchFrame {
    /// Return address of `switch_context`.
    pub ra: usize,
    /// `s0` to `s11`.
    pub s: [usize; 12],
}

// Offsets used by `switch_context`
const _: () = assert!(offset_of!(SwitchFrame, ra) == 0);
const _: () = assert!(offset_of!(SwitchFrame, s) == size_of::<usize>());
const _: () = assert!(size_of::<SwitchFrame>() == 13 * size_of::<usize>());

impl SwitchFrame {
    /// Creates the frame that makes the first switch to a process "return" to `entry`.
    pub const fn new(entry: usize) -> Self {
        Self { ra: entry, s: [0; 12] }
    }
}

/// A kernel stack.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct KernelStack([u8; KERNEL_STACK_SIZE]);

/// Process control block.
pub struct Process {
    pid: Pid,
    state: ProcessState,
    /// Kernel stack pointer, saved while the process is not running.
    saved_sp: usize,
    /// Root page table, `None` for the idle process.
    page_table: Option<PhysAddr>,
    stack: KernelStack,
}

impl Process {
    const fn empty(pid: Pid) -> Self {
        Self {
            pid,
            state: ProcessState::Unused,
            saved_sp: 0,
            page_table: None,
            stack: KernelStack([0; KERNEL_STACK_SIZE]),
        }
    }

    /// Returns the id of this process.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Returns the lifecycle state of this process.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Returns whether this process can be scheduled.
    pub fn is_runnable(&self) -> bool {
        self.state == ProcessState::Runnable
    }

    /// Returns the saved kernel stack pointer.
    pub fn saved_sp(&self) -> usize {
        self.saved_sp
    }

    /// Returns the physical address of this process' root page table.
    pub fn page_table(&self) -> Option<PhysAddr> {
        self.page_table
    }

    /// Returns the address right past the end of the kernel stack.
    pub fn stack_top(&self) -> usize {
        self.stack.0.as_ptr() as usize + KERNEL_STACK_SIZE
    }

    /// Returns the callee-saved frame that the next switch to this process will restore.
    ///
    /// Only meaningful while the process is not running.
    pub fn switch_frame(&self) -> Option<SwitchFrame> {
        let offset = self.saved_sp.checked_sub(self.stack.0.as_ptr() as usize)?;
        if offset + size_of::<SwitchFrame>() > KERNEL_STACK_SIZE {
            return None;
        }

        // SAFETY: the frame lies entirely within the kernel stack of this process
        Some(unsafe { (self.saved_sp as *const SwitchFrame).read_unaligned() })
    }

    /// Turns an unused slot into a runnable process that will start at `entry`.
    ///
    /// The top of the kernel stack receives a zeroed callee-saved frame whose return address is
    /// `entry`, so that the first context switch to this process jumps there.
    fn start(&mut self, entry: usize, page_table: Option<PhysAddr>) {
        debug_assert_eq!(self.state, ProcessState::Unused);

        let top = self.stack.0.as_mut_ptr_range().end as *mut SwitchFrame;

        // SAFETY: the frame fits at the top of the stack, and the stack is aligned for usize
        let sp = unsafe {
            let frame = top.sub(1);
            frame.write(SwitchFrame::new(entry));
            frame
        };

        self.saved_sp = sp as usize;
        self.page_table = page_table;
        self.state = ProcessState::Runnable;
    }

    /// Marks this process as exited.
    pub fn exit(&mut self) {
        debug_assert!(!self.pid.is_idle(), "the idle process cannot exit");
        self.state = ProcessState::Exited;
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("saved_sp", &format_args!("{:#x}", self.saved_sp))
            .field("page_table", &self.page_table)
            .finish()
    }
}

/// The fixed-capacity arena of process control blocks.
pub struct ProcessTable {
    slots: [Process; PROCS_MAX],
    /// The boot context. It keeps running on the boot stack; its own kernel stack is only
    /// armed as the trap stack while it runs, and never holds a switch frame.
    idle: Process,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    /// Creates a table with all slots unused.
    ///
    /// The idle process is always present and runnable, with no address space of its own.
    pub const fn new() -> Self {
        let mut slots = [const { Process::empty(Pid::IDLE) }; PROCS_MAX];

        let mut i = 0;
        while i < PROCS_MAX {
            slots[i].pid = Pid::from_slot(i);
            i += 1;
        }

        let mut idle = Process::empty(Pid::IDLE);
        idle.state = ProcessState::Runnable;

        Self { slots, idle }
    }

    /// Creates a new runnable process in the first unused slot.
    pub fn create(&mut self, entry: usize, page_table: PhysAddr) -> KernelResult<Pid> {
        let proc = self.free_slot()?;
        proc.start(entry, Some(page_table));
        Ok(proc.pid)
    }

    /// Returns the first unused slot.
    pub fn free_slot(&mut self) -> KernelResult<&mut Process> {
        self.slots
            .iter_mut()
            .find(|p| p.state == ProcessState::Unused)
            .ok_or(KernelError::NoFreeSlot)
    }

    /// Returns whether an unused slot is available.
    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(|p| p.state == ProcessState::Unused)
    }

    /// Returns the process with id `pid`.
    ///
    /// # Panics
    ///
    /// Panics if `pid` does not belong to this table.
    pub fn get(&self, pid: Pid) -> &Process {
        match pid.slot() {
            Some(slot) => &self.slots[slot],
            None => &self.idle,
        }
    }

    /// Returns the process with id `pid`.
    ///
    /// # Panics
    ///
    /// Panics if `pid` does not belong to this table.
    pub fn get_mut(&mut self, pid: Pid) -> &mut Process {
        match pid.slot() {
            Some(slot) => &mut self.slots[slot],
            None => &mut self.idle,
        }
    }

    /// Returns a raw pointer to the saved stack pointer of process `pid`, for use by the context
    /// switch routine.
    pub fn saved_sp_ptr(&mut self, pid: Pid) -> *mut usize {
        // SAFETY: `self` is a valid table
        unsafe { Self::saved_sp_slot(self, pid) }
    }

    /// Returns the saved stack pointer slots of `prev` and `next`, in the form expected by the
    /// context switch routine. Both pointers derive from the same borrow of the table.
    pub fn switch_slots(&mut self, prev: Pid, next: Pid) -> (*mut usize, *const usize) {
        let table: *mut Self = self;

        // SAFETY: `table` comes from a live mutable borrow, and no reference is created
        unsafe {
            (
                Self::saved_sp_slot(table, prev),
                Self::saved_sp_slot(table, next).cast_const(),
            )
        }
    }

    /// # Safety
    ///
    /// `table` must point to a valid table.
    unsafe fn saved_sp_slot(table: *mut Self, pid: Pid) -> *mut usize {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe {
            match pid.slot() {
                Some(slot) => addr_of_mut!((*table).slots[slot].saved_sp),
                None => addr_of_mut!((*table).idle.saved_sp),
            }
        }
    }

    /// Iterates over the slots of the table, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PhysAddr {
        PhysAddr::new(0x8040_0000)
    }

    #[test]
    fn pids_follow_slots() {
        assert_eq!(Pid::from_slot(0).get(), 1);
        assert_eq!(Pid::from_slot(7).slot(), Some(7));
        assert_eq!(Pid::IDLE.slot(), None);
        assert!(Pid::IDLE.is_idle());
        assert!(!Pid::from_slot(0).is_idle());
    }

    #[test]
    fn create_uses_first_unused_slot() {
        let mut table = Box::new(ProcessTable::new());

        let a = table.create(0x1000, root()).unwrap();
        let b = table.create(0x2000, root()).unwrap();

        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(table.get(a).state(), ProcessState::Runnable);
        assert_eq!(table.get(b).page_table(), Some(root()));
        assert_eq!(table.get(Pid::from_slot(2)).state(), ProcessState::Unused);
    }

    #[test]
    fn initial_switch_frame() {
        let mut table = Box::new(ProcessTable::new());
        let pid = table.create(0xdead_b000, root()).unwrap();
        let proc = table.get(pid);

        assert_eq!(
            proc.saved_sp(),
            proc.stack_top() - size_of::<SwitchFrame>()
        );
        assert_eq!(size_of::<SwitchFrame>(), 13 * size_of::<usize>());
        assert_eq!(proc.switch_frame(), Some(SwitchFrame::new(0xdead_b000)));
        assert_eq!(proc.switch_frame().unwrap().s, [0; 12]);
    }

    #[test]
    fn table_capacity_is_fixed() {
        let mut table = Box::new(ProcessTable::new());

        for i in 0..PROCS_MAX {
            assert_eq!(table.create(0x1000, root()).unwrap(), Pid::from_slot(i));
        }

        assert!(!table.has_free_slot());
        assert!(matches!(
            table.create(0x1000, root()),
            Err(KernelError::NoFreeSlot)
        ));
    }

    #[test]
    fn exited_slots_are_not_recycled() {
        let mut table = Box::new(ProcessTable::new());

        for _ in 0..PROCS_MAX {
            table.create(0x1000, root()).unwrap();
        }
        table.get_mut(Pid::from_slot(3)).exit();

        assert_eq!(table.get(Pid::from_slot(3)).state(), ProcessState::Exited);
        assert!(matches!(
            table.create(0x1000, root()),
            Err(KernelError::NoFreeSlot)
        ));
    }

    #[test]
    fn idle_process() {
        let table = Box::new(ProcessTable::new());
        let idle = table.get(Pid::IDLE);

        assert_eq!(idle.pid(), Pid::IDLE);
        assert!(idle.is_runnable());
        assert_eq!(idle.page_table(), None);
        assert_eq!(table.iter().count(), PROCS_MAX);
        assert!(table.iter().all(|p| p.state() == ProcessState::Unused));

        // Idle runs on the boot stack: its own stack never holds a switch frame
        assert_eq!(idle.saved_sp(), 0);
        assert_eq!(idle.switch_frame(), None);
        assert!(table.iter().all(|p| p.stack_top() != idle.stack_top()));
    }

    #[test]
    fn switch_frame_layout() {
        let word = size_of::<usize>();

        assert_eq!(offset_of!(SwitchFrame, ra), 0);
        assert_eq!(offset_of!(SwitchFrame, s), word);
        assert_eq!(size_of::<SwitchFrame>(), 13 * word);
    }

    #[test]
    fn switch_slots_point_at_saved_stack_pointers() {
        let mut table = Box::new(ProcessTable::new());
        let pid = table.create(0x1000, root()).unwrap();

        let (prev, next) = table.switch_slots(Pid::IDLE, pid);
        // SAFETY: `next` points into the table, which is alive
        let saved = unsafe { *next };

        assert_eq!(saved, table.get(pid).saved_sp());
        assert_eq!(prev, table.saved_sp_ptr(Pid::IDLE));
        assert_eq!(next, table.saved_sp_ptr(pid).cast_const());
    }
}
