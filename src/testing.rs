//! Host-side doubles for the hardware the kernel talks to.

use std::{
    alloc::{self, Layout},
    cell::{Cell, RefCell},
    collections::VecDeque,
    ptr,
};

use crate::{
    arch::Hart,
    console::Console,
    error::KernelResult,
    kernel::Kernel,
    mm::{allocator::BumpFrameAllocator, MemoryLayout, PhysAddr, PAGE_SIZE},
    trap::{TrapFrame, TrapInfo},
};

/// Physical address at which host RAM pretends to live.
const RAM_BASE: u32 = 0x8040_0000;

/// A page-aligned chunk of host memory posing as physical RAM at [`RAM_BASE`].
pub struct HostRam {
    ptr: *mut u8,
    layout: Layout,
}

impl HostRam {
    /// Allocates `pages` pages of RAM.
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE_SIZE as usize, PAGE_SIZE as usize)
            .expect("invalid RAM layout");

        // SAFETY: the layout has non-zero size
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "host allocation failed");

        Self { ptr, layout }
    }

    /// Returns the physical address of the first page.
    pub fn base(&self) -> PhysAddr {
        PhysAddr::new(RAM_BASE)
    }

    /// Returns the physical address right past the last page.
    pub fn end(&self) -> PhysAddr {
        self.base() + self.layout.size() as u32
    }

    fn offset(&self) -> usize {
        (self.ptr as usize).wrapping_sub(RAM_BASE as usize)
    }

    /// Returns a frame allocator managing the whole RAM.
    pub fn allocator(&self) -> BumpFrameAllocator {
        // SAFETY: the host allocation backs the whole range and outlives the test
        unsafe { BumpFrameAllocator::with_offset(self.base(), self.end(), self.offset()) }
    }

    /// Returns a memory layout in which the whole RAM is both kernel range and free memory.
    pub fn layout(&self) -> MemoryLayout {
        MemoryLayout {
            kernel_base: self.base(),
            free_start: self.base(),
            free_end: self.end(),
        }
    }

    /// Fills the whole RAM with `byte`.
    pub fn fill(&self, byte: u8) {
        // SAFETY: the range is owned by this object
        unsafe { self.ptr.write_bytes(byte, self.layout.size()) };
    }

    /// Returns `len` bytes of RAM starting at physical address `paddr`.
    pub fn bytes(&self, paddr: PhysAddr, len: usize) -> &[u8] {
        let start = (paddr - self.base()) as usize;
        assert!(start + len <= self.layout.size(), "out of RAM bounds");

        // SAFETY: the range was checked above
        unsafe { std::slice::from_raw_parts(self.ptr.add(start), len) }
    }
}

impl Drop for HostRam {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout
        unsafe { alloc::dealloc(self.ptr, self.layout) };
    }
}

/// A privileged operation observed by [`MockHart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HartEvent {
    AddressSpace(Option<PhysAddr>),
    TrapStack(usize),
    Switch { prev: usize, next: usize },
}

/// A hart that records what the kernel asks of it.
///
/// Context switches return immediately, as if the target process yielded straight back.
#[derive(Debug, Default)]
pub struct MockHart {
    events: RefCell<Vec<HartEvent>>,
}

impl MockHart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns and clears the recorded events.
    pub fn take(&self) -> Vec<HartEvent> {
        self.events.take()
    }

    /// Returns the number of context switches recorded so far.
    pub fn switches(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, HartEvent::Switch { .. }))
            .count()
    }
}

impl Hart for MockHart {
    fn activate_address_space(&self, root: Option<PhysAddr>) {
        self.events.borrow_mut().push(HartEvent::AddressSpace(root));
    }

    fn set_trap_stack(&self, top: usize) {
        self.events.borrow_mut().push(HartEvent::TrapStack(top));
    }

    unsafe fn switch_context(&self, prev_sp: *mut usize, next_sp: *const usize) {
        self.events.borrow_mut().push(HartEvent::Switch {
            prev: prev_sp as usize,
            next: next_sp as usize,
        });
    }
}

/// A kernel whose hart re-enters it on every switch.
pub type BouncingKernel = Kernel<'static, &'static BouncingHart, &'static MockConsole>;

/// A hart on which the process switched to yields straight back through the shared kernel,
/// the way a second process does on hardware.
///
/// Switches only bounce once a kernel is attached, and never while already bouncing.
pub struct BouncingHart {
    inner: MockHart,
    kernel: Cell<*mut BouncingKernel>,
    nested: Cell<bool>,
}

impl BouncingHart {
    pub fn new() -> Self {
        Self {
            inner: MockHart::new(),
            kernel: Cell::new(ptr::null_mut()),
            nested: Cell::new(false),
        }
    }

    /// Starts bouncing switches through `kernel`.
    pub fn attach(&self, kernel: *mut BouncingKernel) {
        self.kernel.set(kernel);
    }

    /// Returns and clears the recorded events.
    pub fn take(&self) -> Vec<HartEvent> {
        self.inner.take()
    }
}

impl Hart for BouncingHart {
    fn activate_address_space(&self, root: Option<PhysAddr>) {
        self.inner.activate_address_space(root);
    }

    fn set_trap_stack(&self, top: usize) {
        self.inner.set_trap_stack(top);
    }

    unsafe fn switch_context(&self, prev_sp: *mut usize, next_sp: *const usize) {
        // SAFETY: the mock only records the switch
        unsafe { self.inner.switch_context(prev_sp, next_sp) };

        let kernel = self.kernel.get();
        if kernel.is_null() || self.nested.replace(true) {
            return;
        }

        // SAFETY: the attached kernel outlives the test, and the process being switched out
        // holds no reference into it
        unsafe { Kernel::yield_now(kernel) };
        self.nested.set(false);
    }
}

/// Drives a kernel from a single context.
///
/// Mock harts never resume another process, so nothing else accesses the kernel while one of
/// these calls is in progress.
pub trait SingleContext {
    fn yield_now(&mut self);
    fn handle_syscall(&mut self, frame: &mut TrapFrame) -> KernelResult<()>;
    fn handle_trap(&mut self, frame: &mut TrapFrame, info: TrapInfo) -> KernelResult<usize>;
}

impl<H: Hart + Copy, C: Console> SingleContext for Kernel<'_, H, C> {
    fn yield_now(&mut self) {
        // SAFETY: see the trait documentation
        unsafe { Kernel::yield_now(self as *mut Self) }
    }

    fn handle_syscall(&mut self, frame: &mut TrapFrame) -> KernelResult<()> {
        // SAFETY: see the trait documentation
        unsafe { Kernel::handle_syscall(self as *mut Self, frame) }
    }

    fn handle_trap(&mut self, frame: &mut TrapFrame, info: TrapInfo) -> KernelResult<usize> {
        // SAFETY: see the trait documentation
        unsafe { Kernel::handle_trap(self as *mut Self, frame, info) }
    }
}

/// A console with scripted input and captured output.
#[derive(Debug, Default)]
pub struct MockConsole {
    input: RefCell<VecDeque<Option<u8>>>,
    output: RefCell<Vec<u8>>,
    polls: Cell<usize>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `misses` polls report no data, then delivers `byte`.
    pub fn feed_after(&self, misses: usize, byte: u8) {
        let mut input = self.input.borrow_mut();
        input.extend(std::iter::repeat(None).take(misses));
        input.push_back(Some(byte));
    }

    /// Returns everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.output.borrow().clone()
    }

    /// Returns the number of times input was polled.
    pub fn polls(&self) -> usize {
        self.polls.get()
    }
}

impl Console for MockConsole {
    fn put(&self, byte: u8) {
        self.output.borrow_mut().push(byte);
    }

    fn get(&self) -> Option<u8> {
        self.polls.set(self.polls.get() + 1);
        self.input.borrow_mut().pop_front().flatten()
    }
}
