//! Kernel memory management.

pub mod addr;
pub mod address_space;
pub mod allocator;
pub mod mmu;

pub use addr::{PhysAddr, VirtAddr};

/// The shift amount for the page size.
pub const PAGE_SHIFT: u32 = 12;

/// Length of a page in bytes.
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;

/// A trait for numeric types that can be aligned to a boundary.
pub trait Align<U> {
    /// Aligns address upwards to the specified bound.
    ///
    /// Returns the first address greater or equal than `addr` with alignment `align`.
    fn align_up(&self, align: U) -> Self;

    /// Aligns address downwards to the specified bound.
    ///
    /// Returns the first address lower or equal than `addr` with alignment `align`.
    fn align_down(&self, align: U) -> Self;

    /// Checks whether the address has the specified alignment.
    fn is_aligned(&self, align: U) -> bool;
}

impl Align<u32> for u32 {
    fn align_up(&self, align: u32) -> Self {
        assert!(align.is_power_of_two(), "Alignment must be a power of two");
        (self + align - 1) & !(align - 1)
    }

    fn align_down(&self, align: u32) -> Self {
        assert!(align.is_power_of_two(), "Alignment must be a power of two");
        self & !(align - 1)
    }

    fn is_aligned(&self, align: u32) -> bool {
        assert!(align.is_power_of_two(), "Alignment must be a power of two");
        (self & (align - 1)) == 0
    }
}

/// Physical memory layout of the running kernel, as laid out by the linker script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// First byte of the kernel image.
    pub kernel_base: PhysAddr,
    /// Start of the free-memory region handed to the frame allocator.
    pub free_start: PhysAddr,
    /// End (exclusive) of the free-memory region.
    pub free_end: PhysAddr,
}

impl MemoryLayout {
    /// Returns the end (exclusive) of the kernel's resident physical range, which spans from
    /// the kernel image to the end of free memory and is identity-mapped in every address space.
    pub fn kernel_end(&self) -> PhysAddr {
        self.free_end
    }
}
