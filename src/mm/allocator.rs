//! Physical frame allocation.

use crate::{
    error::{KernelError, KernelResult},
    mm::{PhysAddr, PAGE_SIZE},
};

/// A trait for page-grained physical memory allocators.
pub trait FrameAllocator {
    /// Allocates `count` contiguous, zero-filled frames and returns the address of the first.
    fn alloc(&mut self, count: usize) -> KernelResult<PhysAddr>;

    /// Returns a kernel pointer through which physical address `paddr` can be accessed.
    fn phys_to_virt(&self, paddr: PhysAddr) -> *mut u8;
}

/// A bump allocator for physical memory. Deallocation is not supported.
///
/// Frames are handed out from a single cursor that only moves forward, so allocated regions are
/// disjoint and their addresses monotonically increasing. Memory is never reclaimed: once the
/// cursor reaches the end of the region, every further allocation fails.
#[derive(Debug)]
pub struct BumpFrameAllocator {
    start: PhysAddr,
    end: PhysAddr,
    next: PhysAddr,
    /// Linear offset between physical addresses and the pointers used to access them.
    offset: usize,
}

impl BumpFrameAllocator {
    /// Creates a new bump allocator over the physical range `[start, end)`, reachable by the
    /// kernel at the same addresses (identity mapping).
    ///
    /// # Safety
    ///
    /// The range must be valid, unused RAM, exclusively owned by the allocator.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or either bound is not page-aligned.
    pub unsafe fn new(start: PhysAddr, end: PhysAddr) -> Self {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { Self::with_offset(start, end, 0) }
    }

    /// Creates a new bump allocator whose frames are reachable at `paddr + offset`.
    ///
    /// # Safety
    ///
    /// Same as [`Self::new`]; additionally `[start + offset, end + offset)` must be valid,
    /// writable memory for the kernel.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or either bound is not page-aligned.
    pub unsafe fn with_offset(start: PhysAddr, end: PhysAddr, offset: usize) -> Self {
        assert!(start <= end);
        assert!(start.is_page_aligned() && end.is_page_aligned());

        Self {
            start,
            end,
            next: start,
            offset,
        }
    }

    /// Returns the number of bytes handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next - self.start
    }

    /// Returns the number of bytes still available.
    pub fn remaining(&self) -> u32 {
        self.end - self.next
    }
}

impl FrameAllocator for BumpFrameAllocator {
    fn alloc(&mut self, count: usize) -> KernelResult<PhysAddr> {
        let oom = KernelError::OutOfMemory { requested: count };

        let size = u32::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(PAGE_SIZE))
            .ok_or(oom)?;
        if size > self.remaining() {
            return Err(oom);
        }

        let paddr = self.next;
        self.next = paddr + size;

        // SAFETY: the frames lie within the region owned by this allocator
        unsafe {
            self.phys_to_virt(paddr).write_bytes(0, size as usize);
        }

        log::debug!("allocated {} frame(s) at {}", count, paddr);

        Ok(paddr)
    }

    fn phys_to_virt(&self, paddr: PhysAddr) -> *mut u8 {
        (paddr.data() as usize).wrapping_add(self.offset) as *mut u8
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::HostRam;

    use super::*;

    const NUM_PAGES: usize = 16;

    #[test]
    fn allocations_are_disjoint_and_increasing() {
        let ram = HostRam::new(NUM_PAGES);
        let mut allocator = ram.allocator();

        let mut prev_end = ram.base();
        for count in [1, 2, 3, 1, 4] {
            let paddr = allocator.alloc(count).expect("allocation failed");

            assert!(paddr.is_page_aligned());
            assert_eq!(paddr, prev_end, "allocations must be contiguous and increasing");

            prev_end = paddr + count as u32 * PAGE_SIZE;
        }

        assert_eq!(allocator.allocated(), 11 * PAGE_SIZE);
    }

    #[test]
    fn frames_are_zeroed() {
        let ram = HostRam::new(NUM_PAGES);
        ram.fill(0xa5);

        let mut allocator = ram.allocator();
        let paddr = allocator.alloc(2).unwrap();

        assert!(ram.bytes(paddr, 2 * PAGE_SIZE as usize).iter().all(|&b| b == 0));
        // Memory past the allocation is left untouched
        assert_eq!(ram.bytes(paddr + 2 * PAGE_SIZE, 1), &[0xa5]);
    }

    #[test]
    fn exact_fit() {
        let ram = HostRam::new(NUM_PAGES);
        let mut allocator = ram.allocator();

        allocator.alloc(NUM_PAGES).expect("whole region should fit");
        assert_eq!(allocator.remaining(), 0);
    }

    #[test]
    fn out_of_memory() {
        let ram = HostRam::new(NUM_PAGES);
        let mut allocator = ram.allocator();

        assert_eq!(
            allocator.alloc(NUM_PAGES + 1),
            Err(KernelError::OutOfMemory {
                requested: NUM_PAGES + 1
            })
        );

        allocator.alloc(NUM_PAGES - 1).unwrap();
        assert_eq!(
            allocator.alloc(2),
            Err(KernelError::OutOfMemory { requested: 2 })
        );
        assert_eq!(
            allocator.alloc(usize::MAX),
            Err(KernelError::OutOfMemory {
                requested: usize::MAX
            })
        );

        // A failed allocation does not move the cursor
        allocator.alloc(1).expect("last frame should still be available");
    }
}
