//! Per-process address space construction.

use crate::{
    config::USER_BASE,
    error::KernelResult,
    mm::{
        allocator::FrameAllocator,
        mmu::{EntryFlags, PageTableWalker},
        MemoryLayout, PhysAddr, VirtAddr, PAGE_SIZE,
    },
};

/// Builds a new address space and returns the physical address of its root page table.
///
/// The kernel's resident range (`layout.kernel_base..layout.kernel_end()`) is identity-mapped
/// without the user bit. If `image` is provided, it is copied page by page into fresh frames
/// mapped at [`USER_BASE`] with user read-write-exec permissions; the tail of the last page is
/// left zeroed.
pub fn build<A: FrameAllocator>(
    allocator: &mut A,
    layout: &MemoryLayout,
    image: Option<&[u8]>,
) -> KernelResult<PhysAddr> {
    let root = allocator.alloc(1)?;

    // SAFETY: `root` is a freshly allocated, zeroed frame
    unsafe { PageTableWalker::new(root, allocator) }.identity_map_range(
        layout.kernel_base,
        layout.kernel_end(),
        EntryFlags::KERNEL,
    )?;

    for (i, chunk) in image.unwrap_or_default().chunks(PAGE_SIZE as usize).enumerate() {
        let page = allocator.alloc(1)?;

        // SAFETY: `page` is a whole frame owned by this address space, and `chunk` is at most
        // one page long. Frames come zeroed, which pads a short final chunk.
        unsafe {
            core::ptr::copy_nonoverlapping(chunk.as_ptr(), allocator.phys_to_virt(page), chunk.len());
        }

        let vaddr = VirtAddr::new(USER_BASE) + i as u32 * PAGE_SIZE;

        // SAFETY: `root` was set up above
        unsafe { PageTableWalker::new(root, allocator) }.map(vaddr, page, EntryFlags::USER_RWX)?;
    }

    Ok(root)
}
