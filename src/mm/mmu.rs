//! Sv32 page tables.
//!
//! Sv32 translates 32-bit virtual addresses through two levels of 1024-entry tables:
//! bits 31:22 index the root table, bits 21:12 the second-level table, and bits 11:0 are the
//! offset within a 4 KiB page. Each entry stores a 22-bit physical page number above 10 bits
//! of flags.

use bitflags::bitflags;

use crate::{
    error::{KernelError, KernelResult},
    mm::{allocator::FrameAllocator, Align, PhysAddr, VirtAddr, PAGE_SIZE},
};

const PTE_PPN_MASK: u32 = 0x3f_ffff;
const PTE_PPN_OFFSET: u32 = 10;

/// Number of entries in a page table of either level.
pub const ENTRIES_PER_TABLE: usize = 1024;

bitflags! {
    /// Bitfields of a page table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct EntryFlags: u32 {
        /// If set, this entry represents a valid mapping.
        const VALID = 1 << 0;
        /// If set, this page contains readable memory.
        const READ = 1 << 1;
        /// If set, this page contains writable memory.
        const WRITE = 1 << 2;
        /// If set, this page contains executable memory.
        const EXEC = 1 << 3;
        /// If set, this page can be accessed in U-mode.
        const USER = 1 << 4;

        /// If set, this page contains read-write memory.
        const RW = Self::READ.bits() | Self::WRITE.bits();
        /// If set, this page contains read-write-exec memory.
        const RWX = Self::READ.bits() | Self::WRITE.bits() | Self::EXEC.bits();

        /// PTE flags for kernel mappings.
        const KERNEL = Self::RWX.bits();
        /// PTE flags for user image mappings.
        const USER_RWX = Self::RWX.bits() | Self::USER.bits();
    }
}

/// A page table of either level.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Entry; ENTRIES_PER_TABLE],
}

impl PageTable {
    /// Returns a reference to an entry in this page table.
    pub fn get_entry(&self, i: usize) -> Option<&Entry> {
        self.entries.get(i)
    }
}

/// An entry in a [`PageTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Entry(u32);

impl Entry {
    /// Creates an entry pointing to physical page `ppn` with the given flags.
    pub const fn new(ppn: u32, flags: EntryFlags) -> Self {
        Self(((ppn & PTE_PPN_MASK) << PTE_PPN_OFFSET) | flags.bits())
    }

    /// Returns the raw bits of this entry.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns whether the mapping contained in this entry is valid for use in translation.
    pub fn is_valid(&self) -> bool {
        self.flags().contains(EntryFlags::VALID)
    }

    /// Returns whether this entry is a leaf or a pointer to another page table.
    pub fn is_leaf(&self) -> bool {
        self.flags()
            .intersects(EntryFlags::READ | EntryFlags::WRITE | EntryFlags::EXEC)
    }

    /// Returns the flags currently set on this entry.
    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0 & ((1 << PTE_PPN_OFFSET) - 1))
    }

    /// Returns the PPN portion of this entry.
    pub fn ppn(&self) -> u32 {
        (self.0 >> PTE_PPN_OFFSET) & PTE_PPN_MASK
    }

    /// Overwrites this entry, frame and flags alike.
    pub fn set(&mut self, ppn: u32, flags: EntryFlags) {
        *self = Self::new(ppn, flags);
    }
}

/// A memory mapper operating on a two-level Sv32 page table.
pub struct PageTableWalker<'a, A> {
    root: PhysAddr,
    allocator: &'a mut A,
}

impl<'a, A> PageTableWalker<'a, A>
where
    A: FrameAllocator,
{
    /// Creates a new page mapper for the root table at `root`.
    ///
    /// # Safety
    ///
    /// `root` must be the address of a valid root page table, obtained from `allocator`, and
    /// every valid non-leaf entry reachable from it must point to a valid second-level table.
    pub unsafe fn new(root: PhysAddr, allocator: &'a mut A) -> Self {
        Self { root, allocator }
    }

    /// Returns the page table stored at physical address `paddr`.
    ///
    /// # Safety
    ///
    /// `paddr` must hold a page table created by this module.
    unsafe fn table(&self, paddr: PhysAddr) -> &'a mut PageTable {
        // SAFETY: assuming the caller has upheld the safety contract
        unsafe { &mut *(self.allocator.phys_to_virt(paddr) as *mut PageTable) }
    }

    /// Maps the 4 KiB page at `vaddr` to the frame at `paddr` with the given flags.
    ///
    /// A second-level table is allocated the first time a 4 MiB region is touched. Mapping an
    /// already mapped page overwrites the previous entry. Both addresses must be page-aligned:
    /// if they are not, nothing is modified and [`KernelError::UnalignedAddress`] is returned.
    pub fn map(&mut self, vaddr: VirtAddr, paddr: PhysAddr, flags: EntryFlags) -> KernelResult<()> {
        if !vaddr.is_page_aligned() {
            return Err(KernelError::UnalignedAddress(vaddr.data()));
        }
        if !paddr.is_page_aligned() {
            return Err(KernelError::UnalignedAddress(paddr.data()));
        }

        // SAFETY: the root table is valid per construction of the walker
        let root = unsafe { self.table(self.root) };
        let pte = &mut root.entries[vaddr.vpn1()];

        let table_paddr = if pte.is_valid() {
            PhysAddr::from_ppn(pte.ppn())
        } else {
            // Frames come zeroed, so the new table has no valid entries
            let table_paddr = self.allocator.alloc(1)?;
            pte.set(table_paddr.page_index(), EntryFlags::VALID);
            table_paddr
        };

        // SAFETY: valid non-leaf entries point to tables allocated above
        let table = unsafe { self.table(table_paddr) };
        table.entries[vaddr.vpn0()].set(paddr.page_index(), flags | EntryFlags::VALID);

        Ok(())
    }

    /// Sets up identity mapping for a range of addresses, meaning that `vaddr == paddr` for all
    /// addresses the specified range.
    pub fn identity_map_range(
        &mut self,
        start: PhysAddr,
        end: PhysAddr,
        flags: EntryFlags,
    ) -> KernelResult<()> {
        let start = start.align_down(PAGE_SIZE);
        let end = end.align_up(PAGE_SIZE);

        let mut addr = start;
        while addr < end {
            self.map(VirtAddr::new(addr.data()), addr, flags)?;
            addr = addr + PAGE_SIZE;
        }

        Ok(())
    }

    /// Returns the physical address and the flags of the mapping containing `vaddr`, or `None`
    /// if the address is not mapped.
    pub fn translate(&self, vaddr: VirtAddr) -> Option<(PhysAddr, EntryFlags)> {
        // SAFETY: the root table is valid per construction of the walker
        let root = unsafe { self.table(self.root) };
        let pte = root.get_entry(vaddr.vpn1())?;
        // Superpages are never created
        if !pte.is_valid() || pte.is_leaf() {
            return None;
        }

        // SAFETY: valid non-leaf entries point to tables created by `map`
        let table = unsafe { self.table(PhysAddr::from_ppn(pte.ppn())) };
        let pte = table.get_entry(vaddr.vpn0())?;
        if !pte.is_valid() {
            return None;
        }

        Some((
            PhysAddr::from_ppn(pte.ppn()) + vaddr.page_offset(),
            pte.flags(),
        ))
    }
}
