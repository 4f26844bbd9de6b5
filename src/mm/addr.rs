//! Physical and virtual addresses.
//!
//! Both address types wrap a `u32`: Sv32 physical addresses can in principle be 34 bits wide,
//! but this kernel only manages RAM below 4 GiB.

use core::{
    fmt,
    ops::{Add, Sub},
};

use super::{Align, PAGE_SHIFT, PAGE_SIZE};

macro_rules! address {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new address.
            pub const fn new(addr: u32) -> Self {
                Self(addr)
            }

            /// Returns the integer representation of this address.
            pub const fn data(self) -> u32 {
                self.0
            }

            /// Returns the lowest 12 bits of this address.
            pub const fn page_offset(self) -> u32 {
                self.0 & (PAGE_SIZE - 1)
            }

            /// Returns the index of the page containing this address.
            pub const fn page_index(self) -> u32 {
                self.0 >> PAGE_SHIFT
            }

            /// Returns whether this address lies on a page boundary.
            pub fn is_page_aligned(self) -> bool {
                self.is_aligned(PAGE_SIZE)
            }
        }

        impl Align<u32> for $name {
            fn align_up(&self, align: u32) -> Self {
                Self(self.0.align_up(align))
            }

            fn align_down(&self, align: u32) -> Self {
                Self(self.0.align_down(align))
            }

            fn is_aligned(&self, align: u32) -> bool {
                self.0.is_aligned(align)
            }
        }

        impl From<$name> for u32 {
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        impl From<u32> for $name {
            fn from(addr: u32) -> Self {
                Self(addr)
            }
        }

        impl Add<u32> for $name {
            type Output = Self;

            fn add(self, rhs: u32) -> Self::Output {
                Self(self.0 + rhs)
            }
        }

        impl Sub<u32> for $name {
            type Output = Self;

            fn sub(self, rhs: u32) -> Self::Output {
                Self(self.0 - rhs)
            }
        }

        // Distance in bytes between two addresses
        impl Sub for $name {
            type Output = u32;

            fn sub(self, rhs: Self) -> Self::Output {
                self.0 - rhs.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#010x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:08x}", self.0)
            }
        }

        impl fmt::LowerHex for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }
    };
}

address! {
    /// A physical memory address.
    PhysAddr
}

address! {
    /// A virtual memory address.
    VirtAddr
}

impl PhysAddr {
    /// Creates the address of the first byte of physical page `ppn`.
    pub const fn from_ppn(ppn: u32) -> Self {
        Self(ppn << PAGE_SHIFT)
    }
}

impl VirtAddr {
    /// Returns the first-level page table index (VPN\[1\], bits 31:22).
    pub const fn vpn1(self) -> usize {
        ((self.0 >> 22) & 0x3ff) as usize
    }

    /// Returns the second-level page table index (VPN\[0\], bits 21:12).
    pub const fn vpn0(self) -> usize {
        ((self.0 >> 12) & 0x3ff) as usize
    }
}
