//! Board configuration, selected through cargo features.

#![allow(missing_docs)]

mod qemu;

#[cfg(feature = "config-qemu")]
pub use qemu::*;
