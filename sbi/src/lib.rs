//! Implementation of the Supervisor Binary Interface (SBI) specification for RISC-V.
//!
//! This crate can be used to interact with an M-mode Runtime Firmware running on a RISC-V machine
//! to execute certain privileged operations in supervisor mode.
//!
//! On any other architecture every call fails with [`SbiError::NotSupported`], which keeps
//! dependent crates buildable (and testable) on a development host.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_op_in_unsafe_fn)]

use core::fmt;

/// A standard SBI error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbiError {
    /// Operation failed.
    Failed,
    /// Operation not supported.
    NotSupported,
    /// Invalid parameters in request.
    InvalidParam,
    /// Permission denied.
    Denied,
    /// Invalid address.
    InvalidAddress,
    /// Already available.
    AlreadyAvailable,
    /// An error code not defined by the specification.
    Unknown(isize),
}

impl From<isize> for SbiError {
    fn from(code: isize) -> Self {
        match code {
            -1 => SbiError::Failed,
            -2 => SbiError::NotSupported,
            -3 => SbiError::InvalidParam,
            -4 => SbiError::Denied,
            -5 => SbiError::InvalidAddress,
            -6 => SbiError::AlreadyAvailable,
            code => SbiError::Unknown(code),
        }
    }
}

impl fmt::Display for SbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbiError::Failed => write!(f, "operation failed"),
            SbiError::NotSupported => write!(f, "operation not supported"),
            SbiError::InvalidParam => write!(f, "invalid parameter"),
            SbiError::Denied => write!(f, "operation not permitted"),
            SbiError::InvalidAddress => write!(f, "invalid address"),
            SbiError::AlreadyAvailable => write!(f, "already available"),
            SbiError::Unknown(code) => write!(f, "unknown error code {}", code),
        }
    }
}

/// Result type for SBI operations.
pub type Result<T> = core::result::Result<T, SbiError>;

/// SBI extensions used by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Extension {
    /// Legacy Console Putchar operation.
    LegacyPutChar = 0x01,
    /// Legacy Console Getchar operation.
    LegacyGetChar = 0x02,

    /// Base Extension.
    Base = 0x10,
}

/// SBI specification version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecVersion {
    /// Major number of the SBI spec.
    pub major: usize,
    /// Minor number of the SBI spec.
    pub minor: usize,
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

macro_rules! ecall {
    ($ext:expr, $fid:expr) => {
        ecall($ext, $fid, 0, 0)
    };
}

/// SBI Base Extension.
#[derive(Debug)]
pub struct Base;

impl Base {
    /// Returns the current SBI specification version.
    pub fn get_spec_version() -> Result<SpecVersion> {
        let v = ecall!(Extension::Base, 0)?;
        Ok(SpecVersion {
            major: (v >> 24) & 0x7f,
            minor: v & 0xffffff,
        })
    }
}

/// Legacy console extensions.
///
/// These calls are deprecated by the SBI specification, but they are still the only console
/// available on most firmwares before a proper UART driver is brought up.
#[derive(Debug)]
pub struct Console;

impl Console {
    /// Writes a byte to the debug console. Blocks until the byte has been handed to the firmware.
    pub fn put(byte: u8) {
        let _ = legacy_ecall(Extension::LegacyPutChar, byte as usize);
    }

    /// Reads a byte from the debug console, returning `None` if no data is pending.
    pub fn get() -> Option<u8> {
        match legacy_ecall(Extension::LegacyGetChar, 0) {
            Ok(v) if v >= 0 => Some(v as u8),
            _ => None,
        }
    }
}

/// Low-level call to invoke an operation over SBI.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
fn ecall(ext: Extension, fid: usize, mut a0: usize, mut a1: usize) -> Result<usize> {
    // SAFETY: the SBI calling convention only clobbers a0 and a1
    unsafe {
        core::arch::asm!("ecall",
                inout("a0") a0,
                inout("a1") a1,
                in("a6") fid,
                in("a7") ext as usize);
    }

    if a0 == 0 {
        Ok(a1)
    } else {
        Err(SbiError::from(a0 as isize))
    }
}

#[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
fn ecall(_ext: Extension, _fid: usize, _a0: usize, _a1: usize) -> Result<usize> {
    Err(SbiError::NotSupported)
}

/// Low-level call to a legacy SBI extension.
///
/// Legacy extensions return their value in `a0` rather than an error/value pair.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
fn legacy_ecall(ext: Extension, mut a0: usize) -> Result<isize> {
    // SAFETY: legacy extensions only clobber a0
    unsafe {
        core::arch::asm!("ecall",
                inout("a0") a0,
                in("a7") ext as usize);
    }

    Ok(a0 as isize)
}

#[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
fn legacy_ecall(_ext: Extension, _a0: usize) -> Result<isize> {
    Err(SbiError::NotSupported)
}
