//! Console backed by the SBI firmware.

use crate::console::Console;

/// The firmware console. The kernel implements no driver of its own for it.
#[derive(Debug, Clone, Copy)]
pub struct SbiConsole;

impl Console for SbiConsole {
    fn put(&self, byte: u8) {
        sbi::Console::put(byte);
    }

    fn get(&self) -> Option<u8> {
        sbi::Console::get()
    }
}
