//! Kernel console.
//!
//! The kernel implements no console driver of its own: byte I/O is delegated to a collaborator
//! (on RISC-V, the firmware) through the [`Console`] trait. One console may be registered
//! globally to back the [`kprint!`] family of macros.

use core::fmt;

/// The global console instance.
static CONSOLE: spin::Once<&'static (dyn Console + Sync)> = spin::Once::new();

/// A byte-oriented console.
pub trait Console {
    /// Writes a single byte to the console. Always succeeds.
    fn put(&self, byte: u8);

    /// Polls the console for an input byte, returning `None` if no data is available yet.
    fn get(&self) -> Option<u8>;
}

impl<T: Console + ?Sized> Console for &T {
    fn put(&self, byte: u8) {
        (**self).put(byte)
    }

    fn get(&self) -> Option<u8> {
        (**self).get()
    }
}

/// A reference to the global console that implements `fmt::Write`.
pub struct ConsoleRef;

impl fmt::Write for ConsoleRef {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if let Some(con) = CONSOLE.get() {
            for byte in s.bytes() {
                if byte == b'\n' {
                    con.put(b'\r');
                }
                con.put(byte);
            }
        }
        Ok(())
    }
}

/// Registers the global console.
pub fn register(console: &'static (dyn Console + Sync)) {
    CONSOLE.call_once(|| console);
}

/// Returns a reference for the global console.
///
/// Note that no guarantee is made that a console has been registered.
/// In such case, the returned reference will be a no-op implementation.
pub fn get() -> ConsoleRef {
    ConsoleRef
}
