//! # QEMU Debug Console
//!
//! QEMU copies every byte written to port `0x402` to the host when started
//! with `-debugcon stdio` (or `file:debug.log`). On real hardware the port is
//! unused and the writes go nowhere.

use core::fmt;

/// The port number of QEMU's debug console.
pub const DEBUGCON_PORT: u16 = 0x402;

/// Byte sink for the QEMU debug console.
///
/// Without the `debugcon` feature, or on a host build, writes are discarded.
#[derive(Debug, Default, Copy, Clone)]
pub struct DebugCon;

impl DebugCon {
    /// Whether bytes written here actually reach the port.
    #[must_use]
    pub const fn is_wired() -> bool {
        cfg!(all(feature = "debugcon", target_arch = "x86"))
    }

    #[inline]
    pub fn write_byte(self, byte: u8) {
        #[cfg(all(feature = "debugcon", target_arch = "x86"))]
        unsafe {
            outb(DEBUGCON_PORT, byte);
        }

        #[cfg(not(all(feature = "debugcon", target_arch = "x86")))]
        let _ = byte;
    }
}

impl fmt::Write for DebugCon {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.write_byte(b);
        }
        Ok(())
    }
}

#[cfg(all(feature = "debugcon", target_arch = "x86"))]
#[allow(clippy::inline_always)]
#[inline(always)]
unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
        );
    }
}
