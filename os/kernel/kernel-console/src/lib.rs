//! # Kernel Console
//!
//! Diagnostic output for the boot kernel. Nothing here is called directly by
//! the memory code; everything arrives through the `log` facade and ends up
//! in one or both sinks:
//!
//! * the VGA text buffer at `0xB8000` ([`vga::VgaWriter`]), 80x25 cells with
//!   light-grey-on-black text that scrolls at the bottom row, and
//! * QEMU's debug console on I/O port `0x402` ([`debugcon::DebugCon`]) when
//!   the `debugcon` feature is compiled in and switched on at runtime.
//!
//! ```text
//! info!(..) ─▶ ConsoleLogger ─┬─▶ VgaWriter ─▶ 0xB8000
//!                             └─▶ DebugCon  ─▶ port 0x402 (-debugcon stdio)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_console::ConsoleLogger;
//! use kernel_console::vga::{VgaMemory, VgaWriter};
//! use log::LevelFilter;
//!
//! static LOGGER: ConsoleLogger<VgaMemory> = ConsoleLogger::new(LevelFilter::Info);
//!
//! // SAFETY: the text buffer is identity-mapped and owned by the logger.
//! let vga = unsafe { VgaMemory::text_mode() };
//! LOGGER.attach_vga(VgaWriter::new(vga));
//! LOGGER.init().expect("logger installed once");
//! log::info!("console ready");
//! ```
//!
//! Output is best-effort: a message that arrives while another one is being
//! written (an interrupt handler logging mid-line, say) is dropped from the
//! VGA sink rather than deadlocking.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod debugcon;
mod logger;
pub mod vga;

pub use logger::ConsoleLogger;
