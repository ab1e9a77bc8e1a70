//! # Boot Layout

use crate::memory::{PHYS_LOAD, VGA_TEXT_BUFFER};
use kernel_memory_addresses::PhysicalAddress;

/// Addresses the boot code hands to the identity mapper.
///
/// All values are physical; before paging is enabled they are also the
/// addresses the CPU executes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootLayout {
    /// First byte of the kernel image.
    pub kernel_start: PhysicalAddress,
    /// One past the last byte of the kernel image (`_end_kernel`), not
    /// necessarily page aligned.
    pub kernel_end: PhysicalAddress,
    /// Stack pointer at the time the layout was captured.
    pub stack_pointer: PhysicalAddress,
    /// Page holding the text-mode console.
    pub text_buffer: PhysicalAddress,
}

impl BootLayout {
    /// Layout for an image loaded at [`PHYS_LOAD`] that talks to the VGA
    /// console at [`VGA_TEXT_BUFFER`].
    #[must_use]
    pub const fn new(kernel_end: PhysicalAddress, stack_pointer: PhysicalAddress) -> Self {
        Self {
            kernel_start: PhysicalAddress::new(PHYS_LOAD),
            kernel_end,
            stack_pointer,
            text_buffer: PhysicalAddress::new(VGA_TEXT_BUFFER),
        }
    }
}
