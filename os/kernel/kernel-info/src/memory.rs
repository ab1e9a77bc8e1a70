//! # Memory Layout

/// Size of a base page and of a page frame.
pub const PAGE_SIZE: u32 = 4096;

/// Physical address of the first page-frame descriptor (1 MiB).
pub const FRAME_POOL_BASE: u32 = 0x0010_0000;

/// Distance between two consecutive page-frame descriptors (2 MiB).
pub const FRAME_STRIDE: u32 = 0x0020_0000;

/// Number of page-frame descriptors in the pool.
pub const FRAME_POOL_LEN: usize = 128;

/// Where the bytes of the kernel are placed in *physical* memory.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const PHYS_LOAD: u32 = 0x0010_0000; // 1 MiB

/// Start of the VGA text-mode buffer (80x25 cells of two bytes each).
pub const VGA_TEXT_BUFFER: u32 = 0x000B_8000;

/// Columns of the VGA text mode.
pub const VGA_WIDTH: usize = 80;

/// Rows of the VGA text mode.
pub const VGA_HEIGHT: usize = 25;

/// Pages identity-mapped at and below the page holding the stack pointer.
pub const STACK_IDENTITY_PAGES: u32 = 8;

/// Page tables available to the boot translator.
///
/// One table covers 4 MiB of virtual space.
pub const TRANSLATION_TABLES: usize = 1;

/// Size of the boot stack reserved in `.bss`.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(FRAME_POOL_BASE.is_multiple_of(PAGE_SIZE));
    assert!(FRAME_STRIDE.is_multiple_of(PAGE_SIZE));
    assert!(PHYS_LOAD.is_multiple_of(PAGE_SIZE));
    assert!(VGA_TEXT_BUFFER.is_multiple_of(PAGE_SIZE));
    assert!(VGA_WIDTH * VGA_HEIGHT * 2 <= PAGE_SIZE as usize);
    assert!(BOOT_STACK_SIZE.is_multiple_of(PAGE_SIZE as usize));
    assert!(BOOT_STACK_SIZE >= STACK_IDENTITY_PAGES as usize * PAGE_SIZE as usize);
    assert!(TRANSLATION_TABLES >= 1 && TRANSLATION_TABLES <= 1024);
    // The last descriptor has to stay addressable.
    assert!(
        (FRAME_POOL_BASE as u64) + (FRAME_POOL_LEN as u64 - 1) * (FRAME_STRIDE as u64)
            <= u32::MAX as u64
    );
    assert!(FRAME_POOL_LEN <= u16::MAX as usize);
};
