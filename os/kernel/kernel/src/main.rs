//! # Kernel Entry Point
//!
//! Loaded by a multiboot2 boot loader at 1 MiB in 32-bit protected mode with
//! paging off. The boot path is:
//!
//! 1. [`_start`] switches to [`BOOT_STACK`] and calls [`kernel_main`].
//! 2. The console logger is installed on the VGA text buffer.
//! 3. The frame pool is initialized and two frames are taken from it.
//! 4. The kernel image, the stack and the text buffer are identity mapped,
//!    and the frames are mapped at [`SCRATCH_BASE`].
//! 5. The directory is loaded into CR3 and paging is switched on.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

use core::arch::{asm, naked_asm};
use core::panic::PanicInfo;
use kernel_alloc::frame_pool::FramePool;
use kernel_console::ConsoleLogger;
use kernel_console::vga::{VgaMemory, VgaWriter};
use kernel_info::boot::BootLayout;
use kernel_info::memory::{BOOT_STACK_SIZE, PHYS_LOAD, TRANSLATION_TABLES};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_sync::TakeOnce;
use kernel_vmem::control::X86TranslationControl;
use kernel_vmem::phys_mapper::IdentityPhysMapper;
use kernel_vmem::{PageDirectory, PageTable, TranslateError, Translator};
use log::{LevelFilter, error, info, warn};

/// Magic value a multiboot2 loader leaves in `EAX`.
const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36D7_6289;

/// Where the allocated frames show up once paging is on (3 MiB, inside the
/// first directory slot).
const SCRATCH_BASE: VirtualAddress = VirtualAddress::new(0x0030_0000);

/// Multiboot2 header: magic, architecture (i386), length, checksum, and the
/// terminating tag.
#[repr(C, align(8))]
struct Multiboot2Header([u32; 6]);

const MULTIBOOT2_MAGIC: u32 = 0xE852_50D6;
const MULTIBOOT2_ARCH_I386: u32 = 0;
#[allow(clippy::cast_possible_truncation)]
const MULTIBOOT2_HEADER_LEN: u32 = size_of::<Multiboot2Header>() as u32;

#[used]
#[unsafe(link_section = ".multiboot")]
static MULTIBOOT2_HEADER: Multiboot2Header = Multiboot2Header([
    MULTIBOOT2_MAGIC,
    MULTIBOOT2_ARCH_I386,
    MULTIBOOT2_HEADER_LEN,
    0u32.wrapping_sub(MULTIBOOT2_MAGIC + MULTIBOOT2_ARCH_I386 + MULTIBOOT2_HEADER_LEN),
    0,
    8,
]);

/// 16-byte aligned stack
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

static LOGGER: ConsoleLogger<VgaMemory> = ConsoleLogger::new(LevelFilter::Info);
static FRAME_POOL: TakeOnce<FramePool> = TakeOnce::new(FramePool::from_memory_layout());
static PAGE_DIRECTORY: TakeOnce<PageDirectory> = TakeOnce::new(PageDirectory::zeroed());
static PAGE_TABLES: TakeOnce<[PageTable; TRANSLATION_TABLES]> =
    TakeOnce::new([const { PageTable::zeroed() }; TRANSLATION_TABLES]);

unsafe extern "C" {
    /// First byte past the image, provided by `kernel.ld`.
    static _end_kernel: u8;
}

/// The kernel entry point.
///
/// # Multiboot2
/// The loader jumps here with `EAX` holding the multiboot2 magic and `EBX`
/// the physical address of the boot information. Interrupts are off but the
/// stack pointer is undefined.
///
/// # Naked function & Stack
/// Naked so that no prologue touches the stack before it exists. Both
/// registers are pushed as the cdecl arguments of [`kernel_main`].
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "C" fn _start() -> ! {
    naked_asm!(
        "cli",
        "lea esp, [{stack} + {stack_size}]",
        "and esp, -16",
        "xor ebp, ebp",
        // Keep the stack 16-byte aligned at the call.
        "sub esp, 8",
        "push ebx",
        "push eax",
        "call {main}",
        "2:",
        "hlt",
        "jmp 2b",
        stack = sym BOOT_STACK,
        stack_size = const BOOT_STACK_SIZE,
        main = sym kernel_main,
    );
}

extern "C" fn kernel_main(magic: u32, boot_info: u32) -> ! {
    init_console();

    info!("Kernel loaded at {}", PhysicalAddress::new(PHYS_LOAD));
    if magic == MULTIBOOT2_BOOTLOADER_MAGIC {
        info!("Multiboot2 boot information at 0x{boot_info:08X}");
    } else {
        warn!("Unexpected boot loader magic 0x{magic:08X}");
    }

    if let Err(e) = setup_paging() {
        error!("Paging setup failed: {e}");
    }

    halt()
}

fn init_console() {
    // SAFETY: paging is still off and nothing else touches the text buffer.
    let mut vga = VgaWriter::new(unsafe { VgaMemory::text_mode() });
    vga.clear();
    LOGGER.attach_vga(vga);
    LOGGER.set_debugcon(cfg!(feature = "qemu"));

    // Only fails if a logger exists already, in which case output goes there.
    let _ = LOGGER.init();
}

#[derive(Debug, thiserror::Error)]
enum BootError {
    #[error("boot static {0} was already claimed")]
    AlreadyClaimed(&'static str),
    #[error(transparent)]
    Frames(#[from] kernel_alloc::frame_pool::FrameAllocError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
}

fn setup_paging() -> Result<(), BootError> {
    let pool = FRAME_POOL
        .take()
        .ok_or(BootError::AlreadyClaimed("FRAME_POOL"))?;
    pool.init();
    let frames = pool.allocate(2)?;

    // The statics only hand out addresses here; from now on the tables are
    // reached through the mapper.
    let directory = PAGE_DIRECTORY
        .take()
        .map(page_of)
        .ok_or(BootError::AlreadyClaimed("PAGE_DIRECTORY"))?;
    let tables = PAGE_TABLES
        .take()
        .map(|t| t.each_mut().map(page_of))
        .ok_or(BootError::AlreadyClaimed("PAGE_TABLES"))?;

    let mapper = IdentityPhysMapper;
    // SAFETY: paging is off, so physical addresses are usable as pointers,
    // and the pages belong to statics nothing else can claim.
    let mut translator: Translator<'_, IdentityPhysMapper> =
        unsafe { Translator::new(&mapper, directory, tables) };

    translator.identity_map_regions(&boot_layout())?;
    translator.map(SCRATCH_BASE, pool.frames(&frames))?;
    info!(
        "Mapped {} frames at {SCRATCH_BASE}, {} free",
        frames.len(),
        pool.free_len()
    );

    // SAFETY: ring 0, and the identity map covers code, stack and the text
    // buffer.
    unsafe {
        let mut control = X86TranslationControl::new();
        translator.load_translation_base(&mut control);
        translator.enable_translation(&mut control)?;
    }

    info!(
        "Paging enabled, directory at {}",
        translator.directory_page().base()
    );
    Ok(())
}

fn boot_layout() -> BootLayout {
    let sp: *const u8;
    // SAFETY: copies ESP into a register; no memory or flags are touched.
    unsafe { asm!("mov {}, esp", out(reg) sp, options(nomem, nostack, preserves_flags)) };
    BootLayout::new(
        PhysicalAddress::from_ptr(&raw const _end_kernel),
        PhysicalAddress::from_ptr(sp),
    )
}

/// Physical page of a page-aligned static while paging is off.
fn page_of<T>(table: &mut T) -> PhysicalPage<Size4K> {
    PhysicalAddress::from_ptr(core::ptr::from_mut(table).cast_const()).page()
}

fn halt() -> ! {
    loop {
        // SAFETY: ring 0; with interrupts off the CPU stays halted.
        unsafe { asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{info}");
    halt()
}
