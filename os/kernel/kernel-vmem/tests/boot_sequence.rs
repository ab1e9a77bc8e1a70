use kernel_alloc::frame_pool::FramePool;
use kernel_info::boot::BootLayout;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K, VirtualAddress};
use kernel_vmem::control::{cr0_with_paging, cr3_for};
use kernel_vmem::{PhysMapper, Stage, TranslateError, TranslationControl, Translator};
use kernel_registers::cr0::Cr0;
use std::cell::UnsafeCell;

#[repr(C, align(4096))]
struct Frame([u8; 4096]);

/// Page-table pages live in a heap buffer; page `i` is at `i * 4096`.
struct HeapPhys {
    frames: Vec<UnsafeCell<Frame>>,
}

impl HeapPhys {
    fn new(frames: usize) -> Self {
        Self {
            frames: (0..frames)
                .map(|_| UnsafeCell::new(Frame([0; 4096])))
                .collect(),
        }
    }
}

impl PhysMapper for HeapPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let pa = pa.as_u32() as usize;
        let frame = self.frames[pa / 4096].get().cast::<u8>();
        unsafe { &mut *frame.add(pa % 4096).cast::<T>() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Cr3(u32),
    Cr0(u32),
}

/// Records the register values a real CPU would have received.
#[derive(Default)]
struct RecordingControl {
    cr0: Cr0,
    writes: Vec<Write>,
}

impl TranslationControl for RecordingControl {
    unsafe fn load_base(&mut self, directory: PhysicalPage<Size4K>) {
        self.writes.push(Write::Cr3(cr3_for(directory).into_bits()));
    }

    unsafe fn enable(&mut self) {
        self.cr0 = cr0_with_paging(self.cr0);
        self.writes.push(Write::Cr0(self.cr0.into_bits()));
    }
}

fn page(n: u32) -> PhysicalPage<Size4K> {
    PhysicalPage::from_number(n)
}

#[test]
fn allocated_frames_are_mapped_and_committed() {
    let mut pool = FramePool::from_memory_layout();
    pool.init();
    let frames = pool.allocate(2).unwrap();

    let phys = HeapPhys::new(2);
    let mut translator: Translator<'_, HeapPhys> = unsafe { Translator::new(&phys, page(0), [page(1)]) };

    let layout = BootLayout::new(PhysicalAddress::new(0x0010_4000), PhysicalAddress::new(0x0013_0000));
    translator.identity_map_regions(&layout).unwrap();

    let scratch = VirtualAddress::new(0x0020_0000);
    assert_eq!(translator.map(scratch, pool.frames(&frames)), Ok(scratch));
    assert_eq!(translator.translate(scratch), Some(PhysicalAddress::new(0x0010_0000)));
    assert_eq!(
        translator.translate(VirtualAddress::new(0x0020_1010)),
        Some(PhysicalAddress::new(0x0030_0010))
    );

    let mut control = RecordingControl::default();
    unsafe {
        translator.load_translation_base(&mut control);
        translator.enable_translation(&mut control).unwrap();
    }
    assert_eq!(translator.stage(), Stage::TranslationActive);
    assert_eq!(control.writes, [Write::Cr3(0x0000_0000), Write::Cr0(0x8000_0001)]);

    pool.free(frames);
    assert_eq!(pool.free_len(), 128);
}

#[test]
fn enable_requires_a_loaded_base() {
    let phys = HeapPhys::new(2);
    let mut translator: Translator<'_, HeapPhys> = unsafe { Translator::new(&phys, page(0), [page(1)]) };
    translator
        .map(VirtualAddress::new(0x1000), [PhysicalAddress::new(0x1000)])
        .unwrap();

    let mut control = RecordingControl::default();
    let result = unsafe { translator.enable_translation(&mut control) };
    assert_eq!(result, Err(TranslateError::BaseNotLoaded));
    assert!(control.writes.is_empty());
    assert_eq!(translator.stage(), Stage::TablesBuilt);
}

#[test]
fn active_translation_is_frozen() {
    let phys = HeapPhys::new(3);
    let mut translator: Translator<'_, HeapPhys> = unsafe { Translator::new(&phys, page(1), [page(2)]) };
    let layout = BootLayout::new(PhysicalAddress::new(0x0010_1000), PhysicalAddress::new(0x0011_0000));
    translator.identity_map_regions(&layout).unwrap();

    let mut control = RecordingControl::default();
    unsafe {
        translator.load_translation_base(&mut control);
        translator.enable_translation(&mut control).unwrap();
    }

    assert_eq!(
        unsafe { translator.enable_translation(&mut control) },
        Err(TranslateError::TranslationActive)
    );
    assert_eq!(
        translator.map(VirtualAddress::new(0x5000), [PhysicalAddress::new(0x5000)]),
        Err(TranslateError::TranslationActive)
    );
    assert_eq!(translator.reset(), Err(TranslateError::TranslationActive));
    assert_eq!(
        translator.identity_map_regions(&layout),
        Err(TranslateError::TranslationActive)
    );

    // Reloading the base is a TLB flush and stays allowed.
    unsafe { translator.load_translation_base(&mut control) };
    assert_eq!(
        control.writes,
        [Write::Cr3(0x1000), Write::Cr0(0x8000_0001), Write::Cr3(0x1000)]
    );

    // The identity map is still intact.
    assert_eq!(
        translator.translate(VirtualAddress::new(0x000B_8000)),
        Some(PhysicalAddress::new(0x000B_8000))
    );
}
