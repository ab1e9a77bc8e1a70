//! # Identity Regions
//!
//! The physical ranges that have to stay reachable at the same address
//! once paging is switched on.

use core::fmt;
use kernel_info::boot::BootLayout;
use kernel_info::memory::STACK_IDENTITY_PAGES;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K};

/// A page-aligned physical range mapped 1:1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IdentityRegion {
    name: &'static str,
    start: PhysicalAddress,
    pages: u32,
}

impl IdentityRegion {
    #[must_use]
    pub const fn new(name: &'static str, start: PhysicalAddress, pages: u32) -> Self {
        Self {
            name,
            start: start.align_down::<Size4K>(),
            pages,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages == 0
    }

    /// One past the last byte, as a 64-bit value since a region may end
    /// exactly at 4 GiB.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start.as_u32() as u64 + self.pages as u64 * Size4K::SIZE as u64
    }

    /// Base address of every page in the region, ascending.
    pub fn frames(&self) -> impl Iterator<Item = PhysicalAddress> + use<> {
        let start = self.start.as_u32();
        (0..self.pages).map(move |i| PhysicalAddress::new(start + i * Size4K::SIZE))
    }
}

impl fmt::Display for IdentityRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} to 0x{:08X} ({} pages)",
            self.name,
            self.start,
            self.end(),
            self.pages
        )
    }
}

/// Kernel image, stack and text buffer, in that order.
///
/// - The image runs from `kernel_start` up to `kernel_end` rounded up to
///   the next page.
/// - The stack region is the page containing the stack pointer plus the
///   `STACK_IDENTITY_PAGES - 1` pages below it (fewer if that would reach
///   below address zero).
/// - The text buffer is a single page.
#[must_use]
pub fn identity_regions(layout: &BootLayout) -> [IdentityRegion; 3] {
    [
        kernel_region(layout.kernel_start, layout.kernel_end),
        stack_region(layout.stack_pointer),
        IdentityRegion::new("text buffer", layout.text_buffer, 1),
    ]
}

fn kernel_region(start: PhysicalAddress, end: PhysicalAddress) -> IdentityRegion {
    let first = start.page::<Size4K>().number();
    // An image ending inside the last page runs up to 4 GiB.
    let last = end
        .checked_align_up::<Size4K>()
        .map_or(1 << (32 - Size4K::SHIFT), |aligned| aligned.page::<Size4K>().number());
    IdentityRegion::new("kernel", start, last.saturating_sub(first))
}

fn stack_region(stack_pointer: PhysicalAddress) -> IdentityRegion {
    let top = stack_pointer.page::<Size4K>().number();
    let pages = STACK_IDENTITY_PAGES.min(top + 1);
    let bottom = PhysicalAddress::new((top + 1 - pages) << Size4K::SHIFT);
    IdentityRegion::new("stack", bottom, pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(kernel_end: u32, sp: u32) -> BootLayout {
        BootLayout::new(PhysicalAddress::new(kernel_end), PhysicalAddress::new(sp))
    }

    #[test]
    fn kernel_end_is_rounded_up() {
        let [kernel, _, _] = identity_regions(&layout(0x0010_5001, 0x0011_0000));
        assert_eq!(kernel.start(), PhysicalAddress::new(0x0010_0000));
        assert_eq!(kernel.pages(), 6);
        assert_eq!(kernel.end(), 0x0010_6000);

        let [kernel, _, _] = identity_regions(&layout(0x0010_6000, 0x0011_0000));
        assert_eq!(kernel.pages(), 6);
    }

    #[test]
    fn image_ending_in_the_last_page_reaches_four_gigabytes() {
        let [kernel, _, _] = identity_regions(&layout(0xFFFF_F001, 0x0011_0000));
        assert_eq!(kernel.start(), PhysicalAddress::new(0x0010_0000));
        assert_eq!(kernel.pages(), 0x0010_0000 - 0x100);
        assert_eq!(kernel.end(), 1 << 32);
    }

    #[test]
    fn empty_image_maps_nothing() {
        let [kernel, _, _] = identity_regions(&layout(0x0010_0000, 0x0011_0000));
        assert!(kernel.is_empty());
        let [kernel, _, _] = identity_regions(&layout(0x0008_0000, 0x0011_0000));
        assert!(kernel.is_empty());
    }

    #[test]
    fn stack_covers_eight_pages_ending_at_the_stack_pointer() {
        let [_, stack, _] = identity_regions(&layout(0x0010_5000, 0x0012_3ABC));
        assert_eq!(stack.pages(), 8);
        assert_eq!(stack.start(), PhysicalAddress::new(0x0011_C000));
        assert_eq!(stack.end(), 0x0012_4000);

        let frames: Vec<u32> = stack.frames().map(PhysicalAddress::as_u32).collect();
        assert_eq!(frames.first(), Some(&0x0011_C000));
        assert_eq!(frames.last(), Some(&0x0012_3000));
    }

    #[test]
    fn stack_near_zero_is_clipped() {
        let [_, stack, _] = identity_regions(&layout(0x0010_5000, 0x2FF0));
        assert_eq!(stack.start(), PhysicalAddress::new(0));
        assert_eq!(stack.pages(), 3);
    }

    #[test]
    fn text_buffer_is_one_page() {
        let [_, _, vga] = identity_regions(&layout(0x0010_5000, 0x0012_0000));
        assert_eq!(vga.start(), PhysicalAddress::new(0xB8000));
        assert_eq!(vga.pages(), 1);
        assert_eq!(vga.name(), "text buffer");
    }

    #[test]
    fn region_reaching_four_gigabytes() {
        let region = IdentityRegion::new("top", PhysicalAddress::new(0xFFFF_E000), 2);
        assert_eq!(region.end(), 1 << 32);
        assert_eq!(region.frames().last(), Some(PhysicalAddress::new(0xFFFF_F000)));
        assert_eq!(
            region.to_string(),
            "top: 0xFFFFE000 to 0x100000000 (2 pages)"
        );
    }
}
