//! # VGA Text Mode
//!
//! An 80x25 grid of two-byte cells: the low byte is the code page 437 glyph,
//! the high byte the colour attribute.
//!
//! ```text
//!  15  14..12      11..8        7..0
//! ┌───┬──────────┬────────────┬────────┐
//! │ B │ bg color │ fg color   │ glyph  │
//! └───┴──────────┴────────────┴────────┘
//! ```

use bitfield_struct::bitfield;
use core::fmt;
use kernel_info::memory::{VGA_HEIGHT, VGA_TEXT_BUFFER, VGA_WIDTH};

/// Number of cells on screen.
pub const CELLS: usize = VGA_WIDTH * VGA_HEIGHT;

/// Light grey on black.
pub const DEFAULT_ATTRIBUTE: u8 = 0x07;

/// Glyph drawn for characters outside ASCII.
const REPLACEMENT_GLYPH: u8 = 0xFE;

/// One character cell of the text buffer.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct VgaCell {
    /// Code page 437 glyph.
    pub ascii: u8,
    #[bits(4)]
    pub foreground: u8,
    #[bits(3)]
    pub background: u8,
    /// Blink, or bright background when blinking is disabled.
    pub blink: bool,
}

impl VgaCell {
    /// A cell showing `ascii` with the given raw attribute byte.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn with_attribute(ascii: u8, attribute: u8) -> Self {
        Self::from_bits(((attribute as u16) << 8) | ascii as u16)
    }

    /// The raw attribute byte.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn attribute(self) -> u8 {
        (self.into_bits() >> 8) as u8
    }

    const fn blank(attribute: u8) -> Self {
        Self::with_attribute(b' ', attribute)
    }
}

/// Storage for [`CELLS`] text cells, addressed row-major.
pub trait CellBuffer {
    fn read_cell(&self, index: usize) -> VgaCell;
    fn write_cell(&mut self, index: usize, cell: VgaCell);
}

impl CellBuffer for [VgaCell; CELLS] {
    #[inline]
    fn read_cell(&self, index: usize) -> VgaCell {
        self[index]
    }

    #[inline]
    fn write_cell(&mut self, index: usize, cell: VgaCell) {
        self[index] = cell;
    }
}

/// The memory-mapped text buffer, accessed with volatile reads and writes.
#[derive(Debug)]
pub struct VgaMemory {
    base: *mut u16,
}

// The buffer is a fixed device window; exclusive access is the owner's job.
unsafe impl Send for VgaMemory {}

impl VgaMemory {
    /// The buffer at `0xB8000`.
    ///
    /// # Safety
    /// The address must be mapped (identity-mapped once paging is on) and no
    /// other `VgaMemory` may exist.
    #[must_use]
    pub unsafe fn text_mode() -> Self {
        Self {
            base: core::ptr::with_exposed_provenance_mut(VGA_TEXT_BUFFER as usize),
        }
    }
}

impl CellBuffer for VgaMemory {
    #[inline]
    fn read_cell(&self, index: usize) -> VgaCell {
        assert!(index < CELLS);
        VgaCell::from_bits(unsafe { self.base.add(index).read_volatile() })
    }

    #[inline]
    fn write_cell(&mut self, index: usize, cell: VgaCell) {
        assert!(index < CELLS);
        unsafe { self.base.add(index).write_volatile(cell.into_bits()) };
    }
}

/// Teletype-style writer over a [`CellBuffer`].
///
/// `\r` returns to column 0, `\n` moves to the start of the next row, and
/// writing into the last column wraps. Moving past the last row scrolls the
/// screen up by one row and blanks the bottom row.
#[derive(Debug)]
pub struct VgaWriter<B> {
    buffer: B,
    row: usize,
    col: usize,
    attribute: u8,
}

impl<B: CellBuffer> VgaWriter<B> {
    /// Writer with the cursor in the top-left corner. Existing contents are
    /// left in place.
    #[must_use]
    pub const fn new(buffer: B) -> Self {
        Self {
            buffer,
            row: 0,
            col: 0,
            attribute: DEFAULT_ATTRIBUTE,
        }
    }

    /// `(row, column)` of the next glyph.
    #[must_use]
    pub const fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    #[must_use]
    pub const fn attribute(&self) -> u8 {
        self.attribute
    }

    pub const fn set_attribute(&mut self, attribute: u8) {
        self.attribute = attribute;
    }

    #[must_use]
    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    /// Blank the whole screen and home the cursor.
    pub fn clear(&mut self) {
        let blank = VgaCell::blank(self.attribute);
        for i in 0..CELLS {
            self.buffer.write_cell(i, blank);
        }
        self.row = 0;
        self.col = 0;
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\r' => {
                self.col = 0;
                return;
            }
            b'\n' => {
                self.row += 1;
                self.col = 0;
            }
            glyph => {
                let cell = VgaCell::with_attribute(glyph, self.attribute);
                self.buffer.write_cell(self.row * VGA_WIDTH + self.col, cell);
                self.col += 1;
                if self.col >= VGA_WIDTH {
                    self.col = 0;
                    self.row += 1;
                }
            }
        }

        if self.row >= VGA_HEIGHT {
            self.scroll_up();
            self.row = VGA_HEIGHT - 1;
        }
    }

    fn scroll_up(&mut self) {
        for i in VGA_WIDTH..CELLS {
            let cell = self.buffer.read_cell(i);
            self.buffer.write_cell(i - VGA_WIDTH, cell);
        }
        let blank = VgaCell::blank(self.attribute);
        for i in CELLS - VGA_WIDTH..CELLS {
            self.buffer.write_cell(i, blank);
        }
    }
}

impl<B: CellBuffer> fmt::Write for VgaWriter<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            let byte = u8::try_from(c).ok().filter(u8::is_ascii);
            self.write_byte(byte.unwrap_or(REPLACEMENT_GLYPH));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::fmt::Write;

    pub(crate) type Screen = [VgaCell; CELLS];

    pub(crate) fn blank_screen() -> Screen {
        [VgaCell::blank(DEFAULT_ATTRIBUTE); CELLS]
    }

    pub(crate) fn row_text(screen: &Screen, row: usize) -> String {
        screen[row * VGA_WIDTH..(row + 1) * VGA_WIDTH]
            .iter()
            .map(|cell| char::from(cell.ascii()))
            .collect::<String>()
            .trim_end()
            .to_owned()
    }

    #[test]
    fn cell_layout() {
        let cell = VgaCell::with_attribute(b'A', 0x1F);
        assert_eq!(cell.into_bits(), 0x1F41);
        assert_eq!(cell.ascii(), b'A');
        assert_eq!(cell.foreground(), 0xF);
        assert_eq!(cell.background(), 0x1);
        assert!(!cell.blink());
        assert_eq!(cell.attribute(), 0x1F);
        assert!(VgaCell::with_attribute(b' ', 0x80).blink());
    }

    #[test]
    fn glyphs_use_the_default_attribute() {
        let mut vga = VgaWriter::new(blank_screen());
        vga.write_str("ok").unwrap();
        assert_eq!(vga.buffer()[0].into_bits(), 0x076F);
        assert_eq!(vga.buffer()[1].into_bits(), 0x076B);
        assert_eq!(vga.cursor(), (0, 2));
    }

    #[test]
    fn newline_moves_to_the_next_row() {
        let mut vga = VgaWriter::new(blank_screen());
        vga.write_str("first\nsecond").unwrap();
        assert_eq!(row_text(vga.buffer(), 0), "first");
        assert_eq!(row_text(vga.buffer(), 1), "second");
        assert_eq!(vga.cursor(), (1, 6));
    }

    #[test]
    fn carriage_return_overwrites_the_row() {
        let mut vga = VgaWriter::new(blank_screen());
        vga.write_str("loading\rdone").unwrap();
        assert_eq!(row_text(vga.buffer(), 0), "doneing");
        assert_eq!(vga.cursor(), (0, 4));
    }

    #[test]
    fn last_column_wraps() {
        let mut vga = VgaWriter::new(blank_screen());
        let line = "x".repeat(VGA_WIDTH);
        vga.write_str(&line).unwrap();
        assert_eq!(vga.cursor(), (1, 0));
        vga.write_str("y").unwrap();
        assert_eq!(row_text(vga.buffer(), 0), line);
        assert_eq!(row_text(vga.buffer(), 1), "y");
    }

    #[test]
    fn scrolls_at_the_bottom() {
        let mut vga = VgaWriter::new(blank_screen());
        for i in 0..VGA_HEIGHT {
            writeln!(vga, "line {i}").unwrap();
        }

        // 25 newlines pushed line 0 off the top.
        assert_eq!(vga.cursor(), (VGA_HEIGHT - 1, 0));
        assert_eq!(row_text(vga.buffer(), 0), "line 1");
        assert_eq!(row_text(vga.buffer(), VGA_HEIGHT - 2), "line 24");
        assert_eq!(row_text(vga.buffer(), VGA_HEIGHT - 1), "");
        assert_eq!(
            vga.buffer()[CELLS - 1].into_bits(),
            VgaCell::blank(DEFAULT_ATTRIBUTE).into_bits()
        );
    }

    #[test]
    fn non_ascii_becomes_a_block() {
        let mut vga = VgaWriter::new(blank_screen());
        vga.write_str("a→b").unwrap();
        assert_eq!(vga.buffer()[1].ascii(), 0xFE);
        assert_eq!(vga.cursor(), (0, 3));
    }

    #[test]
    fn clear_homes_the_cursor() {
        let mut vga = VgaWriter::new(blank_screen());
        vga.set_attribute(0x1F);
        vga.write_str("junk\nmore").unwrap();
        vga.clear();
        assert_eq!(vga.cursor(), (0, 0));
        assert!(vga.buffer().iter().all(|c| *c == VgaCell::blank(0x1F)));
    }
}
