//! Raster line packing and command framing.

use crate::error::{Error, Result};

/// A monochrome bitmap, one row per raster line.
///
/// Width runs across the tape and must match the media pixel span; height
/// runs along the tape.
pub trait Bitmap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn is_black(&self, x: u32, y: u32) -> bool;
}

impl<T: Bitmap + ?Sized> Bitmap for &T {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn is_black(&self, x: u32, y: u32) -> bool {
        (**self).is_black(x, y)
    }
}

/// Owned monochrome bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoImage {
    width: u32,
    height: u32,
    pixels: Vec<bool>,
}

impl MonoImage {
    /// All white bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        MonoImage {
            width,
            height,
            pixels: vec![false; width as usize * height as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) outside {}x{} image",
            x,
            y,
            self.width,
            self.height
        );
        y as usize * self.width as usize + x as usize
    }

    pub fn from_fn<F: FnMut(u32, u32) -> bool>(width: u32, height: u32, mut black: F) -> Self {
        let mut image = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.set(x, y, black(x, y));
            }
        }
        image
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the image.
    pub fn set(&mut self, x: u32, y: u32, black: bool) {
        let i = self.index(x, y);
        self.pixels[i] = black;
    }
}

impl Bitmap for MonoImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    /// Panics if `(x, y)` lies outside the image.
    fn is_black(&self, x: u32, y: u32) -> bool {
        self.pixels[self.index(x, y)]
    }
}

/// Opcode of the uncompressed raster line command.
///
/// Vendor documents and shipping drivers disagree on the byte, so both are
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCommand {
    /// `G`
    #[default]
    Transfer = 0x47,
    /// `g`
    TransferLegacy = 0x67,
}

fn line_len(total_pins: u32) -> usize {
    ((total_pins + 7) / 8) as usize
}

/// Pack row `row` of `bitmap` into one bit per pin, MSB first.
///
/// Pixel `i` of the row lands on pin `pin_offset + i`; every other pin is
/// left blank.
pub fn pack_line<B: Bitmap + ?Sized>(
    bitmap: &B,
    row: u32,
    pin_offset: u32,
    total_pins: u32,
) -> Result<Vec<u8>> {
    let width = bitmap.width();
    if pin_offset
        .checked_add(width)
        .map_or(true, |end| end > total_pins)
    {
        return Err(Error::LineOverflow {
            width,
            offset: pin_offset,
            total: total_pins,
        });
    }

    let mut line = vec![0u8; line_len(total_pins)];
    for x in 0..width {
        if bitmap.is_black(x, row) {
            let pin = (pin_offset + x) as usize;
            line[pin / 8] |= 0x80 >> (pin % 8);
        }
    }
    Ok(line)
}

/// Blank line, used to pad labels to the minimum length.
pub fn empty_line(total_pins: u32) -> Vec<u8> {
    vec![0u8; line_len(total_pins)]
}

/// Builder for one stretch of the command stream.
pub struct CommandBuffer {
    buf: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        CommandBuffer { buf: Vec::new() }
    }

    /// Clear whatever half-received command the printer holds.
    pub fn invalidate(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x00; 100]);
        self
    }

    /// ESC @
    pub fn initialize(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x40]);
        self
    }

    /// ESC i a 1
    pub fn raster_mode(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x69, 0x61, 0x01]);
        self
    }

    /// ESC i z
    ///
    /// Only the media width is validated by the printer. Printer recovery is
    /// always on.
    pub fn print_information(
        &mut self,
        media_width: u8,
        raster_lines: u32,
        first_page: bool,
    ) -> &mut Self {
        self.buf
            .extend_from_slice(&[0x1B, 0x69, 0x7A, 0x84, 0x00, media_width, 0x00]);
        self.buf.extend_from_slice(&raster_lines.to_le_bytes());
        self.buf.push(if first_page { 0x00 } else { 0x01 });
        self.buf.push(0x00);
        self
    }

    /// ESC i M
    pub fn mode_settings(&mut self, auto_cut: bool) -> &mut Self {
        self.buf
            .extend_from_slice(&[0x1B, 0x69, 0x4D, if auto_cut { 0x40 } else { 0x00 }]);
        self
    }

    /// ESC i K
    pub fn advanced_mode_settings(&mut self, chain: bool) -> &mut Self {
        self.buf
            .extend_from_slice(&[0x1B, 0x69, 0x4B, if chain { 0x08 } else { 0x00 }]);
        self
    }

    /// ESC i d
    pub fn margin(&mut self, dots: u16) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x69, 0x64]);
        self.buf.extend_from_slice(&dots.to_le_bytes());
        self
    }

    /// M 0
    pub fn no_compression(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x4D, 0x00]);
        self
    }

    /// Frame one line of pin data. The length field is 16 bits wide.
    pub fn raster_line(&mut self, command: LineCommand, line: &[u8]) -> Result<&mut Self> {
        let len = u16::try_from(line.len()).map_err(|_| Error::LineTooLong(line.len()))?;
        self.buf.push(command as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(line);
        Ok(self)
    }

    /// FF, print without feeding so the next page chains on.
    pub fn print(&mut self) -> &mut Self {
        self.buf.push(0x0C);
        self
    }

    /// Control-Z, print then feed and cut.
    pub fn print_and_feed(&mut self) -> &mut Self {
        self.buf.push(0x1A);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}
