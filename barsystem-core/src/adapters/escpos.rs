//! ESC/POS receipt printer
//!
//! Encodes text, print modes and bit images into the ESC/POS command
//! stream understood by most serial thermal printers. The stream goes to any
//! `Write` sink; in production that is the printer's serial device file
//! (baud rate and framing are configured on the device, e.g. with `stty`).

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::BitOr;
use std::path::Path;

use crate::domain::result::{Error, Result};
use crate::domain::{Money, Receipt};
use crate::ports::ReceiptPrinter;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;

/// Kodak printers need an XON before the init sequence
const KODAK_WAKE: u8 = 0x11;

/// Characters per line in font B
const PRODUCT_LINE_WIDTH: usize = 54;
/// Characters per line in font A
const RULE_WIDTH: usize = 42;

/// Dots per bit-image band (24-dot double density mode)
const BAND_HEIGHT: usize = 24;
/// Widest image an 80 mm head prints, in dots
const MAX_IMAGE_WIDTH: usize = 576;
const MAX_IMAGE_HEIGHT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Bit set for `ESC !`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintMode(u8);

impl PrintMode {
    pub const FONT_A: PrintMode = PrintMode(0x00);
    pub const FONT_B: PrintMode = PrintMode(0x01);
    pub const EMPHASIZED: PrintMode = PrintMode(0x08);
    pub const DOUBLE_HEIGHT: PrintMode = PrintMode(0x10);
    pub const DOUBLE_WIDTH: PrintMode = PrintMode(0x20);
    pub const UNDERLINE: PrintMode = PrintMode(0x80);

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for PrintMode {
    type Output = PrintMode;

    fn bitor(self, rhs: PrintMode) -> PrintMode {
        PrintMode(self.0 | rhs.0)
    }
}

/// Character code table selected with `ESC t`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTable {
    Cp437,
    Cp850,
    Cp858,
}

impl CodeTable {
    fn selector(self) -> u8 {
        match self {
            Self::Cp437 => 0x00,
            Self::Cp850 => 0x02,
            Self::Cp858 => 0x13,
        }
    }

    /// Encode text into this table; unmappable characters become `?`
    pub fn encode(self, text: &str) -> Vec<u8> {
        text.chars().map(|c| self.encode_char(c)).collect()
    }

    fn encode_char(self, c: char) -> u8 {
        if c.is_ascii() {
            return c as u8;
        }
        // The lower half of the extended range is shared by all three tables
        match c {
            'ü' => 0x81,
            'é' => 0x82,
            'ä' => 0x84,
            'ç' => 0x87,
            'ë' => 0x89,
            'è' => 0x8A,
            'ï' => 0x8B,
            'Ä' => 0x8E,
            'ö' => 0x94,
            'Ö' => 0x99,
            'Ü' => 0x9A,
            'á' => 0xA0,
            'ó' => 0xA2,
            'ú' => 0xA3,
            'ñ' => 0xA4,
            'ß' => 0xE1,
            '€' if self == Self::Cp858 => 0xD5,
            _ => b'?',
        }
    }
}

// =============================================================================
// Bit images
// =============================================================================

/// A black-and-white image, `true` meaning a black dot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize, pixels: Vec<bool>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| Error::Printer(format!("Bitmap of {}x{} is too large", width, height)))?;
        if pixels.len() != expected {
            return Err(Error::Printer(format!(
                "Bitmap of {}x{} needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn pixel(&self, x: usize, y: usize) -> bool {
        y < self.height && x < self.width && self.pixels.get(y * self.width + x) == Some(&true)
    }

    /// Load a logo: Windows BMP or netpbm PBM (P1, P4)
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::Printer(format!("Cannot read logo {:?}: {}", path, e)))?;
        if data.starts_with(b"BM") {
            Self::from_bmp(&data)
        } else {
            Self::from_pbm(&data)
        }
    }

    pub fn from_pbm(data: &[u8]) -> Result<Self> {
        let invalid = |msg: &str| Error::Printer(format!("Invalid PBM image: {}", msg));

        let mut pos = 0;
        let magic = next_token(data, &mut pos).ok_or_else(|| invalid("empty file"))?;
        let width: usize = next_token(data, &mut pos)
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| invalid("bad width"))?;
        let height: usize = next_token(data, &mut pos)
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| invalid("bad height"))?;
        let size = checked_size(width, height).map_err(|e| invalid(e))?;

        let pixels = match magic.as_str() {
            "P1" => {
                let mut pixels = Vec::with_capacity(size);
                let mut in_comment = false;
                for &byte in data.get(pos..).unwrap_or_default() {
                    match byte {
                        b'\n' => in_comment = false,
                        _ if in_comment => {}
                        b'#' => in_comment = true,
                        b'0' => pixels.push(false),
                        b'1' => pixels.push(true),
                        _ => {}
                    }
                }
                pixels.truncate(size);
                pixels
            }
            "P4" => {
                // Exactly one whitespace byte separates header and raster
                let raster = data.get(pos + 1..).unwrap_or_default();
                let row_bytes = width.div_ceil(8);
                if raster.len() < row_bytes * height {
                    return Err(invalid("raster data is truncated"));
                }
                let mut pixels = Vec::with_capacity(size);
                for y in 0..height {
                    for x in 0..width {
                        let byte = raster.get(y * row_bytes + x / 8).copied().unwrap_or(0);
                        pixels.push(byte & (0x80 >> (x % 8)) != 0);
                    }
                }
                pixels
            }
            other => return Err(invalid(&format!("unsupported format {}", other))),
        };

        Self::new(width, height, pixels)
            .map_err(|_| invalid("pixel data does not match the image size"))
    }

    /// Decode an uncompressed BMP (1, 4, 8, 24 or 32 bits per pixel)
    ///
    /// Pixels darker than mid-grey print black.
    pub fn from_bmp(data: &[u8]) -> Result<Self> {
        let invalid = |msg: &str| Error::Printer(format!("Invalid BMP image: {}", msg));
        let u16_at = |at: usize| {
            data.get(at..at + 2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .ok_or_else(|| invalid("header is truncated"))
        };
        let u32_at = |at: usize| {
            data.get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| invalid("header is truncated"))
        };

        if !data.starts_with(b"BM") {
            return Err(invalid("missing BM signature"));
        }
        let offset = u32_at(10)? as usize;
        let header_size = u32_at(14)? as usize;
        let width = u32_at(18)? as i32;
        let raw_height = u32_at(22)? as i32;
        let bpp = u16_at(28)?;
        let compression = u32_at(30)?;

        // 3 is BI_BITFIELDS, which for 32 bpp still means plain BGRA
        if compression != 0 && !(compression == 3 && bpp == 32) {
            return Err(invalid("compressed images are not supported"));
        }
        if width <= 0 || raw_height == 0 || raw_height == i32::MIN {
            return Err(invalid("bad dimensions"));
        }
        let width = width as usize;
        let top_down = raw_height < 0;
        let height = raw_height.unsigned_abs() as usize;
        let size = checked_size(width, height).map_err(|e| invalid(e))?;

        let palette: Vec<bool> = match bpp {
            1 | 4 | 8 => {
                let used = u32_at(46)? as usize;
                let count = if used == 0 || used > 1 << bpp { 1 << bpp } else { used };
                let start = 14 + header_size;
                let table = data
                    .get(start..start + count * 4)
                    .ok_or_else(|| invalid("palette is truncated"))?;
                table
                    .chunks_exact(4)
                    .map(|bgr| is_dark(bgr[2], bgr[1], bgr[0]))
                    .collect()
            }
            24 | 32 => Vec::new(),
            other => return Err(invalid(&format!("{} bits per pixel is not supported", other))),
        };

        let row_size = (usize::from(bpp) * width).div_ceil(32) * 4;
        let raster = data
            .get(offset..)
            .filter(|r| r.len() >= row_size * height)
            .ok_or_else(|| invalid("raster data is truncated"))?;

        let mut pixels = Vec::with_capacity(size);
        for y in 0..height {
            let row_index = if top_down { y } else { height - 1 - y };
            let row = &raster[row_index * row_size..(row_index + 1) * row_size];
            for x in 0..width {
                let dark = match bpp {
                    24 | 32 => {
                        let at = x * usize::from(bpp / 8);
                        is_dark(row[at + 2], row[at + 1], row[at])
                    }
                    _ => {
                        let bit = x * usize::from(bpp);
                        let shift = 8 - usize::from(bpp) - bit % 8;
                        let index = (row[bit / 8] >> shift) & ((1u16 << bpp) - 1) as u8;
                        palette.get(usize::from(index)).copied().unwrap_or(false)
                    }
                };
                pixels.push(dark);
            }
        }

        Self::new(width, height, pixels)
    }

    /// Column-format data for one 24-dot band: three bytes per column, most
    /// significant bit on top
    fn band(&self, band: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.width * 3);
        for x in 0..self.width {
            for slice in 0..3 {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let y = band * BAND_HEIGHT + slice * 8 + bit;
                    if self.pixel(x, y) {
                        byte |= 0x80 >> bit;
                    }
                }
                data.push(byte);
            }
        }
        data
    }
}

/// Pixel count of an image that fits on the paper
fn checked_size(width: usize, height: usize) -> std::result::Result<usize, &'static str> {
    if width == 0 || height == 0 {
        return Err("empty image");
    }
    if width > MAX_IMAGE_WIDTH || height > MAX_IMAGE_HEIGHT {
        return Err("image too large");
    }
    width.checked_mul(height).ok_or("image too large")
}

fn is_dark(red: u8, green: u8, blue: u8) -> bool {
    let luma = u32::from(red) * 299 + u32::from(green) * 587 + u32::from(blue) * 114;
    luma < 128 * 1000
}

fn next_token(data: &[u8], pos: &mut usize) -> Option<String> {
    loop {
        while data.get(*pos).is_some_and(u8::is_ascii_whitespace) {
            *pos += 1;
        }
        if data.get(*pos) == Some(&b'#') {
            while data.get(*pos).is_some_and(|b| *b != b'\n') {
                *pos += 1;
            }
        } else {
            break;
        }
    }
    let start = *pos;
    while data
        .get(*pos)
        .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'#')
    {
        *pos += 1;
    }
    data.get(start..*pos)
        .filter(|t| !t.is_empty())
        .map(|t| String::from_utf8_lossy(t).into_owned())
}

// =============================================================================
// Printer
// =============================================================================

/// ESC/POS command writer
pub struct EscPosPrinter<W: Write> {
    out: W,
    kodak: bool,
    code_table: CodeTable,
    logo: Option<Bitmap>,
}

impl EscPosPrinter<File> {
    /// Open the printer device and initialize it
    pub fn open(device: &Path, kodak: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .map_err(|e| Error::Printer(format!("Cannot open {:?}: {}", device, e)))?;
        let mut printer = Self::new(file, kodak);
        printer.init()?;
        printer.flush()?;
        Ok(printer)
    }
}

impl<W: Write> EscPosPrinter<W> {
    pub fn new(out: W, kodak: bool) -> Self {
        Self {
            out,
            kodak,
            code_table: CodeTable::Cp437,
            logo: None,
        }
    }

    /// Print this image at the top of every receipt
    pub fn with_logo(mut self, logo: Bitmap) -> Self {
        self.logo = Some(logo);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn output(&mut self, data: &[u8]) -> Result<()> {
        self.out
            .write_all(data)
            .map_err(|e| Error::Printer(format!("Write failed: {}", e)))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| Error::Printer(format!("Flush failed: {}", e)))
    }

    /// Reset the printer (`ESC @`)
    pub fn init(&mut self) -> Result<()> {
        if self.kodak {
            self.output(&[KODAK_WAKE])?;
        }
        self.output(&[ESC, b'@'])
    }

    pub fn set_code_table(&mut self, table: CodeTable) -> Result<()> {
        self.code_table = table;
        self.output(&[ESC, b't', table.selector()])
    }

    pub fn set_print_mode(&mut self, mode: PrintMode) -> Result<()> {
        self.output(&[ESC, b'!', mode.bits()])
    }

    pub fn set_align(&mut self, align: Align) -> Result<()> {
        self.output(&[ESC, b'a', align as u8])
    }

    /// Write a line of text in the active code table
    pub fn writeline(&mut self, text: &str) -> Result<()> {
        let encoded = self.code_table.encode(text);
        self.output(&encoded)?;
        self.output(b"\n")
    }

    /// Text on the left, price right-aligned to the font B line width;
    /// with a quantity the text is prefixed by `   Nx `
    pub fn write_product_line(
        &mut self,
        text: &str,
        price: Money,
        quantity: Option<u32>,
    ) -> Result<()> {
        let number_text = if self.kodak {
            format!(" EUR {}", price)
        } else {
            format!(" €{}", price)
        };
        let text = match quantity {
            Some(quantity) => format!("{:>4}x {}", quantity, text),
            None => text.to_string(),
        };
        let text_len = PRODUCT_LINE_WIDTH.saturating_sub(number_text.chars().count());
        let text: String = text.chars().take(text_len).collect();
        self.writeline(&format!("{:<width$}{}", text, number_text, width = text_len))
    }

    /// Feed `lines` lines (`ESC d`)
    pub fn feed(&mut self, lines: u8) -> Result<()> {
        self.output(&[ESC, b'd', lines])
    }

    /// Cut the paper (`GS V`, or `ESC i` on Kodak printers)
    pub fn cut(&mut self, mode: u8) -> Result<()> {
        if self.kodak {
            self.output(&[ESC, b'i'])
        } else {
            self.output(&[GS, b'V', mode])
        }
    }

    /// Pulse drawer pin 0: 120ms on, 240ms off
    pub fn open_drawer(&mut self) -> Result<()> {
        self.output(&[ESC, b'p', 0x00, 0x3C, 0x78])
    }

    /// Print a bit image centered, in 24-dot double density bands
    pub fn print_image(&mut self, image: &Bitmap) -> Result<()> {
        let width = u16::try_from(image.width())
            .map_err(|_| Error::Printer(format!("Image too wide: {}", image.width())))?;
        let [low, high] = width.to_le_bytes();
        // 1 = double horizontal density, 32 = 24-dot vertical
        let header = [ESC, b'*', 33, low, high];

        self.set_align(Align::Center)?;
        self.output(&[ESC, b'3', 16])?;
        for band in 0..image.height().div_ceil(BAND_HEIGHT) {
            self.output(&header)?;
            let data = image.band(band);
            self.output(&data)?;
            self.output(b"\n")?;
        }
        self.output(&[ESC, b'2'])
    }
}

impl<W: Write> ReceiptPrinter for EscPosPrinter<W> {
    fn print_receipt(&mut self, receipt: &Receipt, title: &str) -> Result<()> {
        self.init()?;
        self.set_code_table(CodeTable::Cp858)?;
        if let Some(logo) = self.logo.clone() {
            self.print_image(&logo)?;
        }
        self.feed(1)?;
        self.set_align(Align::Center)?;
        self.set_print_mode(PrintMode::FONT_A)?;
        self.writeline(&format!("*** {} ***", title))?;
        self.feed(1)?;
        self.set_align(Align::Left)?;
        self.writeline(&format!("Customer {}", receipt.customer))?;
        self.writeline(&format!(
            "Date     {}",
            receipt.issued_at.format("%Y-%m-%d %H:%M:%S")
        ))?;
        self.feed(2)?;

        self.set_print_mode(PrintMode::FONT_B)?;
        for line in &receipt.lines {
            self.write_product_line(&line.description, line.total, line.quantity)?;
        }

        self.set_print_mode(PrintMode::FONT_A)?;
        self.writeline(&"-".repeat(RULE_WIDTH))?;
        self.set_print_mode(PrintMode::FONT_B | PrintMode::EMPHASIZED | PrintMode::DOUBLE_HEIGHT)?;
        for (index, (label, amount)) in receipt.totals().into_iter().enumerate() {
            self.write_product_line(label, amount, None)?;
            if index == 0 {
                self.set_print_mode(PrintMode::FONT_B | PrintMode::EMPHASIZED)?;
                self.feed(1)?;
            }
        }
        self.set_print_mode(PrintMode::FONT_A)?;

        self.feed(6)?;
        self.cut(0)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::domain::{ReceiptLine, SettlementKind};

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn receipt() -> Receipt {
        Receipt {
            kind: SettlementKind::Purchase,
            customer: "Zeus".to_string(),
            issued_at: Local.with_ymd_and_hms(2024, 3, 1, 21, 30, 0).unwrap(),
            lines: vec![ReceiptLine {
                description: "Club-Mate".to_string(),
                quantity: Some(2),
                total: Money::from_cents(300),
            }],
            total: Money::from_cents(300),
            balance_before: Money::from_cents(1000),
            balance_after: Money::from_cents(700),
        }
    }

    #[test]
    fn test_init_sequence() {
        let mut printer = EscPosPrinter::new(Vec::new(), false);
        printer.init().unwrap();
        assert_eq!(printer.into_inner(), vec![ESC, b'@']);

        let mut printer = EscPosPrinter::new(Vec::new(), true);
        printer.init().unwrap();
        assert_eq!(printer.into_inner(), vec![0x11, ESC, b'@']);
    }

    #[test]
    fn test_print_mode_bits_combine() {
        let mode = PrintMode::FONT_B | PrintMode::EMPHASIZED | PrintMode::DOUBLE_HEIGHT;
        assert_eq!(mode.bits(), 0x19);
        assert_eq!((PrintMode::DOUBLE_WIDTH | PrintMode::UNDERLINE).bits(), 0xA0);
    }

    #[test]
    fn test_code_table_encoding() {
        assert_eq!(CodeTable::Cp858.encode("€1"), vec![0xD5, b'1']);
        assert_eq!(CodeTable::Cp850.encode("€"), vec![b'?']);
        assert_eq!(CodeTable::Cp437.encode("Müller"), b"M\x81ller".to_vec());
    }

    #[test]
    fn test_product_line_layout() {
        let mut printer = EscPosPrinter::new(Vec::new(), false);
        printer.set_code_table(CodeTable::Cp858).unwrap();
        printer
            .write_product_line("Club-Mate", Money::from_cents(300), Some(2))
            .unwrap();
        let bytes = printer.into_inner();

        let mut expected = vec![ESC, b't', 0x13];
        expected.extend(format!("{:<48}", "   2x Club-Mate").bytes());
        expected.extend([b' ', 0xD5]);
        expected.extend(b"3.00\n");
        assert_eq!(bytes, expected);
        // 54 printable columns plus the newline
        assert_eq!(bytes.len() - 3, 55);
    }

    #[test]
    fn test_kodak_product_line_and_cut() {
        let mut printer = EscPosPrinter::new(Vec::new(), true);
        printer
            .write_product_line("Total", Money::from_cents(1250), None)
            .unwrap();
        printer.cut(0).unwrap();
        let bytes = printer.into_inner();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with(&format!("{:<45} EUR 12.50\n", "Total")));
        assert!(bytes.ends_with(&[ESC, b'i']));
    }

    #[test]
    fn test_long_text_keeps_price_aligned() {
        let mut printer = EscPosPrinter::new(Vec::new(), true);
        let long = "x".repeat(80);
        printer
            .write_product_line(&long, Money::from_cents(5), None)
            .unwrap();
        let bytes = printer.into_inner();
        assert_eq!(bytes.len(), PRODUCT_LINE_WIDTH + 1);
        assert!(bytes.ends_with(b" EUR 0.05\n"));
    }

    #[test]
    fn test_receipt_layout() {
        let mut printer = EscPosPrinter::new(Vec::new(), false);
        printer.print_receipt(&receipt(), "TkkrLab barsystem").unwrap();
        let bytes = printer.into_inner();

        assert!(bytes.starts_with(&[ESC, b'@', ESC, b't', 0x13]));
        assert!(contains(&bytes, b"*** TkkrLab barsystem ***\n"));
        assert!(contains(&bytes, b"Customer Zeus\n"));
        assert!(contains(&bytes, b"Date     2024-03-01 21:30:00\n"));
        assert!(contains(&bytes, b"   2x Club-Mate"));
        assert!(contains(&bytes, &[ESC, b'!', 0x19]));
        assert!(contains(&bytes, b"Balance after transaction"));
        assert!(contains(&bytes, &"-".repeat(RULE_WIDTH).into_bytes()));
        assert!(bytes.ends_with(&[ESC, b'd', 6, GS, b'V', 0]));
    }

    #[test]
    fn test_open_drawer_pulse() {
        let mut printer = EscPosPrinter::new(Vec::new(), false);
        printer.open_drawer().unwrap();
        assert_eq!(printer.into_inner(), vec![ESC, b'p', 0x00, 0x3C, 0x78]);
    }

    #[test]
    fn test_parse_p1_with_comment() {
        let pbm = b"P1\n# logo\n3 2\n1 0 1\n0 1 0\n";
        let bitmap = Bitmap::from_pbm(pbm).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        assert!(bitmap.pixel(0, 0));
        assert!(!bitmap.pixel(1, 0));
        assert!(bitmap.pixel(1, 1));
    }

    #[test]
    fn test_parse_p4() {
        // 10x2: first row all black, second row only the last dot
        let mut pbm = b"P4\n10 2\n".to_vec();
        pbm.extend([0xFF, 0xC0, 0x00, 0x40]);
        let bitmap = Bitmap::from_pbm(&pbm).unwrap();
        assert!((0..10).all(|x| bitmap.pixel(x, 0)));
        assert!(!bitmap.pixel(8, 1));
        assert!(bitmap.pixel(9, 1));
    }

    #[test]
    fn test_reject_bad_pbm() {
        assert!(Bitmap::from_pbm(b"P6\n1 1\n").is_err());
        assert!(Bitmap::from_pbm(b"P4\n16 4\n\x00").is_err());
        assert!(Bitmap::from_pbm(b"").is_err());
    }

    #[test]
    fn test_reject_oversized_images() {
        let err = Bitmap::from_pbm(b"P4\n99999999999999999 99999999999999999\n").unwrap_err();
        assert!(err.to_string().contains("image too large"));
        assert!(Bitmap::from_pbm(b"P1\n577 1\n").is_err());
        assert!(Bitmap::from_pbm(b"P1\n0 4\n").is_err());
        assert!(Bitmap::new(usize::MAX, 2, Vec::new()).is_err());

        let huge = bmp(100_000, 100_000, 24, &[], &[]);
        assert!(Bitmap::from_bmp(&huge).is_err());
    }

    fn bmp(width: i32, height: i32, bpp: u16, palette: &[[u8; 4]], raster: &[u8]) -> Vec<u8> {
        let offset = 54 + palette.len() as u32 * 4;
        let mut data = b"BM".to_vec();
        data.extend((offset + raster.len() as u32).to_le_bytes());
        data.extend(0u32.to_le_bytes());
        data.extend(offset.to_le_bytes());
        data.extend(40u32.to_le_bytes());
        data.extend(width.to_le_bytes());
        data.extend(height.to_le_bytes());
        data.extend(1u16.to_le_bytes());
        data.extend(bpp.to_le_bytes());
        data.extend(0u32.to_le_bytes());
        data.extend((raster.len() as u32).to_le_bytes());
        data.extend(2835u32.to_le_bytes());
        data.extend(2835u32.to_le_bytes());
        data.extend((palette.len() as u32).to_le_bytes());
        data.extend(0u32.to_le_bytes());
        for entry in palette {
            data.extend(entry);
        }
        data.extend(raster);
        data
    }

    #[test]
    fn test_parse_monochrome_bmp() {
        // Stored bottom-up: the last raster row is the top of the image
        let data = bmp(3, 2, 1, &[[0, 0, 0, 0], [255, 255, 255, 0]], &[
            0xA0, 0, 0, 0, //
            0x40, 0, 0, 0,
        ]);
        let bitmap = Bitmap::from_bmp(&data).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
        assert!(bitmap.pixel(0, 0) && !bitmap.pixel(1, 0) && bitmap.pixel(2, 0));
        assert!(!bitmap.pixel(0, 1) && bitmap.pixel(1, 1) && !bitmap.pixel(2, 1));
    }

    #[test]
    fn test_parse_truecolor_bmp_top_down() {
        let data = bmp(2, -1, 24, &[], &[0x10, 0x10, 0x10, 0xF0, 0xF0, 0xF0, 0, 0]);
        let bitmap = Bitmap::from_bmp(&data).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (2, 1));
        assert!(bitmap.pixel(0, 0));
        assert!(!bitmap.pixel(1, 0));
    }

    #[test]
    fn test_reject_bad_bmp() {
        let mut compressed = bmp(1, 1, 8, &[[0, 0, 0, 0]], &[0, 0, 0, 0]);
        compressed[30] = 1;
        assert!(Bitmap::from_bmp(&compressed).is_err());
        assert!(Bitmap::from_bmp(&bmp(4, 4, 24, &[], &[0; 8])).is_err());
        assert!(Bitmap::from_bmp(b"BM").is_err());
    }

    #[test]
    fn test_load_picks_format_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.bmp");
        std::fs::write(&logo, bmp(1, 1, 24, &[], &[0, 0, 0, 0])).unwrap();
        assert!(Bitmap::load(&logo).unwrap().pixel(0, 0));

        let logo = dir.path().join("logo.pbm");
        std::fs::write(&logo, b"P1\n1 1\n0\n").unwrap();
        assert!(!Bitmap::load(&logo).unwrap().pixel(0, 0));
    }

    #[test]
    fn test_image_bands() {
        // 2 columns, 25 rows: one full band plus one row in a second band
        let mut pixels = vec![false; 2 * 25];
        pixels[0] = true; // (0, 0)
        pixels[2 * 24 + 1] = true; // (1, 24)
        let bitmap = Bitmap::new(2, 25, pixels).unwrap();

        let mut printer = EscPosPrinter::new(Vec::new(), false);
        printer.print_image(&bitmap).unwrap();
        let bytes = printer.into_inner();

        let mut expected = vec![ESC, b'a', 1, ESC, b'3', 16];
        expected.extend([ESC, b'*', 33, 2, 0, 0x80, 0, 0, 0, 0, 0, b'\n']);
        expected.extend([ESC, b'*', 33, 2, 0, 0, 0, 0, 0x80, 0, 0, b'\n']);
        expected.extend([ESC, b'2']);
        assert_eq!(bytes, expected);
    }
}
