//! Built-in converters.
//!
//! Every converter writes through [`write_atomic`], so a failed conversion
//! never leaves a truncated destination behind.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::config::PdfLayout;
use crate::error::ConversionError;
use crate::persist::{partial_write, write_atomic};
use crate::registry::Converter;

const A4_WIDTH_MM: f32 = 210.0;
const A4_HEIGHT_MM: f32 = 297.0;

fn open_source(path: &Path) -> Result<BufReader<File>, ConversionError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConversionError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

/// Stream `source` to `dest` one line at a time, passing every line
/// (terminator included) through `map`.
fn copy_lines<F>(source: &Path, dest: &Path, mut map: F) -> Result<(), ConversionError>
where
    F: FnMut(&mut [u8]),
{
    let mut reader = open_source(source)?;
    write_atomic(dest, |w| {
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|source_err| ConversionError::SourceUnreadable {
                    path: source.to_path_buf(),
                    source: source_err,
                })?;
            if n == 0 {
                break;
            }
            map(&mut line);
            w.write_all(&line).map_err(|e| partial_write(dest, e))?;
        }
        Ok(())
    })
}

/// TXT → TXT, byte for byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCopy;

impl Converter for TextCopy {
    fn name(&self) -> &str {
        "txt-copy"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        copy_lines(source, dest, |_| {})
    }
}

/// TXT → CSV: every ASCII space becomes a comma.
///
/// Commas already present are not quoted, so fields containing commas do not
/// survive the trip.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextToCsv;

pub(crate) fn spaces_to_commas(line: &mut [u8]) {
    for b in line.iter_mut() {
        if *b == b' ' {
            *b = b',';
        }
    }
}

impl Converter for TextToCsv {
    fn name(&self) -> &str {
        "txt-to-csv"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        copy_lines(source, dest, spaces_to_commas)
    }
}

/// Where a single text line lands in the output PDF
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePlacement {
    /// Zero-based page index
    pub page: usize,
    /// Baseline in points from the bottom of the page
    pub y: f32,
}

/// Lay out `line_count` lines top to bottom, breaking to a new page before a
/// line would sit below the bottom margin.
pub fn paginate(line_count: usize, layout: &PdfLayout) -> Vec<LinePlacement> {
    let mut placements = Vec::with_capacity(line_count);
    let mut page = 0;
    let mut y = layout.top;
    for _ in 0..line_count {
        if y < layout.bottom_margin {
            page += 1;
            y = layout.top;
        }
        placements.push(LinePlacement { page, y });
        y -= layout.line_height;
    }
    placements
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// TXT → PDF: one left-aligned Helvetica line per input line on A4 pages.
#[derive(Debug, Default, Clone)]
pub struct TextToPdf {
    layout: PdfLayout,
}

impl TextToPdf {
    pub fn new(layout: PdfLayout) -> Self {
        Self { layout }
    }
}

impl Converter for TextToPdf {
    fn name(&self) -> &str {
        "txt-to-pdf"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        let bytes = fs::read(source).map_err(|e| ConversionError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();

        let title = source
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("converted");
        let (doc, first_page, first_layer) =
            PdfDocument::new(title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ConversionError::codec(dest, e))?;

        let mut current_page = 0;
        let mut layer = doc.get_page(first_page).get_layer(first_layer);
        for (line, placement) in lines.iter().zip(paginate(lines.len(), &self.layout)) {
            if placement.page != current_page {
                let (page, page_layer) =
                    doc.add_page(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
                layer = doc.get_page(page).get_layer(page_layer);
                current_page = placement.page;
            }
            layer.use_text(
                *line,
                self.layout.font_size,
                pt_to_mm(self.layout.left_margin),
                pt_to_mm(placement.y),
                &font,
            );
        }

        write_atomic(dest, |w| {
            doc.save(w).map_err(|e| ConversionError::codec(dest, e))
        })
    }
}

/// PNG → JPEG: decode to 8-bit RGBA, drop alpha, encode baseline JPEG.
#[derive(Debug, Clone, Copy)]
pub struct PngToJpeg {
    quality: u8,
}

impl PngToJpeg {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for PngToJpeg {
    fn default() -> Self {
        Self::new(75)
    }
}

impl Converter for PngToJpeg {
    fn name(&self) -> &str {
        "png-to-jpeg"
    }

    fn convert(&self, source: &Path, dest: &Path) -> Result<(), ConversionError> {
        let bytes = fs::read(source).map_err(|e| ConversionError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        })?;
        let rgba = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|e| ConversionError::codec(source, e))?
            .to_rgba8();
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        write_atomic(dest, |w| {
            JpegEncoder::new_with_quality(&mut *w, self.quality)
                .encode_image(&rgb)
                .map_err(|e| ConversionError::codec(dest, e))
        })
    }
}
