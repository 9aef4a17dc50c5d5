//! Minimal FITS primary-HDU reader and writer
//!
//! Supports 2-D images with BITPIX 8, 16, 32, -32 and -64. Extensions,
//! compressed images and BLANK handling for integer data are not supported.

use anyhow::{Context, Result, anyhow, bail, ensure};
use std::collections::BTreeMap;
use std::path::Path;

use super::median;
use crate::processing::{Frame, FramePreprocessor, Image};

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Loads a frame, applies BSCALE/BZERO and optionally removes the median background
#[derive(Debug, Clone)]
pub struct FitsPreprocessor {
    pub subtract_background: bool,
}

impl Default for FitsPreprocessor {
    fn default() -> Self {
        Self {
            subtract_background: true,
        }
    }
}

impl FramePreprocessor for FitsPreprocessor {
    fn preprocess(&self, path: &Path) -> Result<Frame> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut frame = parse_primary_hdu(&bytes)?;

        if self.subtract_background {
            let background = median(frame.image.pixels.iter().copied()).unwrap_or(0.0);
            for pixel in &mut frame.image.pixels {
                *pixel = if pixel.is_finite() {
                    *pixel - background
                } else {
                    0.0
                };
            }
            tracing::trace!(path = %path.display(), background, "Subtracted background");
        }

        Ok(frame)
    }
}

/// Decode the primary header and image of a FITS byte stream
pub fn parse_primary_hdu(bytes: &[u8]) -> Result<Frame> {
    let (header, data_offset) = parse_header(bytes)?;

    let simple = header.get("SIMPLE").map(String::as_str);
    ensure!(simple == Some("T"), "not a FITS file (SIMPLE = {simple:?})");

    let bitpix = header_int(&header, "BITPIX")?;
    let naxis = header_int(&header, "NAXIS")?;
    ensure!(naxis == 2, "expected a 2-D image, found NAXIS = {naxis}");

    let width = usize::try_from(header_int(&header, "NAXIS1")?).context("negative NAXIS1")?;
    let height = usize::try_from(header_int(&header, "NAXIS2")?).context("negative NAXIS2")?;
    let bscale = header_float(&header, "BSCALE")?.unwrap_or(1.0);
    let bzero = header_float(&header, "BZERO")?.unwrap_or(0.0);

    let sample_size = match bitpix {
        8 => 1,
        16 => 2,
        32 | -32 => 4,
        -64 => 8,
        other => bail!("unsupported BITPIX {other}"),
    };

    let count = width
        .checked_mul(height)
        .ok_or_else(|| anyhow!("image size {width}x{height} overflows"))?;
    let data_end = count
        .checked_mul(sample_size)
        .and_then(|len| len.checked_add(data_offset))
        .ok_or_else(|| anyhow!("data unit of {count} samples overflows"))?;
    let data = bytes
        .get(data_offset..data_end)
        .ok_or_else(|| anyhow!("truncated data unit: expected {count} samples"))?;

    let pixels = data
        .chunks_exact(sample_size)
        .map(|raw| {
            let value = match bitpix {
                8 => raw[0] as f64,
                16 => i16::from_be_bytes([raw[0], raw[1]]) as f64,
                32 => i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                -32 => f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                _ => f64::from_be_bytes([
                    raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
                ]),
            };
            bzero + bscale * value
        })
        .collect();

    Ok(Frame {
        header,
        image: Image::new(width, height, pixels)?,
    })
}

/// Returns the header cards and the offset of the data unit
fn parse_header(bytes: &[u8]) -> Result<(BTreeMap<String, String>, usize)> {
    let mut header = BTreeMap::new();

    for (index, card) in bytes.chunks_exact(CARD_SIZE).enumerate() {
        let card = std::str::from_utf8(card)
            .ok()
            .filter(|card| card.is_ascii())
            .ok_or_else(|| anyhow!("header card {index} is not ASCII"))?;
        let key = card[..8].trim_end();

        if key == "END" {
            let header_len = (index + 1) * CARD_SIZE;
            let data_offset = header_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
            return Ok((header, data_offset));
        }

        if card.get(8..10) == Some("= ") {
            header
                .entry(key.to_string())
                .or_insert_with(|| card_value(&card[10..]));
        }
    }

    bail!("header has no END card")
}

/// Value part of a card with quotes and trailing comment removed
fn card_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        // '' is an escaped quote inside a string value
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    value.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        return value.trim_end().to_string();
    }

    raw.split('/').next().unwrap_or("").trim().to_string()
}

fn header_int(header: &BTreeMap<String, String>, key: &str) -> Result<i64> {
    let value = header
        .get(key)
        .ok_or_else(|| anyhow!("missing {key} keyword"))?;
    value
        .parse()
        .with_context(|| format!("invalid {key} value '{value}'"))
}

fn header_float(header: &BTreeMap<String, String>, key: &str) -> Result<Option<f64>> {
    header
        .get(key)
        .map(|value| {
            value
                .replace('D', "E")
                .parse()
                .with_context(|| format!("invalid {key} value '{value}'"))
        })
        .transpose()
}

/// Encode header cards, padded to whole blocks
pub(crate) fn encode_header(cards: &[(&str, String)]) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in cards {
        out.push_str(&format!("{key:<8}= {value:>20}").chars().take(CARD_SIZE).collect::<String>());
        pad_to(&mut out, CARD_SIZE);
    }
    out.push_str("END");
    pad_to(&mut out, CARD_SIZE);
    pad_to(&mut out, BLOCK_SIZE);
    out.into_bytes()
}

fn pad_to(out: &mut String, multiple: usize) {
    let rem = out.len() % multiple;
    if rem != 0 {
        out.push_str(&" ".repeat(multiple - rem));
    }
}

/// Write `image` as a single-HDU FITS file with 32-bit float pixels
pub fn write_image(path: &Path, image: &Image) -> Result<()> {
    let cards = [
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "-32".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", image.width.to_string()),
        ("NAXIS2", image.height.to_string()),
    ];

    let mut bytes = encode_header(&cards);
    for &pixel in &image.pixels {
        bytes.extend_from_slice(&(pixel as f32).to_be_bytes());
    }
    bytes.resize(bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE, 0);

    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
