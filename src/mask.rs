//! Binary defect masks and their compact exchange encoding.
//!
//! Masks are row-major, origin top-left. On the wire a mask is run-length
//! encoded (alternating runs starting with `start_value`), written as a CSV
//! of run lengths and base64 wrapped, so detector output and report overlays
//! stay small in JSON.

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::QcError;

pub const MASK_FORMAT: &str = "rle-binary-v1 | base64";

/// Largest mask accepted from outside the crate (8192 x 8192).
pub const MAX_MASK_PIXELS: u64 = 8192 * 8192;

/// Reject mask dimensions larger than [`MAX_MASK_PIXELS`].
pub fn check_mask_size(width: u32, height: u32) -> Result<(), QcError> {
    let pixels = width as u64 * height as u64;
    if pixels > MAX_MASK_PIXELS {
        return Err(QcError::input(format!(
            "Mask of {}x{} pixels exceeds the {} pixel limit",
            width, height, MAX_MASK_PIXELS
        )));
    }
    Ok(())
}

/// Per-pixel boolean grid over an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EncodedMask", into = "EncodedMask")]
pub struct DefectMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl DefectMask {
    /// All-clear mask of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Wrap a row-major bit vector; its length must be `width * height`.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Result<Self, QcError> {
        let expected = width as usize * height as usize;
        if bits.len() != expected {
            return Err(QcError::input(format!(
                "Mask has {} pixels, expected {}x{} = {}",
                bits.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, bits })
    }

    /// Any non-zero luma pixel is a defect pixel.
    pub fn from_gray_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let bits = image.pixels().map(|p| p.0[0] > 0).collect();
        Self { width, height, bits }
    }

    /// White-on-black rendering of the mask.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Out-of-bounds reads are clear.
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.bits[idx] = value;
        }
    }

    /// Set every pixel in `[x0, x1) x [y0, y1)`, clipped to the mask.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = self.index(x, y);
                self.bits[idx] = true;
            }
        }
    }

    /// OR another mask of the same size into this one.
    pub fn union_with(&mut self, other: &DefectMask) -> Result<(), QcError> {
        if other.dimensions() != self.dimensions() {
            return Err(QcError::input(format!(
                "Cannot combine {}x{} mask with {}x{} mask",
                other.width, other.height, self.width, self.height
            )));
        }
        for (dst, src) in self.bits.iter_mut().zip(&other.bits) {
            *dst |= *src;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub(crate) fn bits_mut(&mut self) -> &mut [bool] {
        &mut self.bits
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Serialized form of a [`DefectMask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedMask {
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// Value of the first run (0 or 1)
    pub start_value: u8,
    /// base64(csv of run lengths)
    pub data: String,
}

impl From<&DefectMask> for EncodedMask {
    fn from(mask: &DefectMask) -> Self {
        let start_value = u8::from(mask.bits.first().copied().unwrap_or(false));

        let mut runs: Vec<usize> = Vec::new();
        let mut current = start_value == 1;
        let mut run_len = 0usize;
        for &px in &mask.bits {
            if px == current {
                run_len += 1;
            } else {
                runs.push(run_len);
                current = px;
                run_len = 1;
            }
        }
        runs.push(run_len);

        let mut csv = String::with_capacity(runs.len() * 4);
        for (i, run) in runs.iter().enumerate() {
            if i > 0 {
                csv.push(',');
            }
            let _ = write!(csv, "{run}");
        }

        EncodedMask {
            width: mask.width,
            height: mask.height,
            format: MASK_FORMAT.to_string(),
            start_value,
            data: B64.encode(csv.as_bytes()),
        }
    }
}

impl From<DefectMask> for EncodedMask {
    fn from(mask: DefectMask) -> Self {
        EncodedMask::from(&mask)
    }
}

impl TryFrom<EncodedMask> for DefectMask {
    type Error = QcError;

    fn try_from(entry: EncodedMask) -> Result<Self, Self::Error> {
        if entry.format != MASK_FORMAT {
            return Err(QcError::input(format!(
                "Unsupported mask format '{}', expected '{}'",
                entry.format, MASK_FORMAT
            )));
        }
        if entry.start_value > 1 {
            return Err(QcError::input("Mask start_value must be 0 or 1"));
        }

        let raw = B64
            .decode(entry.data.as_bytes())
            .map_err(|e| QcError::input(format!("Mask data is not valid base64: {}", e)))?;
        let csv = String::from_utf8(raw)
            .map_err(|e| QcError::input(format!("Mask data is not valid UTF-8: {}", e)))?;

        check_mask_size(entry.width, entry.height)?;
        let expected = entry.width as usize * entry.height as usize;
        let mut bits = Vec::new();
        let mut value = entry.start_value == 1;
        for token in csv.split(',').filter(|t| !t.is_empty()) {
            let run: usize = token
                .trim()
                .parse()
                .map_err(|_| QcError::input(format!("Invalid mask run length '{}'", token)))?;
            if run > expected - bits.len() {
                return Err(QcError::input(format!(
                    "Mask runs exceed {}x{} pixels",
                    entry.width, entry.height
                )));
            }
            bits.extend(std::iter::repeat(value).take(run));
            value = !value;
        }

        DefectMask::from_bits(entry.width, entry.height, bits)
    }
}
