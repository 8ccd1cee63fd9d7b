//! Detector output as consumed by the compliance pipeline.

use serde::{Deserialize, Serialize};

use crate::error::QcError;
use crate::mask::DefectMask;

/// One detection produced by the external detector for an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label as emitted by the model
    pub label: String,
    /// Model confidence in [0, 1]
    pub confidence: f32,
    /// Pixels covered by the detection
    pub region: Region,
}

/// Pixel region of a detection: a full segmentation mask or a bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Mask(DefectMask),
    Box(BoundingBox),
}

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    fn validate(&self) -> Result<(), QcError> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(QcError::input(format!("Bounding box has non-finite coordinates: {:?}", self)));
        }
        if self.x2 < self.x1 || self.y2 < self.y1 {
            return Err(QcError::input(format!("Bounding box is inverted: {:?}", self)));
        }
        Ok(())
    }

    /// Half-open pixel span `[floor(x1), ceil(x2)) x [floor(y1), ceil(y2))`,
    /// clipped to the image.
    fn pixel_span(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let clip = |v: f32, max: u32| v.clamp(0.0, max as f32) as u32;
        (
            clip(self.x1.floor(), width),
            clip(self.y1.floor(), height),
            clip(self.x2.ceil(), width),
            clip(self.y2.ceil(), height),
        )
    }
}

impl Region {
    /// Render the region as a mask over a `width x height` image.
    pub fn rasterize(&self, width: u32, height: u32) -> Result<DefectMask, QcError> {
        match self {
            Region::Mask(mask) => {
                check_mask_dimensions(mask, width, height)?;
                Ok(mask.clone())
            }
            Region::Box(bbox) => {
                bbox.validate()?;
                let (x0, y0, x1, y1) = bbox.pixel_span(width, height);
                let mut mask = DefectMask::new(width, height);
                mask.fill_rect(x0, y0, x1, y1);
                Ok(mask)
            }
        }
    }
}

impl Detection {
    /// Check confidence range and region geometry against the image size.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), QcError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(QcError::input(format!(
                "Detection '{}' has confidence {} outside [0, 1]",
                self.label, self.confidence
            )));
        }
        match &self.region {
            Region::Mask(mask) => check_mask_dimensions(mask, width, height),
            Region::Box(bbox) => bbox.validate(),
        }
    }
}

fn check_mask_dimensions(mask: &DefectMask, width: u32, height: u32) -> Result<(), QcError> {
    if mask.dimensions() != (width, height) {
        return Err(QcError::input(format!(
            "Mask is {}x{} but the image is {}x{}",
            mask.width(),
            mask.height(),
            width,
            height
        )));
    }
    Ok(())
}
