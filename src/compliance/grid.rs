//! Grid partitioning and per-class defect layers.

use std::collections::BTreeMap;

use crate::classifier::DefectClass;
use crate::detection::Region;
use crate::error::QcError;
use crate::mask::DefectMask;

/// Pixel bounds of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellBounds {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Partition of a `width x height` image into square cells.
///
/// Cells are laid out row-major from the top-left corner. When the image
/// size is not a multiple of the cell size, the last row and column hold
/// truncated cells, so every pixel belongs to exactly one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    width: u32,
    height: u32,
    cell_size: u32,
    rows: u32,
    cols: u32,
}

impl GridLayout {
    pub fn new(width: u32, height: u32, cell_size: u32) -> Result<Self, QcError> {
        if width == 0 || height == 0 {
            return Err(QcError::input(format!(
                "Image dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if cell_size == 0 {
            return Err(QcError::input("Grid cell size must be at least 1 pixel"));
        }
        Ok(Self {
            width,
            height,
            cell_size,
            rows: height.div_ceil(cell_size),
            cols: width.div_ceil(cell_size),
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn cell_count(&self) -> u32 {
        self.rows * self.cols
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<CellBounds> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let x = col * self.cell_size;
        let y = row * self.cell_size;
        Some(CellBounds {
            row,
            col,
            x,
            y,
            width: self.cell_size.min(self.width - x),
            height: self.cell_size.min(self.height - y),
        })
    }

    /// All cells, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellBounds> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).filter_map(move |col| self.cell(row, col)))
    }
}

/// Per-class defect masks over one image.
#[derive(Debug, Clone)]
pub struct DefectLayers {
    width: u32,
    height: u32,
    layers: BTreeMap<DefectClass, DefectMask>,
}

impl DefectLayers {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rasterize `region` into the layer for `class`.
    pub fn add(&mut self, class: DefectClass, region: &Region) -> Result<(), QcError> {
        let mask = region.rasterize(self.width, self.height)?;
        self.add_mask(class, &mask)
    }

    pub fn add_mask(&mut self, class: DefectClass, mask: &DefectMask) -> Result<(), QcError> {
        match self.layers.get_mut(&class) {
            Some(layer) => layer.union_with(mask),
            None => {
                if mask.dimensions() != (self.width, self.height) {
                    return Err(QcError::input(format!(
                        "Mask is {}x{} but the image is {}x{}",
                        mask.width(),
                        mask.height(),
                        self.width,
                        self.height
                    )));
                }
                self.layers.insert(class, mask.clone());
                Ok(())
            }
        }
    }

    pub fn get(&self, class: DefectClass) -> Option<&DefectMask> {
        self.layers.get(&class)
    }

    /// Layers in class order.
    pub fn iter(&self) -> impl Iterator<Item = (DefectClass, &DefectMask)> {
        self.layers.iter().map(|(class, mask)| (*class, mask))
    }

    pub fn is_empty(&self) -> bool {
        self.layers.values().all(DefectMask::is_empty)
    }

    /// Every defect pixel regardless of class.
    pub fn union(&self) -> DefectMask {
        let mut combined = DefectMask::new(self.width, self.height);
        for mask in self.layers.values() {
            // Layers are checked against the image size on insert
            for (dst, src) in combined.bits_mut().iter_mut().zip(mask.bits()) {
                *dst |= *src;
            }
        }
        combined
    }
}
