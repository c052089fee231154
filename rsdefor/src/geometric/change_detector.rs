//! Composite differencing and thresholding.

use serde::{Deserialize, Serialize};

use crate::collect::global_variables::NDVI_DECLINE_THRESHOLD;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::geo_core::PixelGrid;
use crate::geometric::raster::Raster;

/// `before - after > threshold` marks a pixel as changed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeRule {
    pub threshold: f64,
}

impl Default for ChangeRule {
    fn default() -> Self {
        ChangeRule {
            threshold: NDVI_DECLINE_THRESHOLD,
        }
    }
}

/// Binary change raster. Only changed pixels are set; everything else,
/// unchanged or unobserved, is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMask {
    pub grid: PixelGrid,
    cells: Vec<Option<u8>>,
}

impl ChangeMask {
    /// Mask with every pixel unset
    pub fn empty(grid: PixelGrid) -> Self {
        ChangeMask {
            grid,
            cells: vec![None; grid.len()],
        }
    }

    /// Build from a flag per pixel; `true` becomes 1, `false` unset
    pub fn from_flags(grid: PixelGrid, flags: &[bool]) -> Self {
        let cells = flags.iter().map(|&f| if f { Some(1) } else { None }).collect();
        ChangeMask { grid, cells }
    }

    pub fn value(&self, col: usize, row: usize) -> Option<u8> {
        self.cells[self.grid.index(col, row)]
    }

    pub fn is_set(&self, col: usize, row: usize) -> bool {
        self.value(col, row).is_some()
    }

    pub fn set_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.set_count() == 0
    }
}

impl ChangeRule {
    pub fn from_config(config: &PipelineConfig) -> Self {
        ChangeRule {
            threshold: config.threshold,
        }
    }

    /// Change raster `before - after`, set only where both are valid
    pub fn decline(&self, before: &Raster, after: &Raster) -> Result<Raster> {
        before.check_aligned(after)?;
        let values = before
            .values()
            .iter()
            .zip(after.values())
            .map(|(&b, &a)| match (b, a) {
                (Some(b), Some(a)) => Some(b - a),
                _ => None,
            })
            .collect();
        Raster::from_values(before.grid, values)
    }

    /// Threshold the decline with a strict comparison
    pub fn detect(&self, before: &Raster, after: &Raster) -> Result<ChangeMask> {
        let decline = self.decline(before, after)?;
        let cells = decline
            .values()
            .iter()
            .map(|d| match d {
                Some(d) if *d > self.threshold => Some(1),
                _ => None,
            })
            .collect();
        Ok(ChangeMask {
            grid: before.grid,
            cells,
        })
    }
}
