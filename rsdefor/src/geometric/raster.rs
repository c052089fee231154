use crate::error::{DeforError, Result};
use crate::geo_core::PixelGrid;

/// Single-band raster on a [`PixelGrid`]; `None` marks an unset (masked) pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub grid: PixelGrid,
    data: Vec<Option<f64>>,
}

impl Raster {
    /// Raster with every pixel unset
    pub fn unset(grid: PixelGrid) -> Self {
        Raster {
            grid,
            data: vec![None; grid.len()],
        }
    }

    pub fn from_values(grid: PixelGrid, data: Vec<Option<f64>>) -> Result<Self> {
        if data.len() != grid.len() {
            return Err(DeforError::invalid_config(format!(
                "raster has {} pixels, grid {}x{} needs {}",
                data.len(),
                grid.width,
                grid.height,
                grid.len()
            )));
        }
        Ok(Raster { grid, data })
    }

    /// Raster with the same value at every pixel
    pub fn filled(grid: PixelGrid, value: f64) -> Self {
        Raster {
            grid,
            data: vec![Some(value); grid.len()],
        }
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        self.data[self.grid.index(col, row)]
    }

    pub fn set(&mut self, col: usize, row: usize, value: Option<f64>) {
        let idx = self.grid.index(col, row);
        self.data[idx] = value;
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.data
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_all_unset(&self) -> bool {
        self.data.iter().all(|v| v.is_none())
    }

    /// Fail unless `other` is pixel-aligned with this raster
    pub fn check_aligned(&self, other: &Raster) -> Result<()> {
        if self.grid != other.grid {
            return Err(DeforError::invalid_config(format!(
                "rasters are not aligned: {}x{} vs {}x{}",
                self.grid.width, self.grid.height, other.grid.width, other.grid.height
            )));
        }
        Ok(())
    }
}
