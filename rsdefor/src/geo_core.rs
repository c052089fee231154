use geo::{coord, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{DeforError, Result};

/// Metres per degree of latitude (spherical approximation).
pub const DEG_TO_M_LAT: f64 = 111_320.0;

/// Equatorial circumference in metres, used for metres per degree of longitude.
pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_000.0;

/// Area of interest in WGS84 degrees (EPSG:4326)
/// Serialized as `[min_lon, min_lat, max_lon, max_lat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bounding box and reject it if it is not a well-formed rectangle
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let bbox = BoundingBox::new(min_x, min_y, max_x, max_y);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check the rectangle invariants: finite values, valid lon/lat ranges,
    /// strictly increasing bounds on both axes
    pub fn validate(&self) -> Result<()> {
        let values = [self.min_x, self.min_y, self.max_x, self.max_y];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DeforError::invalid_area(format!(
                "bounds must be finite numbers, got {:?}",
                values
            )));
        }
        for lon in [self.min_x, self.max_x] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(DeforError::invalid_area(format!(
                    "longitude {} outside [-180, 180]",
                    lon
                )));
            }
        }
        for lat in [self.min_y, self.max_y] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(DeforError::invalid_area(format!(
                    "latitude {} outside [-90, 90]",
                    lat
                )));
            }
        }
        if self.min_x >= self.max_x {
            return Err(DeforError::invalid_area(format!(
                "min_lon {} must be less than max_lon {}",
                self.min_x, self.max_x
            )));
        }
        if self.min_y >= self.max_y {
            return Err(DeforError::invalid_area(format!(
                "min_lat {} must be less than max_lat {}",
                self.min_y, self.max_y
            )));
        }
        Ok(())
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Whether the two rectangles share at least one point
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Inclusive point-in-rectangle test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        self.to_rect().to_polygon()
    }

    /// Metres per degree of longitude at this box's center latitude
    pub fn deg_to_m_lon(&self) -> f64 {
        let (_, lat_center) = self.center();
        EARTH_CIRCUMFERENCE_M * (lat_center * PI / 180.0).cos() / 360.0
    }

    /// Approximate (width, height) in metres
    pub fn extent_m(&self) -> (f64, f64) {
        (
            (self.max_x - self.min_x) * self.deg_to_m_lon(),
            (self.max_y - self.min_y) * DEG_TO_M_LAT,
        )
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }
}

/// Raster lattice covering a bounding box at a resolution in metres.
///
/// Row 0 is the northern edge. The last column and row may extend past the
/// box; [`PixelGrid::vertex`] clamps corner coordinates back onto it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGrid {
    pub bbox: BoundingBox,
    pub resolution_m: f64,
    pub width: usize,
    pub height: usize,
    /// Pixel width in degrees of longitude
    pub step_x: f64,
    /// Pixel height in degrees of latitude
    pub step_y: f64,
}

impl PixelGrid {
    pub fn new(bbox: BoundingBox, resolution_m: f64) -> Result<Self> {
        bbox.validate()?;
        if !(resolution_m.is_finite() && resolution_m > 0.0) {
            return Err(DeforError::invalid_config(format!(
                "resolution must be a positive number of metres, got {}",
                resolution_m
            )));
        }

        let (width_m, height_m) = bbox.extent_m();
        let width = ((width_m / resolution_m).ceil() as usize).max(1);
        let height = ((height_m / resolution_m).ceil() as usize).max(1);

        Ok(PixelGrid {
            bbox,
            resolution_m,
            width,
            height,
            step_x: resolution_m / bbox.deg_to_m_lon(),
            step_y: resolution_m / DEG_TO_M_LAT,
        })
    }

    /// Grid with an exact pixel count, each pixel spanning an equal share of
    /// the box
    pub fn with_dims(bbox: BoundingBox, width: usize, height: usize) -> Result<Self> {
        bbox.validate()?;
        if width == 0 || height == 0 {
            return Err(DeforError::invalid_config("grid dimensions must be non-zero"));
        }
        let step_y = (bbox.max_y - bbox.min_y) / height as f64;
        Ok(PixelGrid {
            bbox,
            resolution_m: step_y * DEG_TO_M_LAT,
            width,
            height,
            step_x: (bbox.max_x - bbox.min_x) / width as f64,
            step_y,
        })
    }

    /// Number of pixels, as the value compared against the pixel ceiling
    pub fn pixel_count(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    /// Geographic coordinate (lon, lat) of the pixel corner at lattice
    /// vertex (col, row), clipped to the bounding box
    pub fn vertex(&self, col: usize, row: usize) -> (f64, f64) {
        let x = (self.bbox.min_x + col as f64 * self.step_x).min(self.bbox.max_x);
        let y = (self.bbox.max_y - row as f64 * self.step_y).max(self.bbox.min_y);
        (x, y)
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.bbox.min_x + (col as f64 + 0.5) * self.step_x;
        let y = self.bbox.max_y - (row as f64 + 0.5) * self.step_y;
        (x.min(self.bbox.max_x), y.max(self.bbox.min_y))
    }
}
