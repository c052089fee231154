//! Vegetation index per scene and temporal median compositing.

use serde::{Deserialize, Serialize};

use crate::collect::global_variables::{NDVI_BAND, NIR_BAND, RED_BAND};
use crate::commons::basic_functions::median;
use crate::config::PipelineConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use crate::geo_core::PixelGrid;
use crate::geometric::raster::Raster;
use crate::geometric::scene_mask::MaskedScene;

/// Normalized difference `(positive - negative) / (positive + negative)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Output band name
    pub name: String,
    pub positive: String,
    pub negative: String,
}

impl Default for IndexSpec {
    fn default() -> Self {
        IndexSpec {
            name: NDVI_BAND.to_string(),
            positive: NIR_BAND.to_string(),
            negative: RED_BAND.to_string(),
        }
    }
}

/// Per-pixel temporal statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Median,
}

impl IndexSpec {
    pub fn from_config(config: &PipelineConfig) -> Self {
        IndexSpec {
            name: config.index_band.clone(),
            positive: config.nir_band.clone(),
            negative: config.red_band.clone(),
        }
    }

    /// Index raster for one scene. Unset when either band is unset or the
    /// denominator is zero.
    pub fn compute(&self, scene: &MaskedScene) -> Result<Raster> {
        let pos = scene.band(&self.positive).ok_or_else(|| {
            ServiceError::new(
                ServiceErrorKind::InvalidResponse,
                format!("scene {} has no band {}", scene.id, self.positive),
            )
        })?;
        let neg = scene.band(&self.negative).ok_or_else(|| {
            ServiceError::new(
                ServiceErrorKind::InvalidResponse,
                format!("scene {} has no band {}", scene.id, self.negative),
            )
        })?;
        pos.check_aligned(neg)?;

        let values = pos
            .values()
            .iter()
            .zip(neg.values())
            .map(|(&a, &b)| match (a, b) {
                (Some(a), Some(b)) if a + b != 0.0 => Some((a - b) / (a + b)),
                _ => None,
            })
            .collect();
        Raster::from_values(pos.grid, values)
    }

    /// Compute the index and append it to the scene's bands
    pub fn add_to(&self, mut scene: MaskedScene) -> Result<MaskedScene> {
        let index = self.compute(&scene)?;
        scene.bands.insert(self.name.clone(), index);
        Ok(scene)
    }
}

impl Reducer {
    /// Reduce aligned rasters to one. Each pixel takes the statistic over
    /// the rasters valid there; pixels valid in none stay unset.
    pub fn reduce(&self, grid: PixelGrid, rasters: &[&Raster]) -> Result<Raster> {
        for raster in rasters {
            if raster.grid != grid {
                return Err(ServiceError::new(
                    ServiceErrorKind::InvalidResponse,
                    "composite inputs are not on the request grid",
                )
                .into());
            }
        }

        let mut samples = Vec::with_capacity(rasters.len());
        let values = (0..grid.len())
            .map(|idx| {
                samples.clear();
                samples.extend(rasters.iter().filter_map(|r| r.values()[idx]));
                match self {
                    Reducer::Median => median(&mut samples),
                }
            })
            .collect();
        Raster::from_values(grid, values)
    }
}

/// Index composite for one window: index per masked scene, then reduce.
pub fn composite(
    index: &IndexSpec,
    reducer: Reducer,
    grid: PixelGrid,
    scenes: Vec<MaskedScene>,
) -> Result<Raster> {
    let with_index = scenes
        .into_iter()
        .map(|s| index.add_to(s))
        .collect::<Result<Vec<_>>>()?;
    let layers: Vec<&Raster> = with_index
        .iter()
        .filter_map(|s| s.band(&index.name))
        .collect();
    reducer.reduce(grid, &layers)
}
