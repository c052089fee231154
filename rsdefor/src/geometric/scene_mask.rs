//! Scene selection and quality masking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::collect::archive::Scene;
use crate::collect::global_variables::{
    MASKED_SCL_CLASSES, REFLECTANCE_SCALE, S2_SR_HARMONIZED, SCL_BAND, SELECTED_BANDS,
};
use crate::config::PipelineConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use crate::geo_core::PixelGrid;
use crate::geometric::raster::Raster;

/// Which archive to read and which bands to keep from each scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSelection {
    pub collection: String,
    pub bands: Vec<String>,
}

impl Default for SceneSelection {
    fn default() -> Self {
        SceneSelection {
            collection: S2_SR_HARMONIZED.to_string(),
            bands: SELECTED_BANDS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl SceneSelection {
    pub fn from_config(config: &PipelineConfig) -> Self {
        SceneSelection {
            collection: config.collection.clone(),
            bands: config.bands.clone(),
        }
    }
}

/// Quality mask from the scene-classification band plus reflectance scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskRule {
    /// Classification band read for the mask
    pub band: String,
    /// Classes whose pixels are unset
    pub exclude_classes: Vec<u8>,
    /// Divisor turning digital numbers into reflectance
    pub scale_factor: f64,
}

impl Default for MaskRule {
    fn default() -> Self {
        MaskRule {
            band: SCL_BAND.to_string(),
            exclude_classes: MASKED_SCL_CLASSES.to_vec(),
            scale_factor: REFLECTANCE_SCALE,
        }
    }
}

/// Scene after masking: reflectance bands in `[0, 1]`, degraded pixels unset
#[derive(Debug, Clone)]
pub struct MaskedScene {
    pub id: String,
    pub acquired: NaiveDate,
    pub bands: HashMap<String, Raster>,
}

impl MaskedScene {
    pub fn band(&self, name: &str) -> Option<&Raster> {
        self.bands.get(name)
    }
}

impl MaskRule {
    pub fn from_config(config: &PipelineConfig) -> Self {
        MaskRule {
            band: config.scl_band.clone(),
            exclude_classes: config.masked_classes.clone(),
            scale_factor: config.scale_factor,
        }
    }

    /// Whether a classification value passes the mask
    pub fn is_clear(&self, class: Option<u16>) -> bool {
        match class {
            Some(c) => !self
                .exclude_classes
                .iter()
                .any(|&excluded| u16::from(excluded) == c),
            None => false,
        }
    }

    /// Keep the selected bands, unset pixels failing the classification
    /// check and divide the rest by the scale factor.
    ///
    /// The classification band itself is consumed and not carried over.
    pub fn apply(
        &self,
        scene: &Scene,
        selection: &SceneSelection,
        grid: &PixelGrid,
    ) -> Result<MaskedScene> {
        let scl = scene
            .band(&self.band)
            .ok_or_else(|| missing_band(scene, &self.band))?;
        let clear: Vec<bool> = scl.iter().map(|&c| self.is_clear(c)).collect();

        let mut bands = HashMap::new();
        for name in selection.bands.iter().filter(|b| **b != self.band) {
            let dn = scene.band(name).ok_or_else(|| missing_band(scene, name))?;
            if dn.len() != grid.len() {
                return Err(ServiceError::new(
                    ServiceErrorKind::InvalidResponse,
                    format!(
                        "band {} of scene {} has {} pixels, expected {}",
                        name,
                        scene.id,
                        dn.len(),
                        grid.len()
                    ),
                )
                .into());
            }

            let values = dn
                .iter()
                .zip(&clear)
                .map(|(&v, &ok)| match (v, ok) {
                    (Some(v), true) => Some(f64::from(v) / self.scale_factor),
                    _ => None,
                })
                .collect();
            bands.insert(name.clone(), Raster::from_values(*grid, values)?);
        }

        Ok(MaskedScene {
            id: scene.id.clone(),
            acquired: scene.acquired,
            bands,
        })
    }
}

fn missing_band(scene: &Scene, band: &str) -> crate::error::DeforError {
    ServiceError::new(
        ServiceErrorKind::InvalidResponse,
        format!("scene {} has no band {}", scene.id, band),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_core::BoundingBox;

    fn fixture() -> (PixelGrid, Scene) {
        let area = BoundingBox::new(0.0, 0.0, 0.0004, 0.0001);
        let grid = PixelGrid::with_dims(area, 4, 1).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let scene = Scene::new("s1", date, area, 4, 1)
            .with_band("B4", vec![Some(1000), Some(2000), Some(3000), None])
            .with_band("B8", vec![Some(5000), Some(5000), Some(5000), Some(5000)])
            .with_band("SCL", vec![Some(4), Some(9), None, Some(5)]);
        (grid, scene)
    }

    fn selection() -> SceneSelection {
        SceneSelection {
            collection: "S2".into(),
            bands: vec!["B4".into(), "B8".into(), "SCL".into()],
        }
    }

    #[test]
    fn test_all_masked_classes_rejected() {
        let rule = MaskRule::default();
        for class in [3u16, 8, 9, 10, 11] {
            assert!(!rule.is_clear(Some(class)));
        }
        for class in [0u16, 1, 2, 4, 5, 6, 7] {
            assert!(rule.is_clear(Some(class)));
        }
        assert!(!rule.is_clear(None));
    }

    #[test]
    fn test_masked_pixels_are_unset_not_zero() {
        let (grid, scene) = fixture();
        let masked = MaskRule::default()
            .apply(&scene, &selection(), &grid)
            .unwrap();

        let red = masked.band("B4").unwrap();
        assert_eq!(red.get(0, 0), Some(0.1));
        assert_eq!(red.get(1, 0), None); // cloud high probability
        assert_eq!(red.get(2, 0), None); // no classification
        assert_eq!(red.get(3, 0), None); // no sensor data

        let nir = masked.band("B8").unwrap();
        assert_eq!(nir.get(3, 0), Some(0.5));
        assert!(masked.band("SCL").is_none());
    }

    #[test]
    fn test_missing_band_is_error() {
        let (grid, scene) = fixture();
        let mut sel = selection();
        sel.bands.push("B11".into());
        let err = MaskRule::default().apply(&scene, &sel, &grid).unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::InvalidResponse));
    }
}
