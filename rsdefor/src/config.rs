//! Pipeline configuration.
//!
//! Every constant of the change-detection pipeline is a named field here so
//! tests and deployments can override it. Missing fields fall back to the
//! defaults in [`crate::collect::global_variables`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::collect::global_variables::{
    LABEL_PROPERTY, LOOKBACK_DAYS, MASKED_SCL_CLASSES, MAX_PIXELS, NDVI_BAND,
    NDVI_DECLINE_THRESHOLD, NIR_BAND, RECENT_DAYS, RED_BAND, REFLECTANCE_SCALE, RESOLUTION_M,
    S2_SR_HARMONIZED, SCL_BAND, SELECTED_BANDS,
};
use crate::error::{DeforError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Imagery archive the scenes are selected from
    pub collection: String,
    pub bands: Vec<String>,
    pub nir_band: String,
    pub red_band: String,
    pub index_band: String,
    pub scl_band: String,
    pub masked_classes: Vec<u8>,
    pub scale_factor: f64,
    pub threshold: f64,
    pub resolution_m: f64,
    pub max_pixels: f64,
    pub lookback_days: i64,
    pub recent_days: i64,
    pub label_property: String,
    /// Diagonal neighbours join regions; `false` gives 4-connected regions
    pub eight_connected: bool,
    /// Change polygons smaller than this (square metres) are dropped
    pub min_area_m2: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection: S2_SR_HARMONIZED.to_string(),
            bands: SELECTED_BANDS.iter().map(|b| b.to_string()).collect(),
            nir_band: NIR_BAND.to_string(),
            red_band: RED_BAND.to_string(),
            index_band: NDVI_BAND.to_string(),
            scl_band: SCL_BAND.to_string(),
            masked_classes: MASKED_SCL_CLASSES.to_vec(),
            scale_factor: REFLECTANCE_SCALE,
            threshold: NDVI_DECLINE_THRESHOLD,
            resolution_m: RESOLUTION_M,
            max_pixels: MAX_PIXELS,
            lookback_days: LOOKBACK_DAYS,
            recent_days: RECENT_DAYS,
            label_property: LABEL_PROPERTY.to_string(),
            eight_connected: true,
            min_area_m2: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recent_days <= 0 {
            return Err(DeforError::invalid_config(format!(
                "recent_days must be positive, got {}",
                self.recent_days
            )));
        }
        if self.lookback_days <= self.recent_days {
            return Err(DeforError::invalid_config(format!(
                "lookback_days ({}) must exceed recent_days ({})",
                self.lookback_days, self.recent_days
            )));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(DeforError::invalid_config("scale_factor must be positive"));
        }
        if !self.threshold.is_finite() {
            return Err(DeforError::invalid_config("threshold must be finite"));
        }
        if !(self.resolution_m.is_finite() && self.resolution_m > 0.0) {
            return Err(DeforError::invalid_config("resolution_m must be positive"));
        }
        if self.max_pixels.is_nan() || self.max_pixels <= 0.0 {
            return Err(DeforError::invalid_config("max_pixels must be positive"));
        }
        for band in [&self.nir_band, &self.red_band, &self.scl_band] {
            if !self.bands.contains(band) {
                return Err(DeforError::invalid_config(format!(
                    "band {} is not part of the selected band set",
                    band
                )));
            }
        }
        if self.label_property.is_empty() {
            return Err(DeforError::invalid_config("label_property must not be empty"));
        }
        Ok(())
    }
}
