use std::path::PathBuf;

pub const TEMP_PATH: &str = "./temp";

/// Harmonized Sentinel-2 surface reflectance archive
pub const S2_SR_HARMONIZED: &str = "COPERNICUS/S2_SR_HARMONIZED";

/// Bands retained from every scene
pub const SELECTED_BANDS: [&str; 13] = [
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B9", "B11", "B12", "SCL",
];

pub const NIR_BAND: &str = "B8";
pub const RED_BAND: &str = "B4";
pub const SCL_BAND: &str = "SCL";
pub const NDVI_BAND: &str = "NDVI";

/// Scene classification codes masked out: cloud shadow, cloud medium and
/// high probability, thin cirrus, snow/ice
pub const MASKED_SCL_CLASSES: [u8; 5] = [3, 8, 9, 10, 11];

/// Digital number to unitless reflectance divisor
pub const REFLECTANCE_SCALE: f64 = 10_000.0;

/// NDVI decline above which a pixel counts as changed
pub const NDVI_DECLINE_THRESHOLD: f64 = 0.2;

/// Native Sentinel-2 resolution of the NIR/red bands, metres
pub const RESOLUTION_M: f64 = 10.0;

pub const MAX_PIXELS: f64 = 1e10;

pub const LOOKBACK_DAYS: i64 = 90;
pub const RECENT_DAYS: i64 = 7;

pub const LABEL_PROPERTY: &str = "deforestation";

pub fn get_temp_path() -> PathBuf {
    PathBuf::from(TEMP_PATH)
}
