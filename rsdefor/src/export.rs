//! GeoJSON file export and browser preview links.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collect::global_variables::get_temp_path;
use crate::geometric::features::ChangeFeatureCollection;

pub const PREVIEW_BASE_URL: &str = "https://geojson.io/#data=data:application/json,";

/// Default output file name
pub const DEFAULT_NAME: &str = "deforestation";

/// Write the collection as pretty-printed GeoJSON to `path`, creating
/// parent directories as needed
pub fn write_geojson(features: &ChangeFeatureCollection, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create output directory: {:?}", parent))?;
        }
    }
    let text = features
        .to_geojson_pretty()
        .context("Failed to serialize feature collection")?;
    std::fs::write(path, text).context(format!("Failed to write GeoJSON file: {:?}", path))?;
    info!(path = %path.display(), features = features.len(), "wrote GeoJSON");
    Ok(())
}

/// Write `{dir}/{name}.geojson`; `dir` defaults to `./temp` and `name` to
/// `deforestation`
pub fn save_geojson(
    features: &ChangeFeatureCollection,
    dir: Option<&Path>,
    name: Option<&str>,
) -> Result<PathBuf> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(get_temp_path);
    let output_file = dir.join(format!("{}.geojson", name.unwrap_or(DEFAULT_NAME)));
    write_geojson(features, &output_file)?;
    Ok(output_file)
}

/// geojson.io link that renders the collection inline
pub fn preview_url(features: &ChangeFeatureCollection) -> String {
    format!(
        "{}{}",
        PREVIEW_BASE_URL,
        urlencoding::encode(&features.to_geojson_string())
    )
}
