use anyhow::{Context, Result};
use rsdefor::export::{preview_url, save_geojson};
use rsdefor::{Deforestation, HttpProcessingService, ServiceContext};

/// Example: deforestation candidates over an Alberta oil-sands strip
///
/// Needs RSDEFOR_ENDPOINT, RSDEFOR_SERVICE_ACCOUNT and RSDEFOR_API_KEY (or
/// RSDEFOR_KEY_PATH) in the environment or a `.env` file.
fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    println!("=== Example: NDVI change detection from the processing service ===\n");

    let context = ServiceContext::from_env().context("Service credentials are not configured")?;
    let service = HttpProcessingService::new(context)?;

    let mut deforestation = Deforestation::with_service(service);
    deforestation.set_bbox(-111.361, 57.36, -111.36, 57.44);

    println!("Bounding box:");
    println!("  - Longitude: -111.361 to -111.36");
    println!("  - Latitude: 57.36 to 57.44");
    println!("  - Format: WGS84 (EPSG:4326)\n");

    let features = deforestation.run()?.clone();
    if let Some(windows) = deforestation.windows() {
        println!("Before window: {}", windows.before);
        println!("After window:  {}", windows.after);
    }
    println!("Change regions: {}", features.len());

    let path = save_geojson(&features, None, None)?;
    println!("\nSaved to: {}", path.display());
    println!("Preview: {}", preview_url(&features));
    Ok(())
}
