use anyhow::Result;
use chrono::{Duration, Utc};
use rsdefor::collect::archive::{InMemoryArchive, Scene};
use rsdefor::collect::global_variables::{S2_SR_HARMONIZED, SELECTED_BANDS};
use rsdefor::geo_core::PixelGrid;
use rsdefor::{BoundingBox, Deforestation, LocalProcessingService};

/// Example: the full pipeline on synthetic scenes evaluated in-process
///
/// A forest patch (NIR 4000, red 500) has its upper-left quarter cleared
/// (red 3000) in the last week.
fn synthetic_scene(id: &str, days_ago: i64, grid: &PixelGrid, cleared: bool) -> Scene {
    let acquired = (Utc::now() - Duration::days(days_ago)).date_naive();
    let mut scene = Scene::new(id, acquired, grid.bbox, grid.width, grid.height);
    for band in SELECTED_BANDS {
        scene = scene.with_uniform_band(band, 1000);
    }
    let red = (0..grid.height)
        .flat_map(|row| (0..grid.width).map(move |col| (col, row)))
        .map(|(col, row)| {
            let in_clearing = cleared && col < grid.width / 2 && row < grid.height / 2;
            Some(if in_clearing { 3000 } else { 500 })
        })
        .collect();
    scene
        .with_band("B4", red)
        .with_uniform_band("B8", 4000)
        .with_uniform_band("SCL", 4)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let area = BoundingBox::try_new(-111.3615, 57.3995, -111.3600, 57.4000)?;
    let grid = PixelGrid::new(area, 10.0)?;
    println!("Grid: {} x {} pixels", grid.width, grid.height);

    let archive = InMemoryArchive::new(S2_SR_HARMONIZED)
        .with_scene(synthetic_scene("before-1", 60, &grid, false))
        .with_scene(synthetic_scene("before-2", 30, &grid, false))
        .with_scene(synthetic_scene("after-1", 3, &grid, true));

    let pipeline = Deforestation::with_service(LocalProcessingService::new(archive));
    let (windows, features) = pipeline.detect(area, Utc::now())?;

    println!("Before window: {}", windows.before);
    println!("After window:  {}", windows.after);
    for feature in &features.features {
        println!(
            "  - {} pixels, {:.0} m2",
            feature.property_i64("pixel_count").unwrap_or_default(),
            feature.area_m2()
        );
    }
    println!("{}", features.to_geojson_pretty()?);
    Ok(())
}
