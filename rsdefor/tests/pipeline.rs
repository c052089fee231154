use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use rsdefor::collect::archive::{InMemoryArchive, Scene};
use rsdefor::collect::global_variables::{S2_SR_HARMONIZED, SELECTED_BANDS};
use rsdefor::geo_core::PixelGrid;
use rsdefor::geometric::features::polygons_equivalent;
use rsdefor::{
    BoundingBox, ChangeDetectionRequest, ChangeFeatureCollection, DeforError, Deforestation,
    LocalProcessingService, PipelineConfig, ProcessingService, Result,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 14, 0, 0).unwrap()
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn strip() -> BoundingBox {
    BoundingBox::new(-111.361, 57.36, -111.36, 57.44)
}

/// Scene with uniform NIR and SCL, red given per pixel by `red`
fn scene(
    id: &str,
    acquired: NaiveDate,
    grid: &PixelGrid,
    red: impl Fn(usize, usize) -> u16,
) -> Scene {
    let mut scene = Scene::new(id, acquired, grid.bbox, grid.width, grid.height);
    for band in SELECTED_BANDS {
        scene = scene.with_uniform_band(band, 1000);
    }
    let mut values = Vec::with_capacity(grid.len());
    for row in 0..grid.height {
        for col in 0..grid.width {
            values.push(Some(red(col, row)));
        }
    }
    scene
        .with_band("B4", values)
        .with_uniform_band("B8", 4000)
        .with_uniform_band("SCL", 4)
}

struct Counting<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S: ProcessingService> ProcessingService for Counting<S> {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(request)
    }
}

#[test]
fn zero_scenes_give_zero_features() {
    let service = LocalProcessingService::new(InMemoryArchive::new(S2_SR_HARMONIZED));
    let pipeline = Deforestation::with_service(service);
    let (_, features) = pipeline.detect(strip(), now()).unwrap();
    assert!(features.is_empty());
    let value: serde_json::Value = serde_json::from_str(&features.to_geojson_string()).unwrap();
    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(value["features"].as_array().map(Vec::len), Some(0));
}

#[test]
fn strip_features_stay_inside_the_rectangle() {
    let grid = PixelGrid::new(strip(), 10.0).unwrap();
    assert_eq!((grid.width, grid.height), (6, 891));

    // clearing along the east edge of the northern half
    let cleared = |col: usize, row: usize| if col >= 3 && row < 400 { 3000 } else { 500 };
    let archive = InMemoryArchive::new(S2_SR_HARMONIZED)
        .with_scene(scene("b1", date(4, 15), &grid, |_, _| 500))
        .with_scene(scene("b2", date(5, 10), &grid, |_, _| 520))
        .with_scene(scene("b3", date(6, 1), &grid, |_, _| 480))
        .with_scene(scene("a1", date(6, 26), &grid, cleared));

    let pipeline = Deforestation::with_service(LocalProcessingService::new(archive));
    let (_, features) = pipeline.detect(strip(), now()).unwrap();

    assert_eq!(features.len(), 1);
    assert!(features.within(&strip()));
    let feature = &features.features[0];
    assert_eq!(feature.property_i64("deforestation"), Some(1));
    assert_eq!(feature.property_i64("pixel_count"), Some(3 * 400));
    // the easternmost column is clipped at max_lon
    let max_x = feature
        .polygon
        .exterior()
        .0
        .iter()
        .map(|c| c.x)
        .fold(f64::MIN, f64::max);
    assert_eq!(max_x, -111.36);
}

#[test]
fn inverted_rectangle_rejected_before_any_call() {
    let service = Counting {
        inner: LocalProcessingService::new(InMemoryArchive::new(S2_SR_HARMONIZED)),
        calls: AtomicUsize::new(0),
    };
    let pipeline = Deforestation::with_service(&service);
    let err = pipeline
        .detect(BoundingBox::new(-60.0, -3.0, -70.0, -2.0), now())
        .unwrap_err();
    assert!(matches!(err, DeforError::InvalidArea { .. }));
    assert_eq!(service.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn decline_of_exactly_the_threshold_is_not_change() {
    let area = BoundingBox::new(0.0, 0.0, 0.00026, 0.00017);
    let grid = PixelGrid::new(area, 10.0).unwrap();

    // before NDVI 0.6 everywhere; after NDVI 0.4 on col 0, 0.3 elsewhere
    let ndvi_red = |ndvi: f64| ((1.0 - ndvi) / (1.0 + ndvi) * 4000.0).round() as u16;
    let before = scene("b", date(5, 1), &grid, |_, _| ndvi_red(0.6));
    let after = scene("a", date(6, 25), &grid, |col, _| {
        if col == 0 {
            ndvi_red(0.4)
        } else {
            ndvi_red(0.3)
        }
    });
    let archive = InMemoryArchive::new(S2_SR_HARMONIZED)
        .with_scene(before)
        .with_scene(after);

    // digital numbers are integers, so pick a threshold equal to the
    // realised decline on col 0, computed the same way as the pipeline
    let reflectance = |dn: u16| f64::from(dn) / 10_000.0;
    let nd = |red: u16| {
        let (nir, red) = (reflectance(4000), reflectance(red));
        (nir - red) / (nir + red)
    };
    let config = PipelineConfig {
        threshold: nd(ndvi_red(0.6)) - nd(ndvi_red(0.4)),
        ..PipelineConfig::default()
    };
    let pipeline = Deforestation::new(config, LocalProcessingService::new(archive)).unwrap();
    let (_, features) = pipeline.detect(area, now()).unwrap();

    assert_eq!(features.len(), 1);
    assert_eq!(
        features.features[0].property_i64("pixel_count"),
        Some((grid.width as i64 - 1) * grid.height as i64)
    );
}

#[test]
fn geojson_round_trip_is_geometrically_equivalent() {
    let grid = PixelGrid::new(strip(), 10.0).unwrap();
    // a clearing with an untouched island in the middle
    let cleared = |col: usize, row: usize| {
        let in_block = (1..5).contains(&col) && (100..110).contains(&row);
        let island = (2..4).contains(&col) && (104..106).contains(&row);
        if in_block && !island {
            3000
        } else {
            500
        }
    };
    let archive = InMemoryArchive::new(S2_SR_HARMONIZED)
        .with_scene(scene("b1", date(5, 1), &grid, |_, _| 500))
        .with_scene(scene("a1", date(6, 27), &grid, cleared));
    let pipeline = Deforestation::with_service(LocalProcessingService::new(archive));
    let (_, features) = pipeline.detect(strip(), now()).unwrap();

    assert_eq!(features.len(), 1);
    assert_eq!(features.features[0].polygon.interiors().len(), 1);

    let back = ChangeFeatureCollection::parse(&features.to_geojson_string()).unwrap();
    assert_eq!(back.len(), features.len());
    assert!(polygons_equivalent(
        &features.features[0].polygon,
        &back.features[0].polygon
    ));
    assert_eq!(back.features[0].properties, features.features[0].properties);
}

#[test]
fn request_survives_serialization() {
    let windows = rsdefor::TimeWindows::from_config(now(), &PipelineConfig::default());
    let request =
        ChangeDetectionRequest::from_config(strip(), windows, &PipelineConfig::default()).unwrap();
    let back = ChangeDetectionRequest::from_json(&request.to_json().unwrap()).unwrap();
    assert_eq!(back, request);
}

#[test]
fn fault_in_after_window_is_not_reported_as_no_data() {
    let grid = PixelGrid::new(strip(), 10.0).unwrap();
    // nothing before; the only after scene lacks every reflectance band
    let broken = Scene::new("a1", date(6, 26), grid.bbox, grid.width, grid.height)
        .with_uniform_band("SCL", 4);
    let archive = InMemoryArchive::new(S2_SR_HARMONIZED).with_scene(broken);

    let pipeline = Deforestation::with_service(LocalProcessingService::new(archive));
    let err = pipeline.detect(strip(), now()).unwrap_err();
    assert!(!matches!(err, DeforError::NoData { .. }));
    assert_eq!(
        err.service_kind(),
        Some(rsdefor::ServiceErrorKind::InvalidResponse)
    );
}
