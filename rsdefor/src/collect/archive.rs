//! Scene sources for the local evaluator.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::collect::time_window::TimeWindow;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use crate::geo_core::{BoundingBox, PixelGrid};

/// One acquisition, sampled on the grid of the request that fetched it.
///
/// Bands hold raw digital numbers; `None` is a pixel with no sensor data.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub acquired: NaiveDate,
    pub footprint: BoundingBox,
    pub width: usize,
    pub height: usize,
    pub bands: HashMap<String, Vec<Option<u16>>>,
}

impl Scene {
    pub fn new(
        id: impl Into<String>,
        acquired: NaiveDate,
        footprint: BoundingBox,
        width: usize,
        height: usize,
    ) -> Self {
        Scene {
            id: id.into(),
            acquired,
            footprint,
            width,
            height,
            bands: HashMap::new(),
        }
    }

    pub fn with_band(mut self, name: impl Into<String>, values: Vec<Option<u16>>) -> Self {
        self.bands.insert(name.into(), values);
        self
    }

    /// Same digital number at every pixel
    pub fn with_uniform_band(self, name: impl Into<String>, value: u16) -> Self {
        let len = self.width * self.height;
        self.with_band(name, vec![Some(value); len])
    }

    pub fn band(&self, name: &str) -> Option<&[Option<u16>]> {
        self.bands.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the evaluator asks a [`SceneArchive`] for
#[derive(Debug, Clone, Copy)]
pub struct SceneQuery<'a> {
    pub collection: &'a str,
    pub area: &'a BoundingBox,
    pub window: &'a TimeWindow,
    pub grid: &'a PixelGrid,
}

/// Source of scenes intersecting an area and a date range.
///
/// Implementations return scenes already sampled on `query.grid`.
pub trait SceneArchive: Send + Sync {
    fn scenes(&self, query: &SceneQuery<'_>) -> Result<Vec<Scene>>;
}

/// Archive backed by a list of scenes held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchive {
    collection: String,
    scenes: Vec<Scene>,
}

impl InMemoryArchive {
    pub fn new(collection: impl Into<String>) -> Self {
        InMemoryArchive {
            collection: collection.into(),
            scenes: Vec::new(),
        }
    }

    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scenes.push(scene);
        self
    }

    pub fn push(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneArchive for InMemoryArchive {
    fn scenes(&self, query: &SceneQuery<'_>) -> Result<Vec<Scene>> {
        if query.collection != self.collection {
            return Err(ServiceError::new(
                ServiceErrorKind::Other,
                format!("unknown collection {}", query.collection),
            )
            .with_code("NOT_FOUND")
            .into());
        }

        let mut selected = Vec::new();
        for scene in &self.scenes {
            if !query.window.contains(scene.acquired) || !scene.footprint.intersects(query.area) {
                continue;
            }
            if scene.width != query.grid.width || scene.height != query.grid.height {
                return Err(ServiceError::new(
                    ServiceErrorKind::InvalidResponse,
                    format!(
                        "scene {} is {}x{}, request grid is {}x{}",
                        scene.id, scene.width, scene.height, query.grid.width, query.grid.height
                    ),
                )
                .into());
            }
            selected.push(scene.clone());
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_filters_by_window_and_footprint() {
        let area = BoundingBox::new(0.0, 0.0, 0.0003, 0.0003);
        let grid = PixelGrid::with_dims(area, 3, 3).unwrap();
        let window = TimeWindow::new(date(2024, 1, 1), date(2024, 1, 8));

        let archive = InMemoryArchive::new("S2")
            .with_scene(Scene::new("in", date(2024, 1, 3), area, 3, 3))
            .with_scene(Scene::new("late", date(2024, 1, 8), area, 3, 3))
            .with_scene(Scene::new(
                "far",
                date(2024, 1, 3),
                BoundingBox::new(10.0, 10.0, 11.0, 11.0),
                3,
                3,
            ));

        let query = SceneQuery {
            collection: "S2",
            area: &area,
            window: &window,
            grid: &grid,
        };
        let scenes = archive.scenes(&query).unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].id, "in");
    }

    #[test]
    fn test_grid_mismatch_is_service_error() {
        let area = BoundingBox::new(0.0, 0.0, 0.0003, 0.0003);
        let grid = PixelGrid::with_dims(area, 3, 3).unwrap();
        let window = TimeWindow::new(date(2024, 1, 1), date(2024, 1, 8));
        let archive =
            InMemoryArchive::new("S2").with_scene(Scene::new("x", date(2024, 1, 2), area, 2, 2));

        let query = SceneQuery {
            collection: "S2",
            area: &area,
            window: &window,
            grid: &grid,
        };
        let err = archive.scenes(&query).unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::InvalidResponse));
    }
}
