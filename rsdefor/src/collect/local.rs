//! In-process evaluator of [`ChangeDetectionRequest`]s.
//!
//! Runs every stage of the request against a [`SceneArchive`]: selection and
//! masking, index per scene, temporal median per window, differencing and
//! thresholding, then vectorization.

use tracing::{debug, info};

use crate::collect::archive::{SceneArchive, SceneQuery};
use crate::collect::request::ChangeDetectionRequest;
use crate::collect::service::ProcessingService;
use crate::collect::time_window::TimeWindow;
use crate::error::{DeforError, Result};
use crate::geo_core::PixelGrid;
use crate::geometric::features::ChangeFeatureCollection;
use crate::geometric::index_composite::composite;
use crate::geometric::raster::Raster;

pub struct LocalProcessingService<A: SceneArchive> {
    archive: A,
}

impl<A: SceneArchive> LocalProcessingService<A> {
    pub fn new(archive: A) -> Self {
        LocalProcessingService { archive }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Median index composite of one window
    pub fn window_composite(
        &self,
        request: &ChangeDetectionRequest,
        grid: &PixelGrid,
        label: &str,
        window: &TimeWindow,
    ) -> Result<Raster> {
        let query = SceneQuery {
            collection: &request.selection().collection,
            area: request.area(),
            window,
            grid,
        };
        let scenes = self.archive.scenes(&query)?;
        debug!(window = label, range = %window, scenes = scenes.len(), "selected scenes");

        let masked = scenes
            .iter()
            .map(|s| request.mask().apply(s, request.selection(), grid))
            .collect::<Result<Vec<_>>>()?;
        let raster = composite(request.index(), request.reducer(), *grid, masked)?;

        if raster.is_all_unset() {
            return Err(DeforError::NoData {
                window: label.to_string(),
            });
        }
        Ok(raster)
    }

    fn composites(
        &self,
        request: &ChangeDetectionRequest,
        grid: &PixelGrid,
    ) -> (Result<Raster>, Result<Raster>) {
        let windows = request.windows();
        let before = || self.window_composite(request, grid, "before", &windows.before);
        let after = || self.window_composite(request, grid, "after", &windows.after);

        #[cfg(feature = "rayon")]
        {
            rayon::join(before, after)
        }
        #[cfg(not(feature = "rayon"))]
        {
            (before(), after())
        }
    }
}

/// A fault in either window outranks an empty window in the other
fn both_windows(before: Result<Raster>, after: Result<Raster>) -> Result<(Raster, Raster)> {
    match (before, after) {
        (Ok(before), Ok(after)) => Ok((before, after)),
        (Err(DeforError::NoData { .. }), Err(e)) if !matches!(e, DeforError::NoData { .. }) => {
            Err(e)
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

impl<A: SceneArchive> ProcessingService for LocalProcessingService<A> {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
        let grid = request.grid()?;
        request.vectorize().check_pixel_limit(&grid)?;
        info!(
            width = grid.width,
            height = grid.height,
            "evaluating change detection locally"
        );

        let (before, after) = self.composites(request, &grid);
        let (before, after) = both_windows(before, after)?;

        let mask = request.change().detect(&before, &after)?;
        debug!(changed = mask.set_count(), "change mask");
        request.vectorize().vectorize(&mask)
    }
}
