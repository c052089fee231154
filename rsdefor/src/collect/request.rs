//! Declarative change-detection request.
//!
//! A [`ChangeDetectionRequest`] describes the whole computation (scene
//! selection, masking, index, reducer, change rule, vectorization) for one
//! area and one pair of windows. It is immutable once built, serialized as
//! the remote request body and evaluated as-is by the local service.

use serde::{Deserialize, Serialize};

use crate::collect::time_window::TimeWindows;
use crate::config::PipelineConfig;
use crate::error::{DeforError, Result};
use crate::geo_core::{BoundingBox, PixelGrid};
use crate::geometric::change_detector::ChangeRule;
use crate::geometric::index_composite::{IndexSpec, Reducer};
use crate::geometric::scene_mask::{MaskRule, SceneSelection};
use crate::geometric::vectorizer::VectorizeSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetectionRequest {
    area: BoundingBox,
    windows: TimeWindows,
    selection: SceneSelection,
    mask: MaskRule,
    index: IndexSpec,
    reducer: Reducer,
    change: ChangeRule,
    vectorize: VectorizeSpec,
}

impl ChangeDetectionRequest {
    pub fn builder(area: BoundingBox) -> ChangeDetectionRequestBuilder {
        ChangeDetectionRequestBuilder::new(area)
    }

    /// Request with every stage taken from `config`
    pub fn from_config(
        area: BoundingBox,
        windows: TimeWindows,
        config: &PipelineConfig,
    ) -> Result<Self> {
        Self::builder(area)
            .windows(windows)
            .selection(SceneSelection::from_config(config))
            .mask(MaskRule::from_config(config))
            .index(IndexSpec::from_config(config))
            .change(ChangeRule::from_config(config))
            .vectorize(VectorizeSpec::from_config(config))
            .build()
    }

    /// Parse and re-validate a serialized request
    pub fn from_json(text: &str) -> Result<Self> {
        let request: ChangeDetectionRequest = serde_json::from_str(text)?;
        request.check()?;
        Ok(request)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn area(&self) -> &BoundingBox {
        &self.area
    }

    pub fn windows(&self) -> &TimeWindows {
        &self.windows
    }

    pub fn selection(&self) -> &SceneSelection {
        &self.selection
    }

    pub fn mask(&self) -> &MaskRule {
        &self.mask
    }

    pub fn index(&self) -> &IndexSpec {
        &self.index
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    pub fn change(&self) -> &ChangeRule {
        &self.change
    }

    pub fn vectorize(&self) -> &VectorizeSpec {
        &self.vectorize
    }

    /// Raster lattice the request is evaluated on
    pub fn grid(&self) -> Result<PixelGrid> {
        PixelGrid::new(self.area, self.vectorize.scale_m)
    }

    fn check(&self) -> Result<()> {
        self.area.validate()?;

        let TimeWindows { before, after } = self.windows;
        if before.start >= before.end || after.start >= after.end {
            return Err(DeforError::invalid_config(format!(
                "empty time window in {} / {}",
                before, after
            )));
        }
        if before.end != after.start || before.overlaps(&after) {
            return Err(DeforError::invalid_config(format!(
                "windows {} and {} are not adjacent",
                before, after
            )));
        }
        if !self.change.threshold.is_finite() {
            return Err(DeforError::invalid_config("threshold must be finite"));
        }
        if !(self.vectorize.scale_m.is_finite() && self.vectorize.scale_m > 0.0) {
            return Err(DeforError::invalid_config("scale must be positive"));
        }
        for band in [&self.index.positive, &self.index.negative, &self.mask.band] {
            if !self.selection.bands.contains(band) {
                return Err(DeforError::invalid_config(format!(
                    "band {} is not selected",
                    band
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`ChangeDetectionRequest`]. Stages left unset take their
/// defaults; the windows are required.
#[derive(Debug, Clone)]
pub struct ChangeDetectionRequestBuilder {
    area: BoundingBox,
    windows: Option<TimeWindows>,
    selection: SceneSelection,
    mask: MaskRule,
    index: IndexSpec,
    reducer: Reducer,
    change: ChangeRule,
    vectorize: VectorizeSpec,
}

impl ChangeDetectionRequestBuilder {
    pub fn new(area: BoundingBox) -> Self {
        ChangeDetectionRequestBuilder {
            area,
            windows: None,
            selection: SceneSelection::default(),
            mask: MaskRule::default(),
            index: IndexSpec::default(),
            reducer: Reducer::default(),
            change: ChangeRule::default(),
            vectorize: VectorizeSpec::default(),
        }
    }

    pub fn windows(mut self, windows: TimeWindows) -> Self {
        self.windows = Some(windows);
        self
    }

    pub fn selection(mut self, selection: SceneSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn mask(mut self, mask: MaskRule) -> Self {
        self.mask = mask;
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.index = index;
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn change(mut self, change: ChangeRule) -> Self {
        self.change = change;
        self
    }

    pub fn vectorize(mut self, vectorize: VectorizeSpec) -> Self {
        self.vectorize = vectorize;
        self
    }

    pub fn build(self) -> Result<ChangeDetectionRequest> {
        let windows = self
            .windows
            .ok_or_else(|| DeforError::invalid_config("time windows are required"))?;
        let request = ChangeDetectionRequest {
            area: self.area,
            windows,
            selection: self.selection,
            mask: self.mask,
            index: self.index,
            reducer: self.reducer,
            change: self.change,
            vectorize: self.vectorize,
        };
        request.check()?;
        Ok(request)
    }
}
