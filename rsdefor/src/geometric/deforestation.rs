use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::collect::request::ChangeDetectionRequest;
use crate::collect::service::ProcessingService;
use crate::collect::time_window::TimeWindows;
use crate::config::PipelineConfig;
use crate::error::{DeforError, Result};
use crate::geo_core::BoundingBox;
use crate::geometric::features::ChangeFeatureCollection;

/// Deforestation change detection over one area of interest.
///
/// Resolves the two time windows, builds one request and submits it to the
/// processing service. A window with no valid observation yields an empty
/// collection instead of an error.
pub struct Deforestation<S: ProcessingService> {
    config: PipelineConfig,
    service: S,
    bbox: Option<BoundingBox>,
    windows: Option<TimeWindows>,
    features: Option<ChangeFeatureCollection>,
}

impl<S: ProcessingService> Deforestation<S> {
    pub fn new(config: PipelineConfig, service: S) -> Result<Self> {
        config.validate()?;
        Ok(Deforestation {
            config,
            service,
            bbox: None,
            windows: None,
            features: None,
        })
    }

    /// Default configuration
    pub fn with_service(service: S) -> Self {
        Deforestation {
            config: PipelineConfig::default(),
            service,
            bbox: None,
            windows: None,
            features: None,
        }
    }

    pub fn set_bbox(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
        self.bbox = Some(BoundingBox::new(min_x, min_y, max_x, max_y));
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Windows of the last run
    pub fn windows(&self) -> Option<&TimeWindows> {
        self.windows.as_ref()
    }

    /// Features of the last run
    pub fn features(&self) -> Option<&ChangeFeatureCollection> {
        self.features.as_ref()
    }

    /// Run on the area set with [`Deforestation::set_bbox`]
    pub fn run_at(&mut self, now: DateTime<Utc>) -> Result<&ChangeFeatureCollection> {
        let bbox = self
            .bbox
            .ok_or_else(|| DeforError::invalid_area("bounding box must be set before running"))?;
        let (windows, features) = self.detect(bbox, now)?;
        self.windows = Some(windows);
        Ok(self.features.insert(features))
    }

    pub fn run(&mut self) -> Result<&ChangeFeatureCollection> {
        self.run_at(Utc::now())
    }

    /// Full pipeline for `area` at instant `now`
    pub fn detect(
        &self,
        area: BoundingBox,
        now: DateTime<Utc>,
    ) -> Result<(TimeWindows, ChangeFeatureCollection)> {
        area.validate()?;

        let windows = TimeWindows::from_config(now, &self.config);
        info!(before = %windows.before, after = %windows.after, "resolved time windows");

        let request = ChangeDetectionRequest::from_config(area, windows, &self.config)?;
        match self.service.submit(&request) {
            Ok(features) => {
                info!(features = features.len(), "deforestation candidates");
                Ok((windows, features))
            }
            Err(DeforError::NoData { window }) => {
                warn!(window = %window, "no valid observations, returning no features");
                Ok((windows, ChangeFeatureCollection::empty()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServiceError, ServiceErrorKind};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records submissions and answers with a canned result
    struct Recording {
        calls: AtomicUsize,
        last: Mutex<Option<ChangeDetectionRequest>>,
        answer: fn() -> Result<ChangeFeatureCollection>,
    }

    impl Recording {
        fn new(answer: fn() -> Result<ChangeFeatureCollection>) -> Self {
            Recording {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                answer,
            }
        }
    }

    impl ProcessingService for Recording {
        fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            (self.answer)()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_invalid_area_never_reaches_service() {
        let service = Recording::new(|| Ok(ChangeFeatureCollection::empty()));
        let pipeline = Deforestation::with_service(&service);
        let err = pipeline
            .detect(BoundingBox::new(-60.0, -3.0, -70.0, -2.0), now())
            .unwrap_err();
        assert!(matches!(err, DeforError::InvalidArea { .. }));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submits_once_with_resolved_windows() {
        let service = Recording::new(|| Ok(ChangeFeatureCollection::empty()));
        let mut pipeline = Deforestation::with_service(&service);
        pipeline.set_bbox(-111.361, 57.36, -111.36, 57.44);
        pipeline.run_at(now()).unwrap();

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        let request = service.last.lock().unwrap().clone().unwrap();
        assert_eq!(request.windows(), pipeline.windows().unwrap());
        assert_eq!(request.windows().after.end, now().date_naive());
    }

    #[test]
    fn test_no_data_becomes_empty_collection() {
        let service = Recording::new(|| {
            Err(DeforError::NoData {
                window: "before".into(),
            })
        });
        let pipeline = Deforestation::with_service(service);
        let (_, features) = pipeline
            .detect(BoundingBox::new(-111.361, 57.36, -111.36, 57.44), now())
            .unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn test_service_errors_propagate() {
        let service = Recording::new(|| {
            Err(ServiceError::new(ServiceErrorKind::Quota, "daily quota").into())
        });
        let pipeline = Deforestation::with_service(service);
        let err = pipeline
            .detect(BoundingBox::new(-111.361, 57.36, -111.36, 57.44), now())
            .unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Quota));
    }

    #[test]
    fn test_run_requires_bbox() {
        let mut pipeline =
            Deforestation::with_service(Recording::new(|| Ok(ChangeFeatureCollection::empty())));
        assert!(matches!(
            pipeline.run_at(now()),
            Err(DeforError::InvalidArea { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            recent_days: 0,
            ..PipelineConfig::default()
        };
        let service = Recording::new(|| Ok(ChangeFeatureCollection::empty()));
        assert!(matches!(
            Deforestation::new(config, service),
            Err(DeforError::InvalidConfig { .. })
        ));
    }
}
