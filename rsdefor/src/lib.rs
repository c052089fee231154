pub mod collect;
pub mod commons;
pub mod config;
pub mod error;
pub mod export;
pub mod geo_core;
pub mod geometric;
pub mod notify;

pub use collect::local::LocalProcessingService;
#[cfg(feature = "reqwest")]
pub use collect::remote::remote_collect::HttpProcessingService;
pub use collect::request::ChangeDetectionRequest;
pub use collect::service::{ProcessingService, ServiceContext};
pub use collect::time_window::{TimeWindow, TimeWindows};
pub use config::PipelineConfig;
pub use error::{DeforError, Result, ServiceError, ServiceErrorKind};
pub use geo_core::BoundingBox;
pub use geometric::deforestation::Deforestation;
pub use geometric::features::{ChangeFeature, ChangeFeatureCollection};
