//! Error types for the change-detection pipeline.

use std::fmt;
use thiserror::Error;

/// Class of failure reported by the processing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Request quota or rate limit exhausted.
    Quota,
    /// The service gave up on the computation (deadline exceeded).
    Timeout,
    /// The area at the requested resolution exceeds the pixel ceiling.
    PixelLimitExceeded,
    /// Missing, invalid or insufficient credentials.
    Authentication,
    /// The request never got a response (connection, TLS, DNS).
    Transport,
    /// The service answered with something that is not a feature collection.
    InvalidResponse,
    /// Any other fault reported by the service.
    Other,
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quota => "quota exceeded",
            Self::Timeout => "timeout",
            Self::PixelLimitExceeded => "pixel limit exceeded",
            Self::Authentication => "authentication failed",
            Self::Transport => "transport failure",
            Self::InvalidResponse => "invalid response",
            Self::Other => "service fault",
        };
        f.write_str(name)
    }
}

/// Fault surfaced by a processing service, with enough detail to tell the
/// classes apart.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    /// HTTP status when the fault came over the wire.
    pub status: Option<u16>,
    /// Service error code (e.g. `PIXEL_LIMIT_EXCEEDED`).
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Errors produced by the pipeline.
#[derive(Error, Debug)]
pub enum DeforError {
    #[error("invalid area of interest: {reason}")]
    InvalidArea { reason: String },

    /// A window composite has no valid pixel. The pipeline turns this into
    /// an empty feature collection.
    #[error("no valid observations in the {window} window")]
    NoData { window: String },

    #[error("processing service error: {0}")]
    Service(#[from] ServiceError),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeforError {
    pub fn invalid_area(reason: impl Into<String>) -> Self {
        Self::InvalidArea {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Service error kind, if this is a service fault.
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            Self::Service(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, DeforError>;
