use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::collect::request::ChangeDetectionRequest;
use crate::collect::service::{ProcessingService, ServiceContext};
use crate::error::{DeforError, Result, ServiceError, ServiceErrorKind};
use crate::geometric::features::ChangeFeatureCollection;

/// Path of the vectorized change-detection method, relative to the endpoint
pub const VECTORIZE_PATH: &str = "v1/change-detection:vectorize";

pub const SERVICE_ACCOUNT_HEADER: &str = "X-Service-Account";

/// Error envelope returned on non-2xx responses:
/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// Set on NO_DATA: which window had no valid pixel
    #[serde(default)]
    window: Option<String>,
}

/// Client of the remote geospatial processing service.
///
/// The request is sent once as JSON; the response body is a GeoJSON
/// FeatureCollection.
pub struct HttpProcessingService {
    context: ServiceContext,
    client: Client,
}

impl HttpProcessingService {
    pub fn new(context: ServiceContext) -> Result<Self> {
        // No deadline unless the context sets one
        let client = Client::builder()
            .timeout(context.request_timeout)
            .build()
            .map_err(|e| {
                ServiceError::new(
                    ServiceErrorKind::Transport,
                    format!("failed to build HTTP client: {}", e),
                )
            })?;
        Ok(HttpProcessingService { context, client })
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    fn execute(&self, body: String) -> Result<(u16, String)> {
        let url = self.context.url_for(VECTORIZE_PATH)?;
        info!(
            url = %url,
            account = %self.context.service_account,
            "submitting change detection request"
        );

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.context.api_key()))
            .header(SERVICE_ACCOUNT_HEADER, &self.context.service_account)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().map_err(transport_error)?;
        debug!(status, bytes = text.len(), "processing service responded");
        Ok((status, text))
    }
}

impl ProcessingService for HttpProcessingService {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
        let (status, text) = self.execute(request.to_json()?)?;
        if !(200..300).contains(&status) {
            let err = classify_error(status, &text);
            warn!(status, error = %err, "processing service rejected the request");
            return Err(err);
        }
        let features = ChangeFeatureCollection::parse(&text)?;
        info!(features = features.len(), "received change features");
        Ok(features)
    }
}

fn transport_error(e: reqwest::Error) -> DeforError {
    let kind = if e.is_timeout() {
        ServiceErrorKind::Timeout
    } else {
        ServiceErrorKind::Transport
    };
    ServiceError::new(kind, e.to_string()).into()
}

/// Map a failed response to an error. The envelope's code wins; without one
/// the HTTP status decides.
pub fn classify_error(status: u16, body: &str) -> DeforError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let (code, message, window) = match parsed {
        Some(b) => (b.code, b.message, b.window),
        None => (None, None, None),
    };
    let message = message.unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            body.trim().to_string()
        }
    });

    let kind = match code.as_deref() {
        Some("NO_DATA") => {
            return DeforError::NoData {
                window: window.unwrap_or_else(|| "requested".to_string()),
            }
        }
        Some("PIXEL_LIMIT_EXCEEDED") => ServiceErrorKind::PixelLimitExceeded,
        Some("QUOTA_EXCEEDED") | Some("RESOURCE_EXHAUSTED") => ServiceErrorKind::Quota,
        Some("DEADLINE_EXCEEDED") => ServiceErrorKind::Timeout,
        Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED") => ServiceErrorKind::Authentication,
        _ => match status {
            401 | 403 => ServiceErrorKind::Authentication,
            408 | 504 => ServiceErrorKind::Timeout,
            429 => ServiceErrorKind::Quota,
            _ => ServiceErrorKind::Other,
        },
    };

    let mut err = ServiceError::new(kind, message).with_status(status);
    if let Some(code) = code {
        err = err.with_code(code);
    }
    err.into()
}
