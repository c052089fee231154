//! Processing-service contract and credentials.

use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::collect::request::ChangeDetectionRequest;
use crate::error::{DeforError, Result};
use crate::geometric::features::ChangeFeatureCollection;

/// Evaluates a change-detection request and returns the vectorized result.
///
/// A submission is a single call with no retry. `DeforError::NoData` means
/// one of the window composites had no valid pixel.
pub trait ProcessingService: Send + Sync {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection>;
}

impl<S: ProcessingService + ?Sized> ProcessingService for &S {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
        (**self).submit(request)
    }
}

impl<S: ProcessingService + ?Sized> ProcessingService for Box<S> {
    fn submit(&self, request: &ChangeDetectionRequest) -> Result<ChangeFeatureCollection> {
        (**self).submit(request)
    }
}

pub const ENV_ENDPOINT: &str = "RSDEFOR_ENDPOINT";
pub const ENV_SERVICE_ACCOUNT: &str = "RSDEFOR_SERVICE_ACCOUNT";
pub const ENV_API_KEY: &str = "RSDEFOR_API_KEY";
pub const ENV_KEY_PATH: &str = "RSDEFOR_KEY_PATH";

/// Endpoint and credentials of the remote processing service
#[derive(Clone)]
pub struct ServiceContext {
    pub endpoint: Url,
    pub service_account: String,
    api_key: String,
    /// No deadline when `None`
    pub request_timeout: Option<Duration>,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("endpoint", &self.endpoint.as_str())
            .field("service_account", &self.service_account)
            .field("api_key", &"***")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ServiceContext {
    pub fn new(
        endpoint: &str,
        service_account: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            DeforError::invalid_config(format!("invalid endpoint {}: {}", endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(DeforError::invalid_config(format!(
                "endpoint {} cannot be a base URL",
                endpoint
            )));
        }
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(DeforError::invalid_config("API key is empty"));
        }
        Ok(ServiceContext {
            endpoint,
            service_account: service_account.into(),
            api_key,
            request_timeout: None,
        })
    }

    /// Read the key from a file (surrounding whitespace is ignored)
    pub fn with_key_file(
        endpoint: &str,
        service_account: impl Into<String>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let key = std::fs::read_to_string(key_path.as_ref())?;
        Self::new(endpoint, service_account, key)
    }

    /// Build from `RSDEFOR_*` variables; `RSDEFOR_API_KEY` wins over
    /// `RSDEFOR_KEY_PATH`
    pub fn from_env() -> Result<Self> {
        let endpoint = required_var(ENV_ENDPOINT)?;
        let account = required_var(ENV_SERVICE_ACCOUNT)?;
        match env::var(ENV_API_KEY) {
            Ok(key) if !key.trim().is_empty() => Self::new(&endpoint, account, key),
            _ => {
                let path = env::var(ENV_KEY_PATH).map_err(|_| {
                    DeforError::invalid_config(format!(
                        "set {} or {}",
                        ENV_API_KEY, ENV_KEY_PATH
                    ))
                })?;
                Self::with_key_file(&endpoint, account, path)
            }
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Endpoint URL with `path` appended to its path
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| DeforError::invalid_config(format!("cannot join {}: {}", path, e)))
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| DeforError::invalid_config(format!("{} is not set", name)))
}
