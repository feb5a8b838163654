//! Client configuration loaded via OrthoConfig.
//!
//! Values come from `FIELDWATCH_*` environment variables and OrthoConfig's
//! configuration files; the binary layers its own flags on top.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_TOKEN_DIR: &str = ".fieldwatch";
const DEFAULT_TOKEN_FILE: &str = "session.json";

/// Errors raised while interpreting client settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No API base URL was configured.
    #[error("API base URL missing: set --api-base-url or FIELDWATCH_API_BASE_URL")]
    MissingBaseUrl,
    /// The base URL could not be parsed.
    #[error("invalid API base URL {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
}

/// Settings for reaching the field API and persisting the session.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FIELDWATCH")]
pub struct ClientSettings {
    /// Root URL of the field API, e.g. `http://192.0.2.10:8000/`.
    pub api_base_url: Option<String>,
    /// Per-request timeout in seconds.
    #[ortho_config(default = 15)]
    pub request_timeout_secs: u64,
    /// Where the session tokens are stored.
    pub token_file: Option<PathBuf>,
}

impl ClientSettings {
    /// Parsed API base URL, normalised to end with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL is missing, unparsable, or not
    /// `http`/`https`.
    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        parse_base_url(raw)
    }

    /// Request timeout, never shorter than one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Token file path, falling back to `.fieldwatch/session.json`.
    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_DIR).join(DEFAULT_TOKEN_FILE))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidBaseUrl {
        url: raw.to_owned(),
        message,
    };
    let mut url = Url::parse(raw).map_err(|error| invalid(error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed".to_owned()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
