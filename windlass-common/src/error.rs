use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WindlassError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] Arc<url::ParseError>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Network Error: could not reach {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Bad status code from server: got {status} for {url}")]
    BadStatusCode { status: u16, url: String },

    #[error("Too many redirects while trying to fetch {url} (bound: {bound})")]
    TooManyRedirects { url: String, bound: usize },

    #[error("Malformed catalog from {url}: {reason}")]
    MalformedCatalog { url: String, reason: String },

    #[error("Installation of '{id}' failed: {reason}")]
    InstallationFailed { id: String, reason: String },

    #[error("Deletion refused: {} resolves outside the managed directory", path.display())]
    DeletionRefused { path: PathBuf },

    #[error("IoError: {0}")]
    IoError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for WindlassError {
    fn from(err: std::io::Error) -> Self {
        WindlassError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for WindlassError {
    fn from(err: reqwest::Error) -> Self {
        WindlassError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for WindlassError {
    fn from(err: serde_json::Error) -> Self {
        WindlassError::Json(Arc::new(err))
    }
}

impl From<url::ParseError> for WindlassError {
    fn from(err: url::ParseError) -> Self {
        WindlassError::UrlParse(Arc::new(err))
    }
}

impl WindlassError {
    /// Wraps any error from one entry's install into the per-entry failure
    /// variant, keeping the offending id attached to the cause.
    pub fn installation_failed(id: impl Into<String>, cause: &WindlassError) -> Self {
        WindlassError::InstallationFailed {
            id: id.into(),
            reason: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WindlassError>;
