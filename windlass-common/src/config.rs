// windlass-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::Url;

use super::error::{Result, WindlassError};

pub const DEFAULT_MAX_REDIRECTS: usize = 20;
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 15;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TRANSFER_TIMEOUT_SECS: u64 = 300;

const MAX_REDIRECTS_ENV: &str = "WINDLASS_MAX_REDIRECTS";
const MAX_TRANSFERS_ENV: &str = "WINDLASS_MAX_TRANSFERS";

/// Runtime configuration for one orchestration run.
///
/// The host supplies the managed directory and the catalog URL; everything
/// else has defaults that can be overridden through the builder methods or,
/// for the transport knobs, through environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub managed_dir: PathBuf,
    pub catalog_url: Url,
    pub max_redirects: usize,
    pub max_concurrent_transfers: usize,
    pub connect_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl Config {
    pub fn new(managed_dir: impl Into<PathBuf>, catalog_url: Url) -> Self {
        let max_redirects = env_usize(MAX_REDIRECTS_ENV).unwrap_or(DEFAULT_MAX_REDIRECTS);
        let max_concurrent_transfers =
            env_usize(MAX_TRANSFERS_ENV).unwrap_or(DEFAULT_MAX_CONCURRENT_TRANSFERS);

        let managed_dir = managed_dir.into();
        debug!(
            "windlass configured: managed_dir={}, catalog_url={}, max_redirects={}, max_transfers={}",
            managed_dir.display(),
            catalog_url,
            max_redirects,
            max_concurrent_transfers
        );

        Self {
            managed_dir,
            catalog_url,
            max_redirects,
            max_concurrent_transfers,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            transfer_timeout: Duration::from_secs(TRANSFER_TIMEOUT_SECS),
        }
    }

    /// Parses the catalog URL from a string, for hosts that carry it as
    /// plain configuration text.
    pub fn with_catalog_str(managed_dir: impl Into<PathBuf>, catalog_url: &str) -> Result<Self> {
        let url = Url::parse(catalog_url).map_err(|e| {
            WindlassError::Config(format!("Invalid catalog URL '{catalog_url}': {e}"))
        })?;
        Ok(Self::new(managed_dir, url))
    }

    pub fn max_redirects(mut self, bound: usize) -> Self {
        self.max_redirects = bound;
        self
    }

    pub fn max_concurrent_transfers(mut self, max: usize) -> Self {
        self.max_concurrent_transfers = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn managed_dir(&self) -> &Path {
        &self.managed_dir
    }

    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.managed_dir.join(file_name)
    }

    /// Hidden staging name used while publishing a download into the
    /// managed directory. Never treated as an installed artifact.
    pub fn staging_path(&self, file_name: &str) -> PathBuf {
        self.managed_dir.join(format!(".{file_name}.download"))
    }
}

fn env_usize(var: &str) -> Option<usize> {
    let raw = env::var(var).ok().filter(|s| !s.is_empty())?;
    match raw.parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            debug!("Ignoring unparseable {} value: {}", var, raw);
            None
        }
    }
}
