// windlass-net/src/catalog.rs
use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;
use windlass_common::config::Config;
use windlass_common::error::{Result, WindlassError};
use windlass_common::model::CatalogEntry;

use crate::http::{build_http_client, RedirectingConnector};
use crate::pool::TransferPool;

/// Fetches the remote catalog manifest and downloads artifact payloads.
///
/// All network work is gated through the shared [`TransferPool`], so the
/// number of concurrent outbound connections is capped regardless of how
/// many callers ask for artifacts simultaneously. Cheap to clone; clones
/// share the client and the pool.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    connector: Arc<RedirectingConnector>,
    pool: TransferPool,
}

impl CatalogClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self {
            connector: Arc::new(RedirectingConnector::new(client, config.max_redirects)),
            pool: TransferPool::new(config.max_concurrent_transfers),
        })
    }

    pub fn with_connector(connector: RedirectingConnector, pool: TransferPool) -> Self {
        Self {
            connector: Arc::new(connector),
            pool,
        }
    }

    pub fn pool(&self) -> &TransferPool {
        &self.pool
    }

    /// Fetches and parses the remote JSON manifest.
    ///
    /// A non-2xx status or a body that fails to parse as a JSON array of
    /// entries fails the whole fetch; a partial or garbled catalog is never
    /// returned, since entry identities could not be trusted.
    pub async fn fetch_catalog(&self, url: &Url) -> Result<Vec<CatalogEntry>> {
        let _permit = self.pool.acquire().await?;
        debug!("Fetching catalog manifest from {}", url);

        let response = self.connector.open(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WindlassError::BadStatusCode {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await.map_err(|e| WindlassError::Network {
            url: url.to_string(),
            reason: format!("failed to read catalog body: {e}"),
        })?;

        let entries: Vec<CatalogEntry> =
            serde_json::from_str(&body).map_err(|e| WindlassError::MalformedCatalog {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Parsed {} catalog entries from {}", entries.len(), url);
        Ok(entries)
    }

    /// Downloads one artifact payload into a temp file in the system temp
    /// directory.
    ///
    /// The temp file cleans itself up on drop, so an abandoned download
    /// never leaves anything at a final destination path; placing the file
    /// into the managed directory is the caller's job. Returns the staged
    /// file and the number of bytes written.
    pub async fn download_artifact(&self, entry: &CatalogEntry) -> Result<(NamedTempFile, u64)> {
        let _permit = self.pool.acquire().await?;
        let url = &entry.download_url;
        debug!("Downloading '{}' from {}", entry.id, url);

        let response = self.connector.open(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WindlassError::BadStatusCode {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut temp = NamedTempFile::new().map_err(|e| {
            WindlassError::IoError(format!("Failed to create temp file for download: {e}"))
        })?;
        let mut size_bytes: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WindlassError::Network {
                url: url.to_string(),
                reason: format!("download interrupted: {e}"),
            })?;
            temp.as_file_mut().write_all(&chunk).map_err(|e| {
                WindlassError::IoError(format!(
                    "Failed to write download stream to {}: {}",
                    temp.path().display(),
                    e
                ))
            })?;
            size_bytes += chunk.len() as u64;
        }
        temp.as_file_mut().flush().map_err(|e| {
            WindlassError::IoError(format!("Failed to flush downloaded bytes: {e}"))
        })?;

        debug!(
            "Finished writing {} bytes for '{}' to {}",
            size_bytes,
            entry.id,
            temp.path().display()
        );
        Ok((temp, size_bytes))
    }
}
