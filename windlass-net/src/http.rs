// windlass-net/src/http.rs
use reqwest::header::{HeaderMap, ACCEPT, LOCATION, USER_AGENT};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;
use windlass_common::config::Config;
use windlass_common::error::{Result, WindlassError};

const USER_AGENT_STRING: &str = "windlass artifact pipeline (Rust; +https://github.com/windlass-dev/windlass)";

/// Builds the shared HTTP client.
///
/// Automatic redirect following is disabled: [`RedirectingConnector`] owns
/// the redirect loop so the hop count stays under its exclusive control.
pub fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, USER_AGENT_STRING.parse().unwrap());
    headers.insert(ACCEPT, "*/*".parse().unwrap());
    Client::builder()
        .timeout(config.transfer_timeout)
        .connect_timeout(config.connect_timeout)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| WindlassError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Opens HTTP connections while following 3xx redirects up to a bound.
///
/// Each hop resolves the `Location` header relative to the current URL and
/// drops the intermediate response before reconnecting, so abandoned
/// connections never leak. Exceeding the bound fails with
/// [`WindlassError::TooManyRedirects`].
#[derive(Debug, Clone)]
pub struct RedirectingConnector {
    client: Client,
    max_redirects: usize,
}

impl RedirectingConnector {
    pub fn new(client: Client, max_redirects: usize) -> Self {
        Self {
            client,
            max_redirects,
        }
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }

    /// Sends a GET request to `url`, transparently following redirects.
    ///
    /// The returned response is the first non-3xx hop; its status code is
    /// not otherwise inspected here, callers decide what a usable status is.
    pub async fn open(&self, url: &Url) -> Result<Response> {
        let mut current = url.clone();
        // one initial request plus max_redirects follow-ups
        for hop in 0..=self.max_redirects {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| WindlassError::Network {
                    url: current.to_string(),
                    reason: e.to_string(),
                })?;

            if !response.status().is_redirection() {
                if hop > 0 {
                    debug!("Resolved {} after {} redirect(s): {}", url, hop, current);
                }
                return Ok(response);
            }

            let location = response
                .headers()
                .get(LOCATION)
                .ok_or_else(|| WindlassError::Network {
                    url: current.to_string(),
                    reason: format!(
                        "redirect status {} without a Location header",
                        response.status()
                    ),
                })?
                .to_str()
                .map_err(|e| WindlassError::Network {
                    url: current.to_string(),
                    reason: format!("unreadable Location header: {e}"),
                })?
                .to_owned();

            // Location may be relative; resolve against the hop we came from
            let next = current.join(&location)?;
            debug!("Following redirect {} -> {}", current, next);
            // intermediate connection is closed when the response drops
            drop(response);
            current = next;
        }

        Err(WindlassError::TooManyRedirects {
            url: url.to_string(),
            bound: self.max_redirects,
        })
    }
}
