use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use thiserror::Error;

use crate::cache::{CacheEntry, CacheStore};
use crate::release::{Release, parse_catalog};

/// Default base URL of the GitHub REST API.
pub const GITHUB_API: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const PER_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch release list: {0}")]
    Request(#[source] reqwest::Error),
    #[error("release list request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("release list request failed with HTTP {status} and no cache is available")]
    Status { status: StatusCode },
    #[error("release list was not modified but no cached copy exists")]
    CacheUnavailable,
    #[error("failed to parse release list: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogResponse {
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub from_cache: bool,
}

impl CatalogResponse {
    /// Decode the body into releases.
    ///
    /// # Errors
    /// Returns an error if the body is not a valid release list.
    pub fn releases(&self) -> Result<Vec<Release>, FetchError> {
        parse_catalog(&self.body).map_err(FetchError::Parse)
    }
}

/// Status, entity tag and body of one catalog request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub etag: Option<String>,
    pub body: Vec<u8>,
}

#[must_use]
pub fn releases_url(api_base: &str, repository: &str) -> String {
    let api_base = api_base.trim_end_matches('/');
    format!("{api_base}/repos/{repository}/releases?per_page={PER_PAGE}")
}

pub struct CatalogClient<'a, S> {
    client: &'a reqwest::Client,
    url: String,
    store: &'a S,
    timeout: Duration,
}

impl<'a, S: CacheStore> CatalogClient<'a, S> {
    pub fn new(client: &'a reqwest::Client, url: String, store: &'a S, timeout: Duration) -> Self {
        Self {
            client,
            url,
            store,
            timeout,
        }
    }

    /// Fetch the release list, revalidating against the cached entity tag.
    ///
    /// # Errors
    /// Returns an error when the request fails or times out, or when the
    /// server gives nothing usable and no cached copy exists.
    pub async fn fetch(&self) -> Result<CatalogResponse, FetchError> {
        let cached = self.store.load();
        // A token without a body would turn a 304 into a dead end.
        let etag = cached
            .body
            .as_ref()
            .and(cached.etag.as_deref())
            .map(str::to_string);

        debug!(
            "Fetching {} (If-None-Match: {})",
            self.url,
            etag.as_deref().unwrap_or("<none>")
        );

        let raw = tokio::time::timeout(self.timeout, self.send(etag.as_deref()))
            .await
            .map_err(|_| FetchError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        handle_response(raw, cached, self.store)
    }

    async fn send(&self, etag: Option<&str>) -> Result<RawResponse, FetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .header("User-Agent", concat!("refpack/", env!("CARGO_PKG_VERSION")))
            .header("Accept", GITHUB_ACCEPT);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;
        let status = response.status();
        let etag = response
            .headers()
            .get("ETag")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.request_error(e))?
            .to_vec();

        Ok(RawResponse { status, etag, body })
    }

    fn request_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            FetchError::Request(error)
        }
    }
}

/// Turn a catalog response into the body to use, updating the cache on a
/// full fetch.
///
/// # Errors
/// Returns an error when neither the response nor the cache yields a body,
/// or when a fresh body is not a valid release list.
pub fn handle_response<S: CacheStore>(
    raw: RawResponse,
    cached: CacheEntry,
    store: &S,
) -> Result<CatalogResponse, FetchError> {
    match raw.status {
        StatusCode::NOT_MODIFIED => {
            let body = cached.body.ok_or(FetchError::CacheUnavailable)?;
            info!("Release list not modified, using cache");
            Ok(CatalogResponse {
                body,
                etag: cached.etag,
                from_cache: true,
            })
        }
        StatusCode::OK => {
            parse_catalog(&raw.body).map_err(FetchError::Parse)?;
            if let Err(error) = store.store(&raw.body, raw.etag.as_deref()) {
                warn!("Failed to persist release cache: {error}");
            }
            info!("Fetched fresh release list ({} bytes)", raw.body.len());
            Ok(CatalogResponse {
                body: raw.body,
                etag: raw.etag,
                from_cache: false,
            })
        }
        status => match cached.body {
            Some(body) => {
                warn!("Release list request returned HTTP {status}, using stale cache");
                Ok(CatalogResponse {
                    body,
                    etag: cached.etag,
                    from_cache: true,
                })
            }
            None => Err(FetchError::Status { status }),
        },
    }
}
