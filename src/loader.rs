//! Image loading: fetch by URL, decode, and report completions asynchronously.
//!
//! DESIGN
//! ======
//! Every URL is first requested in CORS mode: the request carries an `Origin`
//! header and the response must grant read access through
//! `Access-Control-Allow-Origin`. If that attempt fails for any reason the
//! image is requested again without CORS. That second attempt can still be
//! placed and drawn, but its raster is marked cross-origin, so a composite that
//! contains it cannot be encoded.
//!
//! Loads run as independent tokio tasks with a timeout and report on a bounded
//! channel in completion order. Each completion carries the generation it was
//! requested under; the session drops completions from an older generation.

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap, ORIGIN};
use scene::raster::{Origin, Raster, RasterError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid image URL: {0:?}")]
    InvalidUrl(String),
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("cross-origin read not permitted")]
    CorsDenied,
    #[error("image decode failed: {0}")]
    Decode(#[from] RasterError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("image larger than {limit} bytes")]
    TooLarge { limit: usize },
}

/// How an image request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Request read access; the response must allow our origin.
    Cors,
    /// Plain request; the bytes are usable but tainted.
    Opaque,
}

#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, LoadError>;
}

/// Parse `raw` as an `http`/`https` URL.
///
/// # Errors
///
/// Returns [`LoadError::InvalidUrl`] otherwise.
pub fn parse_image_url(raw: &str) -> Result<Url, LoadError> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(url),
        _ => Err(LoadError::InvalidUrl(raw.to_owned())),
    }
}

/// Whether a response's headers grant `origin` read access.
#[must_use]
pub fn cors_allows(headers: &HeaderMap, origin: &str) -> bool {
    headers
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .is_some_and(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin))
}

// =============================================================================
// HTTP FETCHER
// =============================================================================

pub struct HttpFetcher {
    http: reqwest::Client,
    origin: String,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher from service config.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::HttpClientBuild`] if the client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, LoadError> {
        let http = reqwest::Client::builder()
            .timeout(config.load_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| LoadError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, origin: config.origin.clone(), max_bytes: config.max_image_bytes })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<Vec<u8>, LoadError> {
        let url = parse_image_url(url)?;
        let mut request = self.http.get(url);
        if mode == FetchMode::Cors {
            request = request.header(ORIGIN, &self.origin);
        }
        let mut response = request.send().await.map_err(|e| LoadError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }
        if mode == FetchMode::Cors && !cors_allows(response.headers(), &self.origin) {
            return Err(LoadError::CorsDenied);
        }
        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(LoadError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| LoadError::Request(e.to_string()))? {
            if body.len() + chunk.len() > limit {
                return Err(LoadError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

// =============================================================================
// RESOLVE
// =============================================================================

/// Fetch and decode `url`, trying CORS first and falling back to an opaque
/// (cross-origin) request.
///
/// # Errors
///
/// Returns [`LoadError::InvalidUrl`] without any request for malformed URLs,
/// otherwise the error of the opaque attempt.
pub async fn resolve(fetcher: &dyn ImageFetcher, url: &str) -> Result<Raster, LoadError> {
    parse_image_url(url)?;

    let cors = match fetcher.fetch(url, FetchMode::Cors).await {
        Ok(bytes) => Raster::decode(&bytes, Origin::SameOrigin).map_err(LoadError::from),
        Err(e) => Err(e),
    };
    match cors {
        Ok(raster) => return Ok(raster),
        Err(e) => debug!(%url, error = %e, "cors load failed; retrying without cors"),
    }

    let bytes = fetcher.fetch(url, FetchMode::Opaque).await?;
    let raster = Raster::decode(&bytes, Origin::CrossOrigin)?;
    info!(%url, width = raster.width(), height = raster.height(), "loaded cross-origin image");
    Ok(raster)
}

/// Decode pasted or local image bytes.
///
/// # Errors
///
/// Returns [`LoadError::Decode`] for unreadable bytes.
pub fn decode_pasted(bytes: &[u8]) -> Result<Raster, LoadError> {
    Ok(Raster::decode(bytes, Origin::SameOrigin)?)
}

// =============================================================================
// LOAD QUEUE
// =============================================================================

/// Handle for one requested load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    pub id: Uuid,
    pub generation: u64,
}

/// The outcome of one load, delivered in completion order.
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub url: String,
    pub result: Result<Raster, LoadError>,
}

pub struct LoadQueue {
    fetcher: Arc<dyn ImageFetcher>,
    timeout: Duration,
    tx: mpsc::Sender<LoadCompletion>,
    rx: mpsc::Receiver<LoadCompletion>,
}

impl LoadQueue {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>, timeout: Duration, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { fetcher, timeout, tx, rx }
    }

    /// Start loading `url` in the background. Must be called within a tokio
    /// runtime. Returns immediately.
    pub fn request(&self, url: &str, generation: u64) -> LoadTicket {
        let ticket = LoadTicket { id: Uuid::new_v4(), generation };
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let url = url.to_owned();

        debug!(id = %ticket.id, generation, %url, "load requested");
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, resolve(fetcher.as_ref(), &url)).await {
                Ok(result) => result,
                Err(_) => Err(LoadError::Timeout(timeout)),
            };
            if let Err(e) = &result {
                warn!(id = %ticket.id, %url, error = %e, "load failed");
            }
            if tx.send(LoadCompletion { ticket, url, result }).await.is_err() {
                debug!(id = %ticket.id, "load finished after queue closed; discarding");
            }
        });
        ticket
    }

    /// The next finished load, if one is ready. Never waits.
    pub fn try_next(&mut self) -> Option<LoadCompletion> {
        match self.rx.try_recv() {
            Ok(completion) => Some(completion),
            Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next finished load.
    pub async fn next(&mut self) -> Option<LoadCompletion> {
        self.rx.recv().await
    }
}
