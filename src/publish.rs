//! Publisher client: hand a flattened board to the persistence service.
//!
//! The payload is the exported PNG as a data URL, a title, and one product
//! link per URL-sourced object. The service answers with the public URL of the
//! published board. Pure parsing lives in `parse_response` and `product_title`
//! for testability.

#[cfg(test)]
#[path = "publish_test.rs"]
mod publish_test;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use scene::geom::Size;
use scene::notice::PUBLISH_FAILED;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::config::ServiceConfig;

pub const DEFAULT_TITLE: &str = "Untitled Moodboard";
const DEFAULT_PRODUCT_TITLE: &str = "Product";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("publish request failed: {0}")]
    Request(String),
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },
    #[error("unreadable publish response: {0}")]
    Parse(String),
    #[error("publish service reported failure")]
    NotSuccessful,
}

impl PublishError {
    /// Text shown to the user for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            _ => PUBLISH_FAILED.to_owned(),
        }
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductLink {
    pub url: String,
    pub title: String,
}

impl ProductLink {
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        Self { url: url.to_owned(), title: product_title(url) }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub title: String,
    /// `data:image/png;base64,...`
    pub image: String,
    pub products: Vec<ProductLink>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub canvas_size: Size,
}

impl PublishPayload {
    /// Assemble a payload. A blank title becomes [`DEFAULT_TITLE`].
    #[must_use]
    pub fn new(title: &str, png: &[u8], source_urls: &[&str], canvas_size: Size, created_at: OffsetDateTime) -> Self {
        let title = title.trim();
        let title = if title.is_empty() { DEFAULT_TITLE } else { title };
        Self {
            title: title.to_owned(),
            image: data_url(png),
            products: source_urls.iter().map(|url| ProductLink::from_url(url)).collect(),
            created_at,
            canvas_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub success: bool,
    pub public_url: String,
    #[serde(default)]
    pub moodboard_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// =============================================================================
// PUBLISHER
// =============================================================================

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: &PublishPayload) -> Result<PublishReceipt, PublishError>;
}

pub struct HttpPublisher {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpPublisher {
    /// Build a publisher posting to `config.publish_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::HttpClientBuild`] if the client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(config.publish_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PublishError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint: config.publish_url.clone() })
    }
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, payload: &PublishPayload) -> Result<PublishReceipt, PublishError> {
        info!(
            endpoint = %self.endpoint,
            title = %payload.title,
            products = payload.products.len(),
            image_len = payload.image.len(),
            "publishing moodboard"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        parse_response(status, &text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Interpret a publish response.
///
/// # Errors
///
/// Non-2xx statuses become [`PublishError::Rejected`] carrying the body's
/// `error` field (or a generic message); unreadable bodies become
/// [`PublishError::Parse`]; `success: false` becomes
/// [`PublishError::NotSuccessful`].
pub fn parse_response(status: u16, body: &str) -> Result<PublishReceipt, PublishError> {
    if !(200..300).contains(&status) {
        let message = match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { error: Some(message) }) if !message.trim().is_empty() => message,
            _ => PUBLISH_FAILED.to_owned(),
        };
        return Err(PublishError::Rejected { status, message });
    }

    let receipt: PublishReceipt = serde_json::from_str(body).map_err(|e| PublishError::Parse(e.to_string()))?;
    if !receipt.success {
        return Err(PublishError::NotSuccessful);
    }
    Ok(receipt)
}

/// Encode PNG bytes as a `data:` URL.
#[must_use]
pub fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// A display title for a product link, derived from the URL alone.
#[must_use]
pub fn product_title(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return DEFAULT_PRODUCT_TITLE.to_owned();
    };
    let host = url.host_str().unwrap_or_default();

    if host.contains("amazon.com") {
        let asin = url
            .path()
            .split('/')
            .find(|part| part.len() == 10 && part.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        return match asin {
            Some(asin) => format!("Amazon Product ({asin})"),
            None => "Amazon Product".to_owned(),
        };
    }
    if host.contains("etsy.com") {
        return "Etsy Product".to_owned();
    }
    if host.contains("walmart.com") {
        return "Walmart Product".to_owned();
    }
    if host.contains("bestbuy.com") {
        return "Best Buy Product".to_owned();
    }

    match url.path().split('/').rfind(|part| !part.is_empty()) {
        Some(last) if last.len() > 3 => {
            let spaced = last.replace(['-', '_'], " ");
            let stem = spaced.rfind('.').map_or(spaced.as_str(), |dot| &spaced[..dot]);
            if stem.is_empty() { DEFAULT_PRODUCT_TITLE.to_owned() } else { stem.to_owned() }
        }
        _ => DEFAULT_PRODUCT_TITLE.to_owned(),
    }
}
