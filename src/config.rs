//! Service configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use reqwest::Url;

pub const DEFAULT_PUBLISH_URL: &str = "http://127.0.0.1:3000/api/publish-moodboard";
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:3000";
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOAD_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid http(s) URL: {value:?}")]
    InvalidUrl { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Endpoint that accepts the publish payload.
    pub publish_url: String,
    /// Origin sent with CORS-mode image requests.
    pub origin: String,
    pub load_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    /// Completed loads buffered before load tasks wait for the session.
    pub load_queue_capacity: usize,
    /// Largest image response body accepted by the fetcher.
    pub max_image_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            publish_url: DEFAULT_PUBLISH_URL.to_owned(),
            origin: DEFAULT_ORIGIN.to_owned(),
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            load_queue_capacity: DEFAULT_LOAD_QUEUE_CAPACITY,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `MOODBOARD_PUBLISH_URL`: default `http://127.0.0.1:3000/api/publish-moodboard`
    /// - `MOODBOARD_ORIGIN`: default `http://127.0.0.1:3000`
    /// - `MOODBOARD_LOAD_TIMEOUT_SECS`: default 15
    /// - `MOODBOARD_CONNECT_TIMEOUT_SECS`: default 10
    /// - `MOODBOARD_PUBLISH_TIMEOUT_SECS`: default 60
    /// - `MOODBOARD_LOAD_QUEUE_CAPACITY`: default 64
    /// - `MOODBOARD_MAX_IMAGE_BYTES`: default 20 MiB
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a URL does not parse or a limit is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            publish_url: std::env::var("MOODBOARD_PUBLISH_URL").unwrap_or_else(|_| DEFAULT_PUBLISH_URL.to_owned()),
            origin: std::env::var("MOODBOARD_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_ORIGIN.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            load_timeout_secs: env_parse("MOODBOARD_LOAD_TIMEOUT_SECS", DEFAULT_LOAD_TIMEOUT_SECS),
            connect_timeout_secs: env_parse("MOODBOARD_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            publish_timeout_secs: env_parse("MOODBOARD_PUBLISH_TIMEOUT_SECS", DEFAULT_PUBLISH_TIMEOUT_SECS),
            load_queue_capacity: env_parse("MOODBOARD_LOAD_QUEUE_CAPACITY", DEFAULT_LOAD_QUEUE_CAPACITY),
            max_image_bytes: env_parse("MOODBOARD_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs and limits.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("MOODBOARD_PUBLISH_URL", &self.publish_url)?;
        check_url("MOODBOARD_ORIGIN", &self.origin)?;
        if self.load_timeout_secs == 0 {
            return Err(ConfigError::Zero { var: "MOODBOARD_LOAD_TIMEOUT_SECS" });
        }
        if self.load_queue_capacity == 0 {
            return Err(ConfigError::Zero { var: "MOODBOARD_LOAD_QUEUE_CAPACITY" });
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::Zero { var: "MOODBOARD_MAX_IMAGE_BYTES" });
        }
        Ok(())
    }

    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

fn check_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidUrl { var, value: value.to_owned() }),
    }
}

pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
