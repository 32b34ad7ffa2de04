//! HTTP seam used for the bootstrap directory and RDAP queries.

use crate::{config::Config, errors::ResolveError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const RDAP_ACCEPT: &str = "application/rdap+json, application/json";

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a GET and returns the reply regardless of status.
///
/// Only failures to complete the exchange are errors; mapping statuses to
/// outcomes is up to the caller.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str, accept: &str, timeout: Duration) -> Result<HttpReply, ResolveError>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &Config) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.discovery_timeout())
            .gzip(true)
            .build()
            .map_err(|e| ResolveError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, accept: &str, timeout: Duration) -> Result<HttpReply, ResolveError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| map_reqwest_error(url, e))?;

        debug!("{} answered {} ({} bytes)", url, status, body.len());
        Ok(HttpReply { status, body })
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> ResolveError {
    if e.is_timeout() {
        ResolveError::Timeout(url.to_string())
    } else if e.is_connect() {
        ResolveError::ConnectionFailed(format!("{}: {}", url, e))
    } else if e.is_decode() || e.is_body() {
        ResolveError::Protocol(format!("{}: {}", url, e))
    } else {
        ResolveError::ConnectionFailed(format!("{}: {}", url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_success_range() {
        assert!(HttpReply::new(200, "").is_success());
        assert!(HttpReply::new(204, "").is_success());
        assert!(!HttpReply::new(404, "").is_success());
        assert!(!HttpReply::new(503, "").is_success());
    }

    #[test]
    fn test_fetcher_builds_from_defaults() {
        assert!(ReqwestFetcher::new(&Config::default()).is_ok());
    }
}
