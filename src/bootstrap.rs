//! IANA RDAP bootstrap directory (RFC 9224).
//!
//! The directory is fetched lazily, kept for the configured TTL, and a stale
//! copy keeps serving when a refresh fails. Concurrent refreshes are coalesced
//! so only one request is in flight, and after a failed fetch no new request
//! is made for [`FAILURE_BACKOFF`].

use crate::{
    cache::{Clock, TtlCache},
    cancel::QueryScope,
    config::Config,
    errors::ResolveError,
    http::HttpFetcher,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long a failed fetch is reused before the registry is asked again.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(60);

/// One `[[tlds], [servers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapService(pub Vec<String>, pub Vec<String>);

impl BootstrapService {
    pub fn tlds(&self) -> &[String] {
        &self.0
    }

    pub fn servers(&self) -> &[String] {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRegistry {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub publication: String,
    #[serde(default)]
    pub description: String,
    pub services: Vec<BootstrapService>,
}

impl BootstrapRegistry {
    /// Servers of the first service listing `tld`.
    pub fn servers_for(&self, tld: &str) -> Option<&[String]> {
        self.services
            .iter()
            .find(|service| service.tlds().iter().any(|t| t.eq_ignore_ascii_case(tld)))
            .map(|service| service.servers())
            .filter(|servers| !servers.is_empty())
    }
}

pub struct BootstrapStore {
    fetcher: Arc<dyn HttpFetcher>,
    url: String,
    ttl: Duration,
    timeout: Duration,
    snapshot: TtlCache<String, Arc<BootstrapRegistry>>,
    refresh: Mutex<()>,
    clock: Arc<dyn Clock>,
    last_failure: StdMutex<Option<Instant>>,
}

impl BootstrapStore {
    pub fn new(config: &Config, fetcher: Arc<dyn HttpFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            url: config.bootstrap_url.clone(),
            ttl: config.bootstrap_ttl(),
            timeout: config.discovery_timeout(),
            snapshot: TtlCache::new(clock.clone()),
            refresh: Mutex::new(()),
            clock,
            last_failure: StdMutex::new(None),
        }
    }

    /// Current snapshot, refreshing it if expired.
    ///
    /// Returns `Ok(None)` only when no snapshot was ever fetched successfully.
    /// Errors are limited to cancellation and deadline expiry.
    pub async fn snapshot(&self, scope: &QueryScope) -> Result<Option<Arc<BootstrapRegistry>>, ResolveError> {
        if let Some(registry) = self.snapshot.get(&self.url) {
            return Ok(Some(registry));
        }
        if self.in_backoff() {
            return Ok(self.snapshot.get_stale(&self.url));
        }

        let _refresh = scope.guard(async { Ok(self.refresh.lock().await) }).await?;

        // Another task may have refreshed, or failed to, while we waited for the lock
        if let Some(registry) = self.snapshot.get(&self.url) {
            return Ok(Some(registry));
        }
        if self.in_backoff() {
            debug!("Bootstrap fetch failed recently, not retrying yet");
            return Ok(self.snapshot.get_stale(&self.url));
        }

        match scope.guard(self.fetch()).await {
            Ok(registry) => {
                info!(
                    "Loaded RDAP bootstrap registry ({} services, published {})",
                    registry.services.len(),
                    registry.publication
                );
                let registry = Arc::new(registry);
                self.snapshot.put(self.url.clone(), registry.clone(), self.ttl);
                *self.failure_slot() = None;
                Ok(Some(registry))
            }
            Err(e) if e.is_interruption() => Err(e),
            Err(e) => {
                *self.failure_slot() = Some(self.clock.now());
                let stale = self.snapshot.get_stale(&self.url);
                if stale.is_some() {
                    warn!("Bootstrap refresh failed, serving stale snapshot: {}", e);
                } else {
                    warn!("Bootstrap fetch failed and no snapshot is available: {}", e);
                }
                Ok(stale)
            }
        }
    }

    fn in_backoff(&self) -> bool {
        match *self.failure_slot() {
            Some(failed_at) => self.clock.now().saturating_duration_since(failed_at) < FAILURE_BACKOFF,
            None => false,
        }
    }

    fn failure_slot(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        match self.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn fetch(&self) -> Result<BootstrapRegistry, ResolveError> {
        debug!("Fetching RDAP bootstrap registry from {}", self.url);

        let reply = self.fetcher.get(&self.url, "application/json", self.timeout).await?;
        if !reply.is_success() {
            return Err(ResolveError::Protocol(format!(
                "bootstrap fetch failed with status {}",
                reply.status
            )));
        }

        serde_json::from_str(&reply.body)
            .map_err(|e| ResolveError::Protocol(format!("invalid bootstrap registry: {}", e)))
    }
}
