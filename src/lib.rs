//! # Domain Resolver Library
//!
//! Registration lookups for any domain name, speaking RDAP first and
//! falling back to WHOIS.
//!
//! ## Features
//!
//! - RDAP server selection via the IANA bootstrap registry
//! - Authoritative WHOIS host discovery via IANA, cached for a day
//! - Registry-specific WHOIS query syntaxes and referral following
//! - One normalized record shape for both protocols
//! - Optional result caching
//! - Cancellation and deadlines for every network step
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_resolver::DomainClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DomainClient::new()?;
//!     let record = client.lookup("example.com").await?;
//!
//!     println!("Domain: {}", record.domain);
//!     println!("Source: {}", record.source.as_str());
//!     println!("Registrar: {:?}", record.registrar);
//!
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod lookup;
pub mod parser;
pub mod rdap;
pub mod record;
pub mod servers;
pub mod tld_mappings;
pub mod vcard;
pub mod whois;

// Re-export main types for easy access
pub use cache::ResultCache;
pub use cancel::{CancellationToken, QueryScope};
pub use config::Config;
pub use domain::{normalize_domain, TldKey};
pub use errors::{ErrorBody, ErrorCode, ResolveError};
pub use lookup::Resolver;
pub use record::{Contact, NormalizedRecord, Source};

use std::sync::Arc;

/// High-level client: a [`Resolver`] plus an optional result cache.
#[derive(Clone)]
pub struct DomainClient {
    resolver: Arc<Resolver>,
    cache: Option<Arc<ResultCache>>,
}

impl DomainClient {
    /// Client with configuration from the environment and caching enabled.
    pub fn new() -> Result<Self, ResolveError> {
        let config = Config::load().map_err(|e| ResolveError::Internal(format!("Invalid configuration: {}", e)))?;
        Self::with_config(Arc::new(config))
    }

    pub fn with_config(config: Arc<Config>) -> Result<Self, ResolveError> {
        let cache = Some(Arc::new(ResultCache::new(&config)));
        let resolver = Arc::new(Resolver::new(config)?);
        Ok(Self { resolver, cache })
    }

    /// Client without a result cache. Server lookups are still cached.
    pub fn without_cache(config: Arc<Config>) -> Result<Self, ResolveError> {
        let resolver = Arc::new(Resolver::new(config)?);
        Ok(Self { resolver, cache: None })
    }

    /// Wraps an existing resolver, e.g. one built with fake transports.
    pub fn from_parts(resolver: Arc<Resolver>, cache: Option<Arc<ResultCache>>) -> Self {
        Self { resolver, cache }
    }

    pub async fn lookup(&self, domain: &str) -> Result<NormalizedRecord, ResolveError> {
        self.lookup_with_scope(domain, false, &QueryScope::new()).await
    }

    /// Lookup that bypasses the result cache. The fresh record is still stored.
    pub async fn lookup_fresh(&self, domain: &str) -> Result<NormalizedRecord, ResolveError> {
        self.lookup_with_scope(domain, true, &QueryScope::new()).await
    }

    pub async fn lookup_with_scope(
        &self,
        domain: &str,
        fresh: bool,
        scope: &QueryScope,
    ) -> Result<NormalizedRecord, ResolveError> {
        let normalized = normalize_domain(domain)?;

        if !fresh {
            if let Some(cache) = &self.cache {
                if let Some(record) = cache.get(&normalized).await {
                    return Ok(record);
                }
            }
        }

        let record = self.resolver.resolve_with(&normalized, scope).await?;

        if let Some(cache) = &self.cache {
            cache.insert(&normalized, &record).await;
        }

        Ok(record)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}
