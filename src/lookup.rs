//! Protocol selection and fallback for a single resolution.
//!
//! RDAP is tried first for every TLD that supports it. Any RDAP failure,
//! including not-found, falls back to WHOIS. Cancellation and deadline expiry
//! end the resolution wherever they happen.

use crate::{
    cache::{Clock, SystemClock},
    cancel::QueryScope,
    config::Config,
    domain::{normalize_domain, to_unicode, TldKey},
    errors::ResolveError,
    http::{HttpFetcher, ReqwestFetcher},
    rdap::{self, RdapExecutor},
    record::NormalizedRecord,
    servers::{is_rdap_capable, ServerResolver},
    tld_mappings::RESTRICTED_TLDS,
    whois::{TcpWhoisTransport, WhoisExecutor, WhoisTransport},
};
use chrono::Utc;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, instrument, warn};

/// Resolution engine. Cheap to share behind an `Arc`; all state is the two
/// server caches owned by the [`ServerResolver`].
pub struct Resolver {
    servers: ServerResolver,
    rdap: RdapExecutor,
    whois: WhoisExecutor,
}

impl Resolver {
    /// Engine backed by reqwest and real TCP sockets.
    pub fn new(config: Arc<Config>) -> Result<Self, ResolveError> {
        let fetcher = Arc::new(ReqwestFetcher::new(&config)?);
        let transport = Arc::new(TcpWhoisTransport::new(&config));
        Ok(Self::with_components(config, fetcher, transport, Arc::new(SystemClock)))
    }

    pub fn with_components(
        config: Arc<Config>,
        fetcher: Arc<dyn HttpFetcher>,
        transport: Arc<dyn WhoisTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            servers: ServerResolver::new(&config, fetcher.clone(), transport.clone(), clock),
            rdap: RdapExecutor::new(&config, fetcher),
            whois: WhoisExecutor::new(&config, transport),
        }
    }

    pub async fn resolve(&self, input: &str) -> Result<NormalizedRecord, ResolveError> {
        self.resolve_with(input, &QueryScope::new()).await
    }

    /// Resolves `input` under `scope`.
    ///
    /// Input is validated before any network traffic. When both protocols
    /// fail the reported error follows [`merge_failures`].
    #[instrument(skip(self, scope))]
    pub async fn resolve_with(&self, input: &str, scope: &QueryScope) -> Result<NormalizedRecord, ResolveError> {
        let started = Instant::now();
        let domain = normalize_domain(input)?;
        let tld = TldKey::from_domain(&domain)?;
        scope.check()?;

        let rdap_error = if is_rdap_capable(&tld) {
            match self.try_rdap(&domain, &tld, scope).await {
                Ok(record) => return Ok(finish(record, started)),
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => {
                    info!("RDAP lookup for {} failed ({}), falling back to WHOIS", domain, e);
                    Some(e)
                }
            }
        } else {
            debug!("Skipping RDAP for {}: TLD has no RDAP service", tld);
            None
        };

        match self.try_whois(&domain, &tld, scope).await {
            Ok(record) => Ok(finish(record, started)),
            Err(e) if e.is_interruption() => Err(e),
            Err(e) => {
                warn!("WHOIS lookup for {} failed: {}", domain, e);
                Err(merge_failures(&domain, &tld, rdap_error, e))
            }
        }
    }

    async fn try_rdap(&self, domain: &str, tld: &TldKey, scope: &QueryScope) -> Result<NormalizedRecord, ResolveError> {
        let servers = self.servers.servers_for_tld(tld, scope).await?;
        let answer = self.rdap.query(&servers, domain, scope).await?;
        Ok(rdap::normalize(answer, domain))
    }

    async fn try_whois(&self, domain: &str, tld: &TldKey, scope: &QueryScope) -> Result<NormalizedRecord, ResolveError> {
        let host = self.servers.whois_host_for_tld(tld, scope).await?;
        self.whois.lookup(&host, domain, scope).await
    }
}

fn finish(mut record: NormalizedRecord, started: Instant) -> NormalizedRecord {
    record.compute_ages(Utc::now());
    record.query_time_ms = started.elapsed().as_millis() as u64;
    info!(
        "Resolved {} via {} ({}) in {}ms",
        to_unicode(&record.domain),
        record.source.as_str(),
        record.server,
        record.query_time_ms
    );
    record
}

/// Chooses the error reported when WHOIS failed after RDAP was tried or skipped.
///
/// A not-found from either protocol wins. Access-restricted registries turn
/// empty or unreachable WHOIS service into a `Query` error with a manual-check
/// URL. Otherwise the RDAP error is kept when there is one.
pub fn merge_failures(
    domain: &str,
    tld: &TldKey,
    rdap_error: Option<ResolveError>,
    whois_error: ResolveError,
) -> ResolveError {
    if matches!(rdap_error, Some(ResolveError::DomainNotFound(_)))
        || matches!(whois_error, ResolveError::DomainNotFound(_))
    {
        return ResolveError::DomainNotFound(domain.to_string());
    }

    if let Some(url) = RESTRICTED_TLDS.get(tld.label.as_str()) {
        if matches!(whois_error, ResolveError::EmptyResponse(_)) || whois_error.is_transport() {
            return ResolveError::Query {
                message: format!(
                    "The .{} registry restricts automated WHOIS access. You can check manually.",
                    tld.label
                ),
                manual_check_url: Some(url.to_string()),
            };
        }
    }

    rdap_error.unwrap_or(whois_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(domain: &str) -> TldKey {
        TldKey::from_domain(domain).unwrap()
    }

    #[test]
    fn test_not_found_wins() {
        let err = merge_failures(
            "example.com",
            &key("example.com"),
            Some(ResolveError::DomainNotFound("example.com".into())),
            ResolveError::Timeout("whois.verisign-grs.com".into()),
        );
        assert_eq!(err, ResolveError::DomainNotFound("example.com".into()));

        let err = merge_failures(
            "example.com",
            &key("example.com"),
            Some(ResolveError::Protocol("bad json".into())),
            ResolveError::DomainNotFound("example.com".into()),
        );
        assert_eq!(err, ResolveError::DomainNotFound("example.com".into()));
    }

    #[test]
    fn test_restricted_tld_gets_manual_check_url() {
        let err = merge_failures(
            "example.co.nz",
            &key("example.co.nz"),
            Some(ResolveError::Timeout("https://client.rdap.org/".into())),
            ResolveError::EmptyResponse("whois.srs.net.nz".into()),
        );
        match err {
            ResolveError::Query { manual_check_url, .. } => {
                assert_eq!(manual_check_url.as_deref(), Some("https://whois.srs.net.nz"));
            }
            other => panic!("expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn test_rdap_error_preferred_over_whois_error() {
        let err = merge_failures(
            "example.io",
            &key("example.io"),
            Some(ResolveError::Protocol("HTTP 500".into())),
            ResolveError::ConnectionRefused("whois.nic.io".into()),
        );
        assert_eq!(err, ResolveError::Protocol("HTTP 500".into()));

        let err = merge_failures(
            "example.arpa",
            &key("example.arpa"),
            None,
            ResolveError::ConnectionRefused("whois.iana.org".into()),
        );
        assert_eq!(err, ResolveError::ConnectionRefused("whois.iana.org".into()));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_network() {
        let resolver = Resolver::new(Arc::new(Config::default())).unwrap();
        for input in ["", "localhost", "-bad-.com", "exa mple.com"] {
            let result = resolver.resolve(input).await;
            assert!(
                matches!(result, Err(ResolveError::InvalidDomain(_))),
                "{:?} should be rejected, got {:?}",
                input,
                result
            );
        }
    }
}
