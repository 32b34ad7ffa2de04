//! Maps a [`TldKey`] onto the RDAP servers and WHOIS host that serve it.

use crate::{
    bootstrap::BootstrapStore,
    cache::{Clock, TtlCache},
    cancel::QueryScope,
    config::Config,
    domain::TldKey,
    errors::ResolveError,
    http::HttpFetcher,
    tld_mappings::{DEFAULT_WHOIS_HOST, FALLBACK_WHOIS_SERVERS, NON_RDAP_TLDS, RDAP_OVERRIDES, WHOIS_OVERRIDES},
    whois::{discover_whois_host, WhoisTransport},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// True unless any key of `tld` is in the curated set of TLDs without RDAP.
pub fn is_rdap_capable(tld: &TldKey) -> bool {
    !tld.candidates().any(|key| NON_RDAP_TLDS.contains(key))
}

pub struct ServerResolver {
    bootstrap: BootstrapStore,
    whois_hosts: TtlCache<String, String>,
    transport: Arc<dyn WhoisTransport>,
    iana_whois_host: String,
    discovery_timeout: Duration,
    whois_host_ttl: Duration,
    default_rdap_servers: Vec<String>,
}

impl ServerResolver {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn HttpFetcher>,
        transport: Arc<dyn WhoisTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bootstrap: BootstrapStore::new(config, fetcher, clock.clone()),
            whois_hosts: TtlCache::new(clock),
            transport,
            iana_whois_host: config.iana_whois_host.clone(),
            discovery_timeout: config.discovery_timeout(),
            whois_host_ttl: config.whois_server_ttl(),
            default_rdap_servers: config.rdap_default_servers.clone(),
        }
    }

    /// RDAP base URLs for `tld`, in the order they should be tried.
    pub async fn servers_for_tld(&self, tld: &TldKey, scope: &QueryScope) -> Result<Vec<String>, ResolveError> {
        for key in tld.candidates() {
            if let Some(servers) = RDAP_OVERRIDES.get(key) {
                debug!("Using RDAP override for {}", key);
                return Ok(servers.iter().map(|s| s.to_string()).collect());
            }
        }

        if let Some(registry) = self.bootstrap.snapshot(scope).await? {
            for key in tld.candidates() {
                if let Some(servers) = registry.servers_for(key) {
                    debug!("Bootstrap lists {} RDAP server(s) for {}", servers.len(), key);
                    return Ok(servers.to_vec());
                }
            }
        }

        if self.default_rdap_servers.is_empty() {
            return Err(ResolveError::TldNotSupported(tld.to_string()));
        }

        warn!("No RDAP server known for {}, using default servers", tld);
        Ok(self.default_rdap_servers.clone())
    }

    /// WHOIS host for `tld`. Falls back to the generic default host and only
    /// fails when the scope is interrupted.
    pub async fn whois_host_for_tld(&self, tld: &TldKey, scope: &QueryScope) -> Result<String, ResolveError> {
        for key in tld.candidates() {
            if let Some(host) = WHOIS_OVERRIDES.get(key) {
                debug!("Using WHOIS override for {}: {}", key, host);
                return Ok(host.to_string());
            }
        }

        if let Some(host) = self.whois_hosts.get(&tld.label) {
            debug!("Using cached WHOIS host for {}: {}", tld.label, host);
            return Ok(host);
        }

        let discovery = discover_whois_host(
            self.transport.as_ref(),
            &self.iana_whois_host,
            &tld.label,
            self.discovery_timeout,
        );
        match scope.guard(discovery).await {
            Ok(Some(host)) => {
                info!("Discovered WHOIS server for {}: {}", tld.label, host);
                self.whois_hosts.put(tld.label.clone(), host.clone(), self.whois_host_ttl);
                return Ok(host);
            }
            Ok(None) => debug!("IANA lists no WHOIS server for {}", tld.label),
            Err(e) if e.is_interruption() => return Err(e),
            Err(e) => warn!("WHOIS server discovery for {} failed: {}", tld.label, e),
        }

        for key in tld.candidates() {
            if let Some(host) = FALLBACK_WHOIS_SERVERS.get(key) {
                debug!("Using well-known WHOIS host for {}: {}", key, host);
                return Ok(host.to_string());
            }
        }

        warn!("No WHOIS server found for {}, using {}", tld, DEFAULT_WHOIS_HOST);
        Ok(DEFAULT_WHOIS_HOST.to_string())
    }
}
