use axum::{http::StatusCode, response::IntoResponse};
use domain_resolver::{errors::ErrorCode, Source};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing::warn;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                warn!("Metrics recorder already initialized");
                return;
            }

            // Initialize metrics with zero values
            counter!("domain_lookups_total", "source" => "rdap", "tld" => "unknown").absolute(0);
            counter!("domain_lookups_total", "source" => "whois", "tld" => "unknown").absolute(0);
            counter!("domain_cache_hits_total").absolute(0);
            counter!("domain_cache_misses_total").absolute(0);
            counter!("domain_errors_total", "code" => "unknown").absolute(0);
            histogram!("domain_lookup_duration_seconds").record(0.0);
        }
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
        }
    }
}

pub fn increment_lookups(source: Source, domain: &str) {
    counter!(
        "domain_lookups_total",
        "source" => source.as_str(),
        "tld" => extract_tld(domain)
    )
    .increment(1);
}

pub fn increment_cache_hits() {
    counter!("domain_cache_hits_total").increment(1);
}

pub fn increment_cache_misses() {
    counter!("domain_cache_misses_total").increment(1);
}

pub fn increment_errors(code: ErrorCode) {
    counter!("domain_errors_total", "code" => code.as_str()).increment(1);
}

pub fn record_query_time(duration_ms: u64) {
    let duration_seconds = duration_ms as f64 / 1000.0;
    histogram!("domain_lookup_duration_seconds").record(duration_seconds);
}

pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized".to_string()),
    }
}

fn extract_tld(domain: &str) -> String {
    domain
        .rsplit('.')
        .next()
        .filter(|tld| !tld.is_empty())
        .unwrap_or("unknown")
        .to_lowercase()
}
