//! RDAP (Registration Data Access Protocol) domain queries.
//!
//! RFC 7480-7484: JSON over HTTPS. Servers for a TLD come from
//! [`crate::servers::ServerResolver`]; this module tries them in order and
//! normalizes the first valid domain object.

use crate::{
    cancel::QueryScope,
    config::Config,
    errors::ResolveError,
    http::{HttpFetcher, RDAP_ACCEPT},
    record::{normalize_timestamp, Contact, NormalizedRecord, Notice, RawPayload, Source},
    vcard,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapDomain {
    pub rdap_conformance: Option<Vec<String>>,
    pub object_class_name: Option<String>,
    pub handle: Option<String>,
    pub ldh_name: Option<String>,
    pub unicode_name: Option<String>,
    #[serde(default)]
    pub nameservers: Vec<RdapNameserver>,
    #[serde(rename = "secureDNS")]
    pub secure_dns: Option<SecureDns>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub events: Vec<RdapEvent>,
    #[serde(default)]
    pub entities: Vec<RdapEntity>,
    #[serde(default)]
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapNameserver {
    pub ldh_name: Option<String>,
    pub unicode_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureDns {
    pub zone_signed: Option<bool>,
    pub delegation_signed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEvent {
    #[serde(default)]
    pub event_action: String,
    pub event_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEntity {
    pub handle: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub vcard_array: Option<serde_json::Value>,
}

impl RdapEntity {
    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// A validated domain object and the server that returned it.
#[derive(Debug, Clone)]
pub struct RdapAnswer {
    pub server: String,
    pub domain: RdapDomain,
    pub raw: serde_json::Value,
}

pub struct RdapExecutor {
    fetcher: Arc<dyn HttpFetcher>,
    timeout: Duration,
}

impl RdapExecutor {
    pub fn new(config: &Config, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetcher,
            timeout: config.rdap_timeout(),
        }
    }

    /// Tries `servers` one at a time.
    ///
    /// A 404 from one server does not stop the walk, but if no server
    /// answers and any of them said 404 the result is `DomainNotFound`.
    /// Otherwise the last server's error is returned.
    pub async fn query(&self, servers: &[String], domain: &str, scope: &QueryScope) -> Result<RdapAnswer, ResolveError> {
        if servers.is_empty() {
            return Err(ResolveError::TldNotSupported(domain.to_string()));
        }

        let mut saw_not_found = false;
        let mut last_error = None;

        for server in servers {
            match scope.guard(self.query_server(server, domain)).await {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_interruption() => return Err(e),
                Err(ResolveError::DomainNotFound(_)) => {
                    debug!("RDAP server {} has no record of {}", server, domain);
                    saw_not_found = true;
                }
                Err(e) => {
                    warn!("RDAP query to {} failed: {}", server, e);
                    last_error = Some(e);
                }
            }
        }

        if saw_not_found {
            Err(ResolveError::DomainNotFound(domain.to_string()))
        } else {
            Err(last_error.unwrap_or_else(|| ResolveError::Protocol("no RDAP server answered".to_string())))
        }
    }

    async fn query_server(&self, server: &str, domain: &str) -> Result<RdapAnswer, ResolveError> {
        let url = domain_url(server, domain)?;
        debug!("Querying RDAP server: {}", url);

        let reply = self.fetcher.get(url.as_str(), RDAP_ACCEPT, self.timeout).await?;
        if reply.status == 404 {
            return Err(ResolveError::DomainNotFound(domain.to_string()));
        }
        if !reply.is_success() {
            return Err(ResolveError::Protocol(format!("{} returned HTTP {}", url, reply.status)));
        }

        let raw: serde_json::Value = serde_json::from_str(&reply.body)
            .map_err(|e| ResolveError::Protocol(format!("invalid JSON from {}: {}", url, e)))?;
        let parsed: RdapDomain = serde_json::from_value(raw.clone())
            .map_err(|e| ResolveError::Protocol(format!("unexpected RDAP shape from {}: {}", url, e)))?;

        if parsed.rdap_conformance.is_none() || parsed.object_class_name.as_deref() != Some("domain") {
            return Err(ResolveError::Protocol(format!("{} did not return a domain object", url)));
        }

        Ok(RdapAnswer {
            server: server.to_string(),
            domain: parsed,
            raw,
        })
    }
}

/// `{server}/domain/{name}`, tolerating base URLs with or without a trailing slash.
pub fn domain_url(server: &str, domain: &str) -> Result<Url, ResolveError> {
    let base = if server.ends_with('/') {
        server.to_string()
    } else {
        format!("{}/", server)
    };

    Url::parse(&base)
        .and_then(|base| base.join(&format!("domain/{}", domain)))
        .map_err(|e| ResolveError::Protocol(format!("invalid RDAP server URL '{}': {}", server, e)))
}

/// Maps an RDAP domain object onto the common record.
pub fn normalize(answer: RdapAnswer, domain: &str) -> NormalizedRecord {
    let RdapAnswer { server, domain: doc, raw } = answer;
    let mut record = NormalizedRecord::new(domain, Source::Rdap, server, RawPayload::Json(raw));

    record.registrar = doc
        .entities
        .iter()
        .find(|e| e.has_role("registrar"))
        .and_then(|e| {
            e.vcard_array
                .as_ref()
                .and_then(vcard::formatted_name)
                .or_else(|| e.handle.clone())
        });

    for entity in &doc.entities {
        let Some(vcard_array) = entity.vcard_array.as_ref() else {
            continue;
        };
        let contact = vcard::contact_from_vcard(vcard_array);
        if contact.is_empty() {
            continue;
        }

        let slots: [(&str, &mut Option<Contact>); 4] = [
            ("registrant", &mut record.registrant),
            ("administrative", &mut record.admin),
            ("technical", &mut record.tech),
            ("billing", &mut record.billing),
        ];
        for (role, slot) in slots {
            if entity.has_role(role) {
                *slot = Some(contact.clone());
            }
        }
    }

    for ns in &doc.nameservers {
        let name = ns
            .unicode_name
            .as_deref()
            .or(ns.ldh_name.as_deref())
            .map(|n| n.trim_end_matches('.').to_lowercase());
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            if !record.nameservers.contains(&name) {
                record.nameservers.push(name);
            }
        }
    }

    record.dnssec = Some(
        doc.secure_dns
            .as_ref()
            .and_then(|s| s.delegation_signed)
            .unwrap_or(false),
    );
    record.status = doc.status;

    for event in &doc.events {
        let Some(date) = event.event_date.as_deref().and_then(normalize_timestamp) else {
            continue;
        };
        match event.event_action.to_ascii_lowercase().as_str() {
            "registration" => record.created = Some(date),
            "last changed" | "last update of rdap database" => record.updated = Some(date),
            "expiration" => record.expires = Some(date),
            _ => {}
        }
    }

    record.notices = doc.notices;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpReply;
    use async_trait::async_trait;
    use serde_json::json;
    use std::{collections::HashMap, sync::Mutex};

    struct MapFetcher {
        replies: HashMap<String, Result<HttpReply, ResolveError>>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpFetcher for MapFetcher {
        async fn get(&self, url: &str, _accept: &str, _timeout: Duration) -> Result<HttpReply, ResolveError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.replies
                .get(url)
                .cloned()
                .unwrap_or_else(|| Ok(HttpReply::new(500, "")))
        }
    }

    fn fetcher(replies: Vec<(&str, Result<HttpReply, ResolveError>)>) -> Arc<MapFetcher> {
        Arc::new(MapFetcher {
            replies: replies.into_iter().map(|(u, r)| (u.to_string(), r)).collect(),
            requested: Mutex::new(Vec::new()),
        })
    }

    fn domain_json() -> serde_json::Value {
        json!({
            "rdapConformance": ["rdap_level_0"],
            "objectClassName": "domain",
            "ldhName": "EXAMPLE.COM",
            "status": ["client delete prohibited", "client transfer prohibited"],
            "nameservers": [
                {"objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET"},
                {"objectClassName": "nameserver", "ldhName": "xn--bcher-kva.example", "unicodeName": "bücher.example"}
            ],
            "secureDNS": {"delegationSigned": true},
            "events": [
                {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2025-08-13T04:00:00Z"},
                {"eventAction": "last changed", "eventDate": "2023-08-14T07:01:38Z"},
                {"eventAction": "last update of RDAP database", "eventDate": "2024-01-01T00:00:00Z"}
            ],
            "entities": [
                {
                    "objectClassName": "entity",
                    "handle": "376",
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "RESERVED-IANA"]]]
                },
                {
                    "objectClassName": "entity",
                    "roles": ["registrant", "administrative"],
                    "vcardArray": ["vcard", [["fn", {}, "text", "Jane Doe"], ["email", {}, "text", "jane@example.com"]]]
                }
            ],
            "notices": [
                {"title": "Terms of Use", "description": ["Service subject to terms."], "links": [{"href": "https://example.com/terms"}]}
            ]
        })
    }

    fn test_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_domain_url() {
        assert_eq!(
            domain_url("https://rdap.verisign.com/com/v1/", "example.com").unwrap().as_str(),
            "https://rdap.verisign.com/com/v1/domain/example.com"
        );
        assert_eq!(
            domain_url("https://rdap.example", "example.com").unwrap().as_str(),
            "https://rdap.example/domain/example.com"
        );
        assert!(domain_url("not a url", "example.com").is_err());
    }

    #[test]
    fn test_normalize_domain_object() {
        let raw = domain_json();
        let answer = RdapAnswer {
            server: "https://rdap.test/".into(),
            domain: serde_json::from_value(raw.clone()).unwrap(),
            raw,
        };
        let record = normalize(answer, "example.com");

        assert_eq!(record.source, Source::Rdap);
        assert_eq!(record.registrar.as_deref(), Some("RESERVED-IANA"));
        assert_eq!(record.nameservers, vec!["a.iana-servers.net", "bücher.example"]);
        assert_eq!(record.dnssec, Some(true));
        assert_eq!(record.created.as_deref(), Some("1995-08-14T04:00:00Z"));
        assert_eq!(record.expires.as_deref(), Some("2025-08-13T04:00:00Z"));
        // Last matching event wins
        assert_eq!(record.updated.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(record.registrant.as_ref().unwrap().name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.admin, record.registrant);
        assert!(record.tech.is_none());
        assert_eq!(record.notices[0].title.as_deref(), Some("Terms of Use"));
        assert_eq!(record.status.len(), 2);
    }

    #[test]
    fn test_registrar_falls_back_to_handle_and_dnssec_defaults_false() {
        let raw = json!({
            "rdapConformance": ["rdap_level_0"],
            "objectClassName": "domain",
            "entities": [{"handle": "REG-42", "roles": ["registrar"]}]
        });
        let answer = RdapAnswer {
            server: "https://rdap.test/".into(),
            domain: serde_json::from_value(raw.clone()).unwrap(),
            raw,
        };
        let record = normalize(answer, "example.net");
        assert_eq!(record.registrar.as_deref(), Some("REG-42"));
        assert_eq!(record.dnssec, Some(false));
    }

    #[tokio::test]
    async fn test_next_server_after_failure() {
        let fetcher = fetcher(vec![
            (
                "https://rdap.primary.test/domain/example.com",
                Err(ResolveError::Timeout("https://rdap.primary.test".into())),
            ),
            (
                "https://rdap.secondary.test/domain/example.com",
                Ok(HttpReply::new(200, domain_json().to_string())),
            ),
        ]);
        let executor = RdapExecutor::new(&test_config(), fetcher.clone());
        let servers = vec![
            "https://rdap.primary.test/".to_string(),
            "https://rdap.secondary.test/".to_string(),
        ];

        let answer = executor.query(&servers, "example.com", &QueryScope::new()).await.unwrap();
        assert_eq!(answer.server, "https://rdap.secondary.test/");
        assert_eq!(fetcher.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_shape_is_skipped() {
        let fetcher = fetcher(vec![
            (
                "https://rdap.one.test/domain/example.com",
                Ok(HttpReply::new(200, json!({"objectClassName": "domain"}).to_string())),
            ),
            (
                "https://rdap.two.test/domain/example.com",
                Ok(HttpReply::new(200, "<html>oops</html>")),
            ),
        ]);
        let executor = RdapExecutor::new(&test_config(), fetcher);
        let servers = vec!["https://rdap.one.test/".to_string(), "https://rdap.two.test/".to_string()];

        let result = executor.query(&servers, "example.com", &QueryScope::new()).await;
        assert!(matches!(result, Err(ResolveError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_not_found_reported_when_no_server_answers() {
        let fetcher = fetcher(vec![
            ("https://rdap.one.test/domain/missing.com", Ok(HttpReply::new(404, ""))),
            ("https://rdap.two.test/domain/missing.com", Ok(HttpReply::new(503, ""))),
        ]);
        let executor = RdapExecutor::new(&test_config(), fetcher.clone());
        let servers = vec!["https://rdap.one.test/".to_string(), "https://rdap.two.test/".to_string()];

        let result = executor.query(&servers, "missing.com", &QueryScope::new()).await;
        assert_eq!(result.unwrap_err(), ResolveError::DomainNotFound("missing.com".into()));
        assert_eq!(fetcher.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_server_list() {
        let executor = RdapExecutor::new(&test_config(), fetcher(vec![]));
        let result = executor.query(&[], "example.com", &QueryScope::new()).await;
        assert!(matches!(result, Err(ResolveError::TldNotSupported(_))));
    }
}
