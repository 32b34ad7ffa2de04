//! Fake network seams shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use domain_resolver::{
    cache::ManualClock,
    config::DEFAULT_BOOTSTRAP_URL,
    errors::ResolveError,
    http::{HttpFetcher, HttpReply},
    whois::WhoisTransport,
    Config, Resolver,
};
use serde_json::json;
use std::{collections::HashMap, sync::Arc, sync::Mutex, time::Duration};

pub const VERISIGN_RDAP: &str = "https://rdap.verisign.com/com/v1/";
pub const IANA_RDAP: &str = "https://rdap.iana.org/";

pub fn bootstrap_json() -> String {
    json!({
        "version": "1.0",
        "publication": "2025-01-01T00:00:00Z",
        "description": "RDAP bootstrap file for Domain Name System registrations",
        "services": [
            [["com", "net"], [VERISIGN_RDAP, IANA_RDAP]],
            [["nz"], ["https://rdap.example-nz.test/"]],
            [["uk"], ["https://rdap.nominet.uk/uk/"]]
        ]
    })
    .to_string()
}

pub fn rdap_domain_json(domain: &str) -> String {
    json!({
        "rdapConformance": ["rdap_level_0"],
        "objectClassName": "domain",
        "ldhName": domain.to_uppercase(),
        "status": ["client transfer prohibited"],
        "nameservers": [
            {"objectClassName": "nameserver", "ldhName": "A.IANA-SERVERS.NET"},
            {"objectClassName": "nameserver", "ldhName": "B.IANA-SERVERS.NET"}
        ],
        "secureDNS": {"delegationSigned": true},
        "events": [
            {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
            {"eventAction": "expiration", "eventDate": "2035-08-13T04:00:00Z"},
            {"eventAction": "last changed", "eventDate": "2024-08-14T07:01:34Z"}
        ],
        "entities": [{
            "objectClassName": "entity",
            "handle": "376",
            "roles": ["registrar"],
            "vcardArray": ["vcard", [
                ["version", {}, "text", "4.0"],
                ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]
            ]]
        }]
    })
    .to_string()
}

pub fn rdap_url(server: &str, domain: &str) -> String {
    format!("{}domain/{}", server, domain)
}

enum Rule {
    Reply(HttpReply),
    Fail(ResolveError),
    Hang,
}

/// URL-keyed HTTP fake. Unknown URLs answer 500.
#[derive(Default)]
pub struct FakeFetcher {
    rules: Mutex<HashMap<String, Rule>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fetcher that serves the standard bootstrap registry.
    pub fn with_bootstrap() -> Arc<Self> {
        let fetcher = Self::new();
        fetcher.reply(DEFAULT_BOOTSTRAP_URL, 200, &bootstrap_json());
        fetcher
    }

    pub fn reply(&self, url: &str, status: u16, body: &str) {
        self.rules
            .lock()
            .unwrap()
            .insert(url.to_string(), Rule::Reply(HttpReply::new(status, body)));
    }

    pub fn fail(&self, url: &str, error: ResolveError) {
        self.rules.lock().unwrap().insert(url.to_string(), Rule::Fail(error));
    }

    pub fn hang(&self, url: &str) {
        self.rules.lock().unwrap().insert(url.to_string(), Rule::Hang);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.as_str() == url).count()
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn get(&self, url: &str, _accept: &str, _timeout: Duration) -> Result<HttpReply, ResolveError> {
        self.requests.lock().unwrap().push(url.to_string());

        let outcome = match self.rules.lock().unwrap().get(url) {
            Some(Rule::Reply(reply)) => Some(Ok(reply.clone())),
            Some(Rule::Fail(error)) => Some(Err(error.clone())),
            Some(Rule::Hang) => None,
            None => Some(Ok(HttpReply::new(500, "no rule"))),
        };

        match outcome {
            Some(result) => {
                // Yield so concurrent callers interleave
                tokio::task::yield_now().await;
                result
            }
            None => {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Err(ResolveError::Timeout(url.to_string()))
            }
        }
    }
}

/// WHOIS fake keyed by `host|query`, falling back to `host`.
/// Unknown hosts behave like a server that closes without sending anything.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<HashMap<String, Result<String, ResolveError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, key: &str, text: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(key.to_string(), Ok(text.to_string()));
    }

    pub fn fail(&self, key: &str, error: ResolveError) {
        self.replies.lock().unwrap().insert(key.to_string(), Err(error));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, host: &str) -> usize {
        self.calls().iter().filter(|(h, _)| h == host).count()
    }
}

#[async_trait]
impl WhoisTransport for FakeTransport {
    async fn query(&self, host: &str, query: &str, _timeout: Duration) -> Result<String, ResolveError> {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), query.to_string()));

        let replies = self.replies.lock().unwrap();
        replies
            .get(&format!("{}|{}", host, query))
            .or_else(|| replies.get(host))
            .cloned()
            .unwrap_or_else(|| Err(ResolveError::EmptyResponse(host.to_string())))
    }
}

/// Defaults with the syntax retry pause removed.
pub fn test_config() -> Config {
    Config {
        syntax_retry_delay_ms: 0,
        ..Config::default()
    }
}

pub struct Harness {
    pub resolver: Arc<Resolver>,
    pub fetcher: Arc<FakeFetcher>,
    pub transport: Arc<FakeTransport>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(fetcher: Arc<FakeFetcher>, transport: Arc<FakeTransport>) -> Self {
        Self::with_config(test_config(), fetcher, transport)
    }

    pub fn with_config(config: Config, fetcher: Arc<FakeFetcher>, transport: Arc<FakeTransport>) -> Self {
        let clock = Arc::new(ManualClock::new());
        let resolver = Arc::new(Resolver::with_components(
            Arc::new(config),
            fetcher.clone(),
            transport.clone(),
            clock.clone(),
        ));
        Self {
            resolver,
            fetcher,
            transport,
            clock,
        }
    }
}

pub const VERISIGN_WHOIS_TEXT: &str = "   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2035-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   DNSSEC: signedDelegation
>>> Last update of whois database: 2025-01-01T00:00:00Z <<<
";
