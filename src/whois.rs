//! WHOIS over TCP port 43: transport, query-syntax fallback and referrals.

use crate::{
    cancel::QueryScope,
    config::Config,
    errors::ResolveError,
    parser::WhoisParser,
    record::NormalizedRecord,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{lookup_host, TcpStream},
    time::{timeout_at, Instant},
};
use tracing::{debug, info, warn};

static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

const NOT_FOUND_PHRASES: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
];

const REJECTION_PHRASES: &[&str] = &["invalid query", "bad request"];

/// Sends one query line to a WHOIS host and returns the decoded reply.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    async fn query(&self, host: &str, query: &str, timeout: Duration) -> Result<String, ResolveError>;
}

/// Plain TCP transport.
///
/// Writes `query\r\n`, half-closes the write side and reads until the peer
/// closes. If the timeout hits after some data arrived, the partial reply is
/// returned.
pub struct TcpWhoisTransport {
    port: u16,
    max_response_size: usize,
    read_buffer_size: usize,
}

impl TcpWhoisTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.whois_port,
            max_response_size: config.max_response_size,
            read_buffer_size: config.read_buffer_size,
        }
    }

    async fn resolve(&self, host: &str, deadline: Instant) -> Result<Vec<SocketAddr>, ResolveError> {
        let addrs: Vec<SocketAddr> = timeout_at(deadline, lookup_host((host, self.port)))
            .await
            .map_err(|_| ResolveError::Timeout(format!("resolving {}", host)))?
            .map_err(|e| ResolveError::DnsFailure(format!("{}: {}", host, e)))?
            .collect();

        if addrs.is_empty() {
            return Err(ResolveError::DnsFailure(host.to_string()));
        }
        Ok(addrs)
    }
}

#[async_trait]
impl WhoisTransport for TcpWhoisTransport {
    async fn query(&self, host: &str, query: &str, timeout: Duration) -> Result<String, ResolveError> {
        let deadline = Instant::now() + timeout;
        let addrs = self.resolve(host, deadline).await?;

        let mut stream = timeout_at(deadline, TcpStream::connect(&addrs[..]))
            .await
            .map_err(|_| ResolveError::Timeout(format!("connecting to {}", host)))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::ConnectionRefused => ResolveError::ConnectionRefused(host.to_string()),
                _ => ResolveError::ConnectionFailed(format!("{}: {}", host, e)),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let query_line = format!("{}\r\n", query);
        timeout_at(deadline, stream.write_all(query_line.as_bytes()))
            .await
            .map_err(|_| ResolveError::Timeout(format!("writing to {}", host)))?
            .map_err(|e| ResolveError::ConnectionFailed(format!("{}: {}", host, e)))?;

        // No length framing in WHOIS: signal end of query, then read to EOF
        if let Err(e) = stream.shutdown().await {
            debug!("Half-close to {} failed: {}", host, e);
        }

        let mut buffer = vec![0u8; self.read_buffer_size];
        let mut response = Vec::new();

        loop {
            match timeout_at(deadline, stream.read(&mut buffer)).await {
                Err(_) => {
                    if response.is_empty() {
                        return Err(ResolveError::Timeout(format!("reading from {}", host)));
                    }
                    warn!("Read from {} timed out, using {} partial bytes", host, response.len());
                    break;
                }
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buffer[..n]);
                    if response.len() > self.max_response_size {
                        return Err(ResolveError::Protocol(format!("response from {} too large", host)));
                    }
                }
                Ok(Err(e)) => {
                    if response.is_empty() {
                        return Err(ResolveError::ConnectionFailed(format!("{}: {}", host, e)));
                    }
                    debug!("Read from {} ended with error after data: {}", host, e);
                    break;
                }
            }
        }

        if response.is_empty() {
            return Err(ResolveError::EmptyResponse(host.to_string()));
        }

        Ok(decode_response(&response))
    }
}

/// UTF-8 when valid, Latin-1 otherwise. Older ccTLD registries still answer in ISO-8859-1.
pub fn decode_response(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Normalizes line endings, trims and collapses runs of blank lines.
pub fn clean_response(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    EXCESS_BLANK_LINES
        .replace_all(unified.trim(), "\n\n")
        .into_owned()
}

/// Query line forms accepted by different registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// `example.com`
    Bare,
    /// `domain example.com`
    DomainKeyword,
    /// `=example.com`
    ExactMatch,
    /// `-T dn,ace example.de`
    DenicAce,
    /// `example.jp/e`
    JprsEnglish,
}

impl QuerySyntax {
    pub fn format(&self, domain: &str) -> String {
        match self {
            QuerySyntax::Bare => domain.to_string(),
            QuerySyntax::DomainKeyword => format!("domain {}", domain),
            QuerySyntax::ExactMatch => format!("={}", domain),
            QuerySyntax::DenicAce => format!("-T dn,ace {}", domain),
            QuerySyntax::JprsEnglish => format!("{}/e", domain),
        }
    }

    /// Syntaxes to try against `host`, in order.
    pub fn for_host(host: &str) -> Vec<QuerySyntax> {
        let host = host.to_ascii_lowercase();
        if host.ends_with("verisign-grs.com") {
            vec![QuerySyntax::DomainKeyword, QuerySyntax::ExactMatch, QuerySyntax::Bare]
        } else if host == "whois.denic.de" {
            vec![QuerySyntax::DenicAce, QuerySyntax::Bare]
        } else if host == "whois.jprs.jp" {
            vec![QuerySyntax::JprsEnglish, QuerySyntax::Bare]
        } else {
            vec![QuerySyntax::Bare, QuerySyntax::ExactMatch, QuerySyntax::DomainKeyword]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Answer,
    NotFound,
    Rejected,
}

/// Decides whether a reply answers the query.
pub fn classify_response(text: &str) -> Verdict {
    let lower = text.to_lowercase();
    if NOT_FOUND_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        Verdict::NotFound
    } else if REJECTION_PHRASES.iter().any(|phrase| lower.contains(phrase))
        || (lower.len() < 50 && lower.contains("error"))
    {
        Verdict::Rejected
    } else {
        Verdict::Answer
    }
}

/// Referred registrar host from a thin-registry answer, if any.
pub fn extract_referral(text: &str) -> Option<String> {
    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if !((key.contains("whois") && key.contains("server")) || key == "refer") {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix("whois://")
            .or_else(|| value.strip_prefix("rwhois://"))
            .unwrap_or(value);
        let host = value
            .split(['/', ':', ' '])
            .next()
            .unwrap_or("")
            .trim_end_matches('.')
            .to_lowercase();
        if !host.is_empty() && host.contains('.') {
            return Some(host);
        }
    }
    None
}

/// A reply accepted by a WHOIS host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisAnswer {
    pub host: String,
    pub syntax: QuerySyntax,
    pub text: String,
}

pub struct WhoisExecutor {
    transport: Arc<dyn WhoisTransport>,
    timeout: Duration,
    retry_delay: Duration,
    max_referrals: usize,
    parser: WhoisParser,
}

impl WhoisExecutor {
    pub fn new(config: &Config, transport: Arc<dyn WhoisTransport>) -> Self {
        Self {
            transport,
            timeout: config.whois_timeout(),
            retry_delay: config.syntax_retry_delay(),
            max_referrals: config.max_referrals,
            parser: WhoisParser::new(),
        }
    }

    /// Queries `host`, follows registrar referrals and normalizes the reply.
    pub async fn lookup(&self, host: &str, domain: &str, scope: &QueryScope) -> Result<NormalizedRecord, ResolveError> {
        let answer = self.execute(host, domain, scope).await?;
        let answer = self.follow_referrals(answer, domain, scope).await?;
        Ok(self.parser.parse(domain, &answer.host, &answer.text))
    }

    /// Runs the syntax fallback for `host`.
    pub async fn execute(&self, host: &str, domain: &str, scope: &QueryScope) -> Result<WhoisAnswer, ResolveError> {
        self.execute_with(host, domain, &QuerySyntax::for_host(host), scope).await
    }

    /// Tries each syntax in turn until one is answered.
    ///
    /// Transport failures end the attempt for this host immediately. An empty
    /// or oversized reply moves on to the next syntax. If any syntax produced
    /// a no-match reply and none produced an answer, the result is
    /// `DomainNotFound`; otherwise it is the last reply error.
    pub async fn execute_with(
        &self,
        host: &str,
        domain: &str,
        syntaxes: &[QuerySyntax],
        scope: &QueryScope,
    ) -> Result<WhoisAnswer, ResolveError> {
        let mut saw_not_found = false;
        let mut last_error = None;

        for (attempt, syntax) in syntaxes.iter().enumerate() {
            if attempt > 0 {
                scope.sleep(self.retry_delay).await?;
            }

            let query = syntax.format(domain);
            debug!(host, ?syntax, "Sending WHOIS query");

            let text = match scope.guard(self.transport.query(host, &query, self.timeout)).await {
                Ok(raw) => clean_response(&raw),
                Err(e) if e.is_interruption() || e.is_transport() => return Err(e),
                Err(e) => {
                    debug!(host, ?syntax, "WHOIS reply unusable: {}", e);
                    last_error = Some(e);
                    continue;
                }
            };
            if text.is_empty() {
                debug!(host, ?syntax, "WHOIS reply was blank");
                last_error = Some(ResolveError::EmptyResponse(host.to_string()));
                continue;
            }

            match classify_response(&text) {
                Verdict::Answer => {
                    debug!(host, ?syntax, bytes = text.len(), "WHOIS query answered");
                    return Ok(WhoisAnswer {
                        host: host.to_string(),
                        syntax: *syntax,
                        text,
                    });
                }
                Verdict::NotFound => {
                    debug!(host, ?syntax, "WHOIS reported no match");
                    saw_not_found = true;
                }
                Verdict::Rejected => {
                    debug!(host, ?syntax, "WHOIS rejected query syntax");
                }
            }
        }

        if saw_not_found {
            return Err(ResolveError::DomainNotFound(domain.to_string()));
        }
        Err(last_error.unwrap_or_else(|| {
            ResolveError::Protocol(format!("{} rejected every query syntax for {}", host, domain))
        }))
    }

    async fn follow_referrals(
        &self,
        initial: WhoisAnswer,
        domain: &str,
        scope: &QueryScope,
    ) -> Result<WhoisAnswer, ResolveError> {
        let mut current = initial;
        let mut visited = vec![current.host.to_lowercase()];

        for _ in 0..self.max_referrals {
            let Some(referral) = extract_referral(&current.text) else {
                break;
            };
            if visited.contains(&referral) {
                break;
            }
            visited.push(referral.clone());

            debug!("Following referral from {} to {}", current.host, referral);
            match self.execute(&referral, domain, scope).await {
                Ok(answer) => {
                    info!("Referral to {} answered for {}", referral, domain);
                    current = answer;
                }
                Err(e) if e.is_interruption() => return Err(e),
                Err(e) => {
                    warn!("Failed to query referral server {}: {}", referral, e);
                    break;
                }
            }
        }

        Ok(current)
    }
}

/// Asks the IANA WHOIS service which host serves `tld`.
pub async fn discover_whois_host(
    transport: &dyn WhoisTransport,
    iana_host: &str,
    tld: &str,
    timeout: Duration,
) -> Result<Option<String>, ResolveError> {
    static WHOIS_LINE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?im)^\s*whois:[ \t]*(\S+)").expect("Invalid whois line regex"));
    static REFER_LINE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?im)^\s*refer:[ \t]*(\S+)").expect("Invalid refer line regex"));

    let response = match tokio::time::timeout(timeout, transport.query(iana_host, tld, timeout)).await {
        Ok(result) => result?,
        Err(elapsed) => return Err(elapsed.into()),
    };

    let host = WHOIS_LINE
        .captures(&response)
        .or_else(|| REFER_LINE.captures(&response))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_lowercase());

    Ok(host)
}
