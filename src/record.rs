//! The common record shape produced by both normalizers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Rdap,
    Whois,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Rdap => "rdap",
            Source::Whois => "whois",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        *self == Contact::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Registry notice or remark, passed through from RDAP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// The registry reply as received: parsed JSON for RDAP, cleaned text for WHOIS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub domain: String,
    pub source: Source,
    /// RDAP base URL or WHOIS host that produced the answer.
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<Contact>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnssec: Option<bool>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Days since creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_ago: Option<i64>,
    /// Days since last update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_ago: Option<i64>,
    /// Days until expiration (negative if expired)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
    pub raw: RawPayload,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub query_time_ms: u64,
}

impl NormalizedRecord {
    pub fn new(domain: impl Into<String>, source: Source, server: impl Into<String>, raw: RawPayload) -> Self {
        Self {
            domain: domain.into(),
            source,
            server: server.into(),
            registrar: None,
            registrant: None,
            admin: None,
            tech: None,
            billing: None,
            nameservers: Vec::new(),
            dnssec: None,
            status: Vec::new(),
            created: None,
            updated: None,
            expires: None,
            created_ago: None,
            updated_ago: None,
            expires_in: None,
            notices: Vec::new(),
            raw,
            cached: false,
            query_time_ms: 0,
        }
    }

    /// Fills `created_ago`, `updated_ago` and `expires_in` relative to `now`.
    pub fn compute_ages(&mut self, now: DateTime<Utc>) {
        let parse = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        self.created_ago = parse(&self.created).map(|dt| (now - dt).num_days());
        self.updated_ago = parse(&self.updated).map(|dt| (now - dt).num_days());
        self.expires_in = parse(&self.expires).map(|dt| (dt - now).num_days());
    }

    #[cfg(test)]
    pub(crate) fn test_fixture(domain: &str) -> Self {
        Self::new(domain, Source::Rdap, "https://rdap.test/", RawPayload::Text(String::new()))
    }
}

/// Canonical timestamp form used in records.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalizes a registry timestamp to RFC 3339, or drops it.
pub fn normalize_timestamp(value: &str) -> Option<String> {
    crate::parser::parse_date(value).map(format_timestamp)
}
