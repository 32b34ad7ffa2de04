//! Heuristic WHOIS text normalizer.
//!
//! Registries share no response grammar, so fields are found by lowercase
//! substring matching on the part of each line before its first colon. Lines
//! nobody recognizes are ignored: odd wording leaves fields empty, it never
//! produces an error.

use crate::record::{format_timestamp, Contact, NormalizedRecord, RawPayload, Source};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// JPRS style: "a. [Domain Name]   EXAMPLE.JP" or "[Name Server]   ns1.example.jp"
static BRACKET_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-z]\.\s*)?\[([^\]]+)\]\s*(.*)$").expect("Invalid bracket field regex")
});

#[derive(Debug, Clone, Copy)]
enum ContactRole {
    Registrant = 0,
    Admin = 1,
    Tech = 2,
    Billing = 3,
}

impl ContactRole {
    fn from_key(key: &str) -> Option<Self> {
        if key.starts_with("registrant") {
            Some(ContactRole::Registrant)
        } else if key.starts_with("admin") {
            Some(ContactRole::Admin)
        } else if key.starts_with("tech") {
            Some(ContactRole::Tech)
        } else if key.starts_with("billing") {
            Some(ContactRole::Billing)
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct WhoisParser;

impl WhoisParser {
    pub fn new() -> Self {
        Self
    }

    /// Builds a record from a cleaned WHOIS response. Ages are not filled in.
    pub fn parse(&self, domain: &str, server: &str, text: &str) -> NormalizedRecord {
        let mut record = NormalizedRecord::new(
            domain,
            Source::Whois,
            server,
            RawPayload::Text(text.to_string()),
        );
        let mut contacts: [Contact; 4] = Default::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('%')
                || line.starts_with('#')
                || line.starts_with(">>>")
            {
                continue;
            }

            let Some((key, value)) = split_field(line) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            match key.as_str() {
                k if k.contains("name server") || k.contains("nameserver") || k == "nserver" => {
                    let host = value
                        .split_whitespace()
                        .next()
                        .unwrap_or(value)
                        .trim_end_matches('.')
                        .to_lowercase();
                    if !record.nameservers.contains(&host) {
                        record.nameservers.push(host);
                    }
                }

                // Before registrar and creation: catches "Registrar Registration Expiration Date"
                k if k.contains("expir") => set_date(&mut record.expires, value),

                k if k.contains("creation")
                    || k.contains("created")
                    || k.contains("registration date")
                    || k == "registered" =>
                {
                    set_date(&mut record.created, value)
                }

                k if k.contains("updated") || k.contains("modified") || k == "changed" => {
                    set_date(&mut record.updated, value)
                }

                k if k.contains("status") || k == "state" => {
                    // ICANN style appends an explanatory URL
                    let status = value.split(" http").next().unwrap_or(value).trim().to_string();
                    if !status.is_empty() && !record.status.contains(&status) {
                        record.status.push(status);
                    }
                }

                k => {
                    if let Some(role) = ContactRole::from_key(k) {
                        apply_contact_field(&mut contacts[role as usize], k, value);
                    } else if is_registrar_key(k) && record.registrar.is_none() {
                        record.registrar = Some(value.to_string());
                    }
                }
            }
        }

        let [registrant, admin, tech, billing] = contacts;
        record.registrant = Some(registrant).filter(|c| !c.is_empty());
        record.admin = Some(admin).filter(|c| !c.is_empty());
        record.tech = Some(tech).filter(|c| !c.is_empty());
        record.billing = Some(billing).filter(|c| !c.is_empty());
        record
    }
}

fn is_registrar_key(key: &str) -> bool {
    key.contains("registrar")
        && !key.contains("whois")
        && !key.contains("url")
        && !key.contains("abuse")
        && !key.contains("iana")
        && !key.contains("registration")
}

fn split_field(line: &str) -> Option<(String, &str)> {
    // Bracketed keys first: their values may contain colons (times)
    if let Some(caps) = BRACKET_FIELD.captures(line) {
        let key = caps.get(1)?.as_str().trim().to_lowercase();
        let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        return Some((key, value));
    }

    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_lowercase(), value.trim()))
}

fn set_date(slot: &mut Option<String>, value: &str) {
    if slot.is_some() {
        return;
    }
    match parse_date(value) {
        Some(dt) => *slot = Some(format_timestamp(dt)),
        None => debug!("Dropping unparseable date: {}", value),
    }
}

fn apply_contact_field(contact: &mut Contact, key: &str, value: &str) {
    let lowered = value.to_lowercase();
    if lowered.contains("select request") || lowered.contains("redacted for privacy") {
        return;
    }

    let slot = if key.contains("email") {
        &mut contact.email
    } else if key.contains("fax") {
        return;
    } else if key.contains("phone") {
        if key.contains("ext") {
            return;
        }
        &mut contact.phone
    } else if key.contains("org") {
        &mut contact.organization
    } else if key.contains("country") {
        &mut contact.country
    } else if key.contains("street")
        || key.contains("city")
        || key.contains("province")
        || key.contains("postal")
        || key.contains("address")
    {
        contact.address.push(value.to_string());
        return;
    } else if key.contains("name") || !key.contains(' ') {
        // A bare "Registrant:" line carries the holder's name
        &mut contact.name
    } else {
        return;
    };

    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

/// Parses the date formats commonly found in registry responses.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let mut date_str = date_str.trim();
    if let Some(idx) = date_str.find(" (") {
        date_str = date_str[..idx].trim_end();
    }
    for suffix in [" UTC", " GMT", " Z"] {
        if let Some(stripped) = date_str.strip_suffix(suffix) {
            date_str = stripped.trim_end();
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }

    let offset_formats = [
        "%Y-%m-%dT%H:%M:%S%z",   // 2025-05-18T13:36:06+0000
        "%Y-%m-%d %H:%M:%S%z",   // 2025-05-18 13:36:06+0000
        "%Y-%m-%d %H:%M:%S %z",  // 2025-05-18 13:36:06 +0000
    ];
    for format in &offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(date_str, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ", // 2025-05-18T13:36:06.0Z
        "%Y-%m-%dT%H:%M:%S%.f",  // 2025-05-18T13:36:06
        "%Y-%m-%d %H:%M:%S%.f",  // 2025-05-18 13:36:06
        "%Y/%m/%d %H:%M:%S",     // 2025/05/18 13:36:06
        "%Y.%m.%d %H:%M:%S",     // 2025.05.18 13:36:06
        "%d.%m.%Y %H:%M:%S",     // 18.05.2025 13:36:06
    ];
    for format in &datetime_formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
        }
    }

    let date_only_formats = [
        "%Y-%m-%d", // 2025-05-18
        "%d-%b-%Y", // 18-May-2025
        "%d %b %Y", // 18 May 2025
        "%Y/%m/%d", // 2025/05/18
        "%Y.%m.%d", // 2025.05.18
        "%m/%d/%Y", // 05/18/2025
        "%d.%m.%Y", // 18.05.2025
        "%Y%m%d",   // 20250518
    ];
    for format in &date_only_formats {
        if let Ok(naive_date) = NaiveDate::parse_from_str(date_str, format) {
            if let Some(naive_dt) = naive_date.and_hms_opt(0, 0, 0) {
                return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }
    }

    debug!("Failed to parse date: {}", date_str);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN_SAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Registrar URL: http://res-dom.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Registrar IANA ID: 376
   Registrar Abuse Contact Email:
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
   Name Server: a.iana-servers.net
   DNSSEC: signedDelegation
>>> Last update of whois database: 2025-01-01T00:00:00Z <<<
";

    #[test]
    fn test_parse_verisign_response() {
        let record = WhoisParser::new().parse("example.com", "whois.verisign-grs.com", VERISIGN_SAMPLE);

        assert_eq!(record.source, Source::Whois);
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(record.created.as_deref(), Some("1995-08-14T04:00:00Z"));
        assert_eq!(record.updated.as_deref(), Some("2024-08-14T07:01:34Z"));
        assert_eq!(record.expires.as_deref(), Some("2025-08-13T04:00:00Z"));
        assert_eq!(record.nameservers, vec!["a.iana-servers.net", "b.iana-servers.net"]);
        assert_eq!(
            record.status,
            vec!["clientDeleteProhibited", "clientTransferProhibited"]
        );
        // DNSSEC is only reported from RDAP's secureDNS
        assert_eq!(record.dnssec, None);
        assert!(record.registrant.is_none());
    }

    #[test]
    fn test_parse_contacts_and_comments() {
        let text = "\
% This is a comment: ignore me
# Another: comment
Registrant Name: Jane Doe
Registrant Organization: Example Ltd
Registrant Street: 1 Main St
Registrant City: Springfield
Registrant Country: US
Registrant Phone: +1.5555550100
Registrant Phone Ext:
Registrant Fax: +1.5555550199
Registrant Email: jane@example.com
Admin Email: REDACTED FOR PRIVACY
Tech Email: tech@example.com
";
        let record = WhoisParser::new().parse("example.com", "whois.example", text);

        let registrant = record.registrant.unwrap();
        assert_eq!(registrant.name.as_deref(), Some("Jane Doe"));
        assert_eq!(registrant.organization.as_deref(), Some("Example Ltd"));
        assert_eq!(registrant.address, vec!["1 Main St", "Springfield"]);
        assert_eq!(registrant.country.as_deref(), Some("US"));
        assert_eq!(registrant.phone.as_deref(), Some("+1.5555550100"));
        assert_eq!(registrant.email.as_deref(), Some("jane@example.com"));
        assert!(record.admin.is_none());
        assert_eq!(record.tech.unwrap().email.as_deref(), Some("tech@example.com"));
    }

    #[test]
    fn test_parse_denic_style() {
        let text = "\
Domain: example.de
Nserver: ns1.example.net
Nserver: NS2.EXAMPLE.NET.
Status: connect
Changed: 2020-07-08T10:08:15+02:00
";
        let record = WhoisParser::new().parse("example.de", "whois.denic.de", text);
        assert_eq!(record.nameservers, vec!["ns1.example.net", "ns2.example.net"]);
        assert_eq!(record.status, vec!["connect"]);
        assert_eq!(record.updated.as_deref(), Some("2020-07-08T08:08:15Z"));
    }

    #[test]
    fn test_parse_jprs_bracket_fields() {
        let text = "\
[ JPRS database provides information on network administration. ]
a. [Domain Name]                EXAMPLE.JP
g. [Organization]               Example Co.
p. [Name Server]                ns1.example.jp
p. [Name Server]                ns2.example.jp
[Created on]                    2001/01/01
[Expires on]                    2026/01/31
[Last Updated]                  2025/02/01 01:05:08 (JST)
";
        let record = WhoisParser::new().parse("example.jp", "whois.jprs.jp", text);
        assert_eq!(record.nameservers, vec!["ns1.example.jp", "ns2.example.jp"]);
        assert_eq!(record.created.as_deref(), Some("2001-01-01T00:00:00Z"));
        assert_eq!(record.expires.as_deref(), Some("2026-01-31T00:00:00Z"));
        assert_eq!(record.updated.as_deref(), Some("2025-02-01T01:05:08Z"));
    }

    #[test]
    fn test_unknown_wording_yields_empty_record() {
        let record = WhoisParser::new().parse("example.xyz", "whois.example", "Hello there\nNothing: useful\n");
        assert!(record.registrar.is_none());
        assert!(record.nameservers.is_empty());
        assert!(record.created.is_none());
    }

    #[test]
    fn test_unparseable_dates_are_dropped() {
        let record = WhoisParser::new().parse(
            "example.com",
            "whois.example",
            "Creation Date: before Aug-1996\nCreation Date: 2001-02-03\n",
        );
        // First parseable value wins
        assert_eq!(record.created.as_deref(), Some("2001-02-03T00:00:00Z"));
    }

    #[test]
    fn test_parse_date_formats() {
        for input in [
            "2025-05-18T13:36:06Z",
            "2025-05-18T13:36:06.0Z",
            "2025-05-18 13:36:06",
            "2025-05-18 13:36:06 UTC",
            "2025-05-18",
            "18-May-2025",
            "18 May 2025",
            "2025/05/18",
            "18.05.2025",
        ] {
            let parsed = parse_date(input);
            assert!(parsed.is_some(), "failed to parse {:?}", input);
            assert_eq!(parsed.unwrap().format("%Y-%m-%d").to_string(), "2025-05-18");
        }
        assert!(parse_date("not a date").is_none());
    }
}
