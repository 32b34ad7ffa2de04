use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Generic last-resort WHOIS host.
pub const DEFAULT_WHOIS_HOST: &str = "whois.iana.org";

/// Second-level public suffixes that behave like TLDs for registry purposes.
pub static COMPOUND_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "co.uk", "org.uk", "me.uk", "gov.uk", "ac.uk",
        "co.jp", "co.kr", "co.in", "co.za",
        "com.au", "net.au", "edu.au",
        "com.br", "com.cn", "com.mx", "com.tw",
        "co.nz", "org.nz", "net.nz", "govt.nz", "mil.nz", "iwi.nz",
    ])
});

/// TLDs whose registries publish RDAP outside the IANA bootstrap directory.
/// These bypass the bootstrap registry entirely.
pub static RDAP_OVERRIDES: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let nz = vec!["https://client.rdap.org/"];
    HashMap::from([
        ("nz", nz.clone()),
        ("co.nz", nz.clone()),
        ("org.nz", nz.clone()),
        ("net.nz", nz.clone()),
        ("govt.nz", nz.clone()),
        ("mil.nz", nz.clone()),
        ("iwi.nz", nz),
    ])
});

/// TLDs known to lack a usable RDAP service. Lookups go straight to WHOIS.
pub static NON_RDAP_TLDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "tk", "ml", "ga", "cf", "ws", "nu",
        "co.uk", "org.uk", "me.uk",
        "edu", "gov", "mil", "int", "arpa",
    ])
});

/// Registries whose WHOIS host must not be taken from IANA discovery, either
/// because the referral is wrong for domain queries or because the service
/// needs a registry-specific query syntax.
pub static WHOIS_OVERRIDES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("uk", "whois.nic.uk"),
        ("co.uk", "whois.nic.uk"),
        ("org.uk", "whois.nic.uk"),
        ("me.uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("jp", "whois.jprs.jp"),
        ("co.jp", "whois.jprs.jp"),
        ("nz", "whois.srs.net.nz"),
        ("co.nz", "whois.srs.net.nz"),
        ("au", "whois.auda.org.au"),
        ("com.au", "whois.auda.org.au"),
        ("edu", "whois.educause.edu"),
        ("gov", "whois.dotgov.gov"),
        ("int", "whois.iana.org"),
        ("arpa", "whois.iana.org"),
    ])
});

/// Well-known registry hosts used when IANA discovery fails.
pub static FALLBACK_WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Generic TLDs
    map.insert("com", "whois.verisign-grs.com");
    map.insert("net", "whois.verisign-grs.com");
    map.insert("org", "whois.publicinterestregistry.org");
    map.insert("info", "whois.afilias.net");
    map.insert("biz", "whois.nic.biz");
    map.insert("name", "whois.nic.name");
    map.insert("mobi", "whois.afilias.net");
    map.insert("pro", "whois.registrypro.pro");
    map.insert("cc", "ccwhois.verisign-grs.com");
    map.insert("tv", "whois.nic.tv");

    // Popular new gTLDs
    map.insert("xyz", "whois.nic.xyz");
    map.insert("top", "whois.nic.top");
    map.insert("shop", "whois.nic.shop");
    map.insert("online", "whois.nic.online");
    map.insert("site", "whois.nic.site");
    map.insert("app", "whois.nic.google");
    map.insert("dev", "whois.nic.google");
    map.insert("io", "whois.nic.io");
    map.insert("ai", "whois.nic.ai");
    map.insert("co", "whois.nic.co");
    map.insert("me", "whois.nic.me");

    // Country code TLDs
    map.insert("fr", "whois.nic.fr");
    map.insert("it", "whois.nic.it");
    map.insert("nl", "whois.domain-registry.nl");
    map.insert("be", "whois.dns.be");
    map.insert("ch", "whois.nic.ch");
    map.insert("at", "whois.nic.at");
    map.insert("se", "whois.iis.se");
    map.insert("nu", "whois.iis.nu");
    map.insert("no", "whois.norid.no");
    map.insert("dk", "whois.punktum.dk");
    map.insert("pl", "whois.dns.pl");
    map.insert("cz", "whois.nic.cz");
    map.insert("ca", "whois.cira.ca");
    map.insert("us", "whois.nic.us");
    map.insert("br", "whois.registro.br");
    map.insert("cn", "whois.cnnic.cn");
    map.insert("kr", "whois.kr");
    map.insert("in", "whois.registry.in");
    map.insert("ru", "whois.tcinet.ru");
    map.insert("ws", "whois.website.ws");
    map.insert("tk", "whois.dot.tk");

    map
});

/// TLDs whose registries throttle or block automated port-43 access.
/// Empty answers from them come with a pointer to the registry's web lookup.
pub static RESTRICTED_TLDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("nz", "https://whois.srs.net.nz"),
        ("au", "https://whois.auda.org.au"),
        ("uk", "https://whois.nic.uk"),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_tlds_skip_rdap() {
        for tld in ["edu", "gov", "mil", "int", "arpa", "co.uk"] {
            assert!(NON_RDAP_TLDS.contains(tld), "{} should be WHOIS-only", tld);
        }
        assert!(!NON_RDAP_TLDS.contains("com"));
    }

    #[test]
    fn test_override_tables_use_known_keys() {
        for key in RDAP_OVERRIDES.keys().chain(WHOIS_OVERRIDES.keys()) {
            assert!(
                !key.contains('.') || COMPOUND_SUFFIXES.contains(key),
                "{} is a compound key missing from COMPOUND_SUFFIXES",
                key
            );
        }
    }

    #[test]
    fn test_restricted_tlds_have_https_urls() {
        for url in RESTRICTED_TLDS.values() {
            assert!(url.starts_with("https://"));
        }
    }
}
