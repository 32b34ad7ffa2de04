//! Domain normalization, validation and TLD key extraction.
//!
//! Every lookup starts here: user input such as `HTTPS://WWW.Example.COM/` is
//! reduced to `example.com` and checked against the hostname label grammar
//! before anything touches the network.

use crate::errors::ResolveError;
use crate::tld_mappings::COMPOUND_SUFFIXES;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// Normalize and validate a domain name.
///
/// - lowercases and trims
/// - removes `http://` / `https://` and anything after the host (path, trailing slash)
/// - removes leading `www.` labels as long as a registrable name remains
/// - converts IDN labels to their ASCII (punycode) form
/// - validates the result against the label grammar
///
/// The output is a fixed point: normalizing it again yields the same string.
pub fn normalize_domain(input: &str) -> Result<String, ResolveError> {
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(ResolveError::InvalidDomain("Empty domain".to_string()));
    }

    let without_scheme = lowered
        .strip_prefix("http://")
        .or_else(|| lowered.strip_prefix("https://"))
        .unwrap_or(&lowered);

    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme)
        .trim_end_matches('.');

    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        if !rest.contains('.') {
            break;
        }
        host = rest;
    }

    let ascii = idna::domain_to_ascii(host)
        .map_err(|_| ResolveError::InvalidDomain(format!("Invalid IDN: {}", host)))?;

    if !is_valid_hostname(&ascii) {
        return Err(ResolveError::InvalidDomain(ascii));
    }

    Ok(ascii)
}

/// Checks the label grammar: at least two labels, each 1-63 chars of
/// `[a-z0-9-]` without a leading or trailing hyphen, 253 chars overall.
pub fn is_valid_hostname(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH || !domain.contains('.') {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

/// Best-effort conversion of a punycode name back to Unicode for display.
pub fn to_unicode(domain: &str) -> String {
    let (unicode, result) = idna::domain_to_unicode(domain);
    match result {
        Ok(()) => unicode,
        Err(_) => domain.to_string(),
    }
}

/// Registry key derived from a normalized domain.
///
/// `compound` holds a second-level public suffix such as `co.uk` when the
/// domain sits under one; lookups always try it before the single label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TldKey {
    pub compound: Option<String>,
    pub label: String,
}

impl TldKey {
    pub fn from_domain(domain: &str) -> Result<Self, ResolveError> {
        let labels: Vec<&str> = domain.split('.').collect();
        let label = match labels.last() {
            Some(label) if !label.is_empty() && labels.len() >= 2 => label.to_string(),
            _ => {
                return Err(ResolveError::InvalidDomain(format!(
                    "No TLD found in domain: {}",
                    domain
                )))
            }
        };

        let compound = if labels.len() >= 3 {
            let last_two = labels[labels.len() - 2..].join(".");
            COMPOUND_SUFFIXES
                .contains(last_two.as_str())
                .then_some(last_two)
        } else {
            None
        };

        Ok(Self { compound, label })
    }

    /// Candidate keys, most specific first.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.compound.as_deref().into_iter().chain(std::iter::once(self.label.as_str()))
    }

    /// The most specific key, used for logging and metrics labels.
    pub fn primary(&self) -> &str {
        self.compound.as_deref().unwrap_or(&self.label)
    }
}

impl std::fmt::Display for TldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.primary())
    }
}
