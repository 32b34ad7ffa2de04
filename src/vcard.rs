//! jCard (RFC 7095) decoding for RDAP entities.
//!
//! A `vcardArray` is `["vcard", [[name, params, type, value...], ...]]` with
//! loosely typed values. It is decoded in one pass into [`VCardProperty`];
//! properties we do not use are skipped.

use crate::record::Contact;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VCardProperty {
    Fn(String),
    Org(String),
    Email(String),
    Tel(String),
    Adr(Vec<String>),
    CountryName(String),
}

impl VCardProperty {
    pub fn decode_all(vcard_array: &Value) -> Vec<VCardProperty> {
        let Some(parts) = vcard_array.as_array() else {
            return Vec::new();
        };

        parts
            .iter()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Self::decode)
            .collect()
    }

    fn decode(property: &Value) -> Option<VCardProperty> {
        let items = property.as_array()?;
        if items.len() < 4 {
            return None;
        }
        let name = items[0].as_str()?.to_ascii_lowercase();
        let params = &items[1];
        let value = &items[3];

        let decoded = match name.as_str() {
            "fn" => VCardProperty::Fn(text_value(value)?),
            "org" => VCardProperty::Org(text_value(value)?),
            "email" => VCardProperty::Email(text_value(value)?),
            "tel" => {
                let tel = text_value(value)?;
                VCardProperty::Tel(tel.strip_prefix("tel:").unwrap_or(&tel).to_string())
            }
            "adr" => {
                let mut lines = Vec::new();
                collect_strings(value, &mut lines);
                if lines.is_empty() {
                    // Unstructured form: components empty, text in the label parameter
                    if let Some(label) = params.get("label").and_then(Value::as_str) {
                        lines = label
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect();
                    }
                }
                if lines.is_empty() {
                    return None;
                }
                VCardProperty::Adr(lines)
            }
            "country-name" => VCardProperty::CountryName(text_value(value)?),
            _ => return None,
        };
        Some(decoded)
    }
}

fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(_) => {
            let mut parts = Vec::new();
            collect_strings(value, &mut parts);
            parts.join(", ")
        }
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

/// Formatted name (`fn`) of an entity.
pub fn formatted_name(vcard_array: &Value) -> Option<String> {
    VCardProperty::decode_all(vcard_array)
        .into_iter()
        .find_map(|property| match property {
            VCardProperty::Fn(name) => Some(name),
            _ => None,
        })
}

/// Contact fields of an entity. The first value of each property wins; the
/// country falls back to the last address component.
pub fn contact_from_vcard(vcard_array: &Value) -> Contact {
    let mut contact = Contact::default();

    for property in VCardProperty::decode_all(vcard_array) {
        match property {
            VCardProperty::Fn(v) => {
                contact.name.get_or_insert(v);
            }
            VCardProperty::Org(v) => {
                contact.organization.get_or_insert(v);
            }
            VCardProperty::Email(v) => {
                contact.email.get_or_insert(v);
            }
            VCardProperty::Tel(v) => {
                contact.phone.get_or_insert(v);
            }
            VCardProperty::Adr(lines) => {
                if contact.address.is_empty() {
                    contact.address = lines;
                }
            }
            VCardProperty::CountryName(v) => contact.country = Some(v),
        }
    }

    if contact.country.is_none() {
        contact.country = contact.address.last().cloned();
    }
    contact
}
