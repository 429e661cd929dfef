//! Result shaping — one engine record into the open mapping returned to callers

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde_json::{Map, Value};
use tracing::trace;

use crate::asn::{AsnAdapter, AsnResult};
use crate::engine::{HeaderValues, RawProbeResult};
use crate::profile::ScanMode;

pub const BODY_PREVIEW_BYTES: usize = 160;

/// Normalised record for one target
pub type ShapedResult = Map<String, Value>;

pub struct ResultShaper {
    mode: ScanMode,
    asn: AsnAdapter,
}

impl ResultShaper {
    pub fn new(mode: ScanMode, asn: AsnAdapter) -> Self {
        Self { mode, asn }
    }

    /// Shape a record. Never fails; missing pieces are left out.
    pub async fn shape(&self, raw: RawProbeResult) -> ShapedResult {
        let mut shaped = match serde_json::to_value(&raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        if let Some(asn) = self.asn_fallback(&raw).await {
            if let Ok(value) = serde_json::to_value(asn) {
                shaped.insert("asn".to_string(), value);
            }
        }

        if self.mode == ScanMode::Full {
            if let Some(headers) = &raw.headers {
                if let Ok(value) = serde_json::to_value(flatten_headers(headers)) {
                    shaped.insert("headers".to_string(), value);
                }
            }
            if let Some(preview) = body_preview(&raw.raw) {
                shaped.insert("body_preview".to_string(), Value::String(preview));
            }
        }

        shaped
    }

    /// ASN record for the first resolved address, only when the engine gave none
    async fn asn_fallback(&self, raw: &RawProbeResult) -> Option<AsnResult> {
        if raw.asn.is_some() {
            return None;
        }
        let first = raw.a.first()?;
        let Ok(ip) = first.parse::<IpAddr>() else {
            trace!("first address {first} of {} is not an IP", raw.input);
            return None;
        };
        self.asn.enrich(ip).await
    }
}

/// Join each header's values with ", ", keyed by canonical header name
pub fn flatten_headers(headers: &HeaderValues) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, values) in headers {
        let joined = values.join(", ");
        flat.entry(canonical_header_name(name))
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&joined);
            })
            .or_insert(joined);
    }
    flat
}

/// `content-type` -> `Content-Type`: first letter and each letter after a
/// hyphen upper case, the rest lower case
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Up to [`BODY_PREVIEW_BYTES`] of the body following the first blank line
pub fn body_preview(raw: &str) -> Option<String> {
    let (_, body) = raw.split_once("\r\n\r\n")?;
    let mut end = body.len().min(BODY_PREVIEW_BYTES);
    // Back off to a char boundary so the preview never exceeds the limit
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    Some(body[..end].to_string())
}
