//! ASN lookups — resolver boundary, query classification and result mapping

pub mod api;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::AsnError;

/// What an ASN query is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsnQuery {
    Ip(IpAddr),
    Asn(u32),
    Domain(String),
    Org(String),
}

impl AsnQuery {
    /// Classify free-form input: IP literal, `AS123`/`123`, dotted name, or organisation
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(ip) = input.parse::<IpAddr>() {
            return AsnQuery::Ip(ip);
        }
        let digits = input
            .strip_prefix("AS")
            .or_else(|| input.strip_prefix("as"))
            .unwrap_or(input);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(number) = digits.parse() {
                return AsnQuery::Asn(number);
            }
        }
        if input.contains('.') {
            AsnQuery::Domain(input.to_string())
        } else {
            AsnQuery::Org(input.to_string())
        }
    }
}

impl fmt::Display for AsnQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsnQuery::Ip(ip) => write!(f, "{ip}"),
            AsnQuery::Asn(n) => write!(f, "AS{n}"),
            AsnQuery::Domain(d) => f.write_str(d),
            AsnQuery::Org(o) => f.write_str(o),
        }
    }
}

/// One row as the resolver backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AsnRow {
    pub first_ip: String,
    pub last_ip: String,
    #[serde(default)]
    pub input: String,
    pub as_number: u32,
    #[serde(default)]
    pub as_country: String,
    #[serde(default)]
    pub as_name: String,
}

/// ASN ownership record handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsnResult {
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub as_number: String,
    pub as_name: String,
    pub as_country: String,
    pub as_range: Vec<String>,
}

/// Creates resolver clients
pub trait AsnResolver: Send + Sync {
    fn new_client(&self) -> Result<Box<dyn AsnClient>, AsnError>;
}

#[async_trait]
pub trait AsnClient: Send + Sync {
    /// Resolve a domain to its addresses
    async fn resolve_domain(&self, name: &str) -> Result<Vec<IpAddr>, AsnError>;

    /// Fetch the raw rows for an IP, ASN or organisation query
    async fn get_data(&self, query: &AsnQuery) -> Result<Vec<AsnRow>, AsnError>;
}

/// Turn raw rows into results, one per row, keeping the resolver's order
pub fn map_to_results(rows: Vec<AsnRow>) -> Result<Vec<AsnResult>, AsnError> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let first: IpAddr = row
                .first_ip
                .parse()
                .map_err(|_| AsnError::Lookup(format!("bad first_ip {}", row.first_ip)))?;
            let last: IpAddr = row
                .last_ip
                .parse()
                .map_err(|_| AsnError::Lookup(format!("bad last_ip {}", row.last_ip)))?;
            Ok(AsnResult {
                timestamp: now,
                input: row.input,
                as_number: format!("AS{}", row.as_number),
                as_name: row.as_name,
                as_country: row.as_country,
                as_range: range_to_cidrs(first, last)?,
            })
        })
        .collect()
}

/// Smallest list of CIDR blocks covering `first..=last`
pub fn range_to_cidrs(first: IpAddr, last: IpAddr) -> Result<Vec<String>, AsnError> {
    let (start, end, bits) = match (first, last) {
        (IpAddr::V4(a), IpAddr::V4(b)) => (u32::from(a) as u128, u32::from(b) as u128, 32u32),
        (IpAddr::V6(a), IpAddr::V6(b)) => (u128::from(a), u128::from(b), 128u32),
        _ => {
            return Err(AsnError::Lookup(format!(
                "range mixes address families: {first} - {last}"
            )))
        }
    };
    if start > end {
        return Err(AsnError::Lookup(format!("inverted range: {first} - {last}")));
    }

    let mut cidrs = Vec::new();
    let mut current = start;
    loop {
        // Largest block aligned at `current` that stays within `end`
        let mut size = if current == 0 { bits } else { current.trailing_zeros().min(bits) };
        while size > 0 && block_end(current, size) > end {
            size -= 1;
        }
        let prefix = bits - size;
        let addr = if bits == 32 {
            IpAddr::from(std::net::Ipv4Addr::from(current as u32))
        } else {
            IpAddr::from(std::net::Ipv6Addr::from(current))
        };
        cidrs.push(format!("{addr}/{prefix}"));

        let block_last = block_end(current, size);
        if block_last >= end {
            break;
        }
        current = block_last + 1;
    }
    Ok(cidrs)
}

/// Last address of the block of `size` host bits starting at `start`
fn block_end(start: u128, size: u32) -> u128 {
    // ::/0 has 128 host bits, which the shift cannot express
    if size >= 128 {
        u128::MAX
    } else {
        start + ((1u128 << size) - 1)
    }
}

/// Direct ASN lookups and best-effort enrichment over one resolver
#[derive(Clone)]
pub struct AsnAdapter {
    resolver: Arc<dyn AsnResolver>,
}

impl AsnAdapter {
    pub fn new(resolver: Arc<dyn AsnResolver>) -> Self {
        Self { resolver }
    }

    /// Look up ownership for an IP, ASN, domain or organisation.
    /// Domains resolve to their first address; every failure is returned.
    pub async fn lookup(&self, input: &str) -> Result<Vec<AsnResult>, AsnError> {
        let client = self.resolver.new_client()?;

        let query = match AsnQuery::parse(input) {
            AsnQuery::Domain(name) => {
                let addresses = client.resolve_domain(&name).await?;
                let first = addresses
                    .first()
                    .copied()
                    .ok_or_else(|| AsnError::Resolution(name.clone()))?;
                debug!("resolved {name} to {first}");
                AsnQuery::Ip(first)
            }
            other => other,
        };

        info!("ASN lookup for {query}");
        let rows = client.get_data(&query).await?;
        map_to_results(rows)
    }

    /// First ASN record for an address, or `None` on any failure
    pub async fn enrich(&self, ip: IpAddr) -> Option<AsnResult> {
        let client = match self.resolver.new_client() {
            Ok(client) => client,
            Err(e) => {
                trace!("ASN fallback skipped for {ip}: {e}");
                return None;
            }
        };
        let rows = match client.get_data(&AsnQuery::Ip(ip)).await {
            Ok(rows) => rows,
            Err(e) => {
                trace!("ASN fallback for {ip} failed: {e}");
                return None;
            }
        };
        match map_to_results(rows) {
            Ok(results) => results.into_iter().next(),
            Err(e) => {
                trace!("ASN fallback for {ip} unmappable: {e}");
                None
            }
        }
    }
}
