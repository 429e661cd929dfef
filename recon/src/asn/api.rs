//! asnmap API resolver

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{AsnClient, AsnQuery, AsnResolver, AsnRow};
use crate::config::AsnConfig;
use crate::error::AsnError;

const API_KEY_HEADER: &str = "X-PDCP-Key";

/// Resolver backed by the ProjectDiscovery asnmap HTTP API
pub struct ApiAsnResolver {
    config: AsnConfig,
}

impl ApiAsnResolver {
    pub fn new(config: AsnConfig) -> Self {
        Self { config }
    }
}

impl AsnResolver for ApiAsnResolver {
    fn new_client(&self) -> Result<Box<dyn AsnClient>, AsnError> {
        let api_key = std::env::var(&self.config.api_key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(AsnError::ResolverInit(format!(
                "{} is not set",
                self.config.api_key_env
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()
            .map_err(|e| AsnError::ResolverInit(format!("HTTP client: {e}")))?;

        Ok(Box::new(ApiAsnClient {
            http,
            api_url: self.config.api_url.clone(),
            api_key,
        }))
    }
}

struct ApiAsnClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Query-string pair for a lookup
fn query_param(query: &AsnQuery) -> (&'static str, String) {
    match query {
        AsnQuery::Ip(ip) => ("ip", ip.to_string()),
        AsnQuery::Asn(n) => ("asn", n.to_string()),
        // Domains are resolved before they get here; send them as orgs otherwise
        AsnQuery::Domain(name) | AsnQuery::Org(name) => ("org", name.clone()),
    }
}

#[async_trait]
impl AsnClient for ApiAsnClient {
    async fn resolve_domain(&self, name: &str) -> Result<Vec<IpAddr>, AsnError> {
        // lookup_host needs a port; it is not used
        let addrs = tokio::net::lookup_host((name, 0))
            .await
            .map_err(|e| AsnError::Resolution(format!("{name}: {e}")))?;

        let mut unique: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !unique.contains(&addr.ip()) {
                unique.push(addr.ip());
            }
        }
        Ok(unique)
    }

    async fn get_data(&self, query: &AsnQuery) -> Result<Vec<AsnRow>, AsnError> {
        let (key, value) = query_param(query);
        debug!("asnmap query {key}={value}");

        let response = self
            .http
            .get(&self.api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[(key, value)])
            .send()
            .await
            .map_err(|e| AsnError::Lookup(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AsnError::Lookup(format!("asnmap API error {status}: {body}")));
        }

        response
            .json::<Vec<AsnRow>>()
            .await
            .map_err(|e| AsnError::Lookup(format!("unexpected asnmap response: {e}")))
    }
}
