//! Built-in HTTP probe engine
//!
//! Fetches every target concurrently (bounded by the profile's thread count),
//! retrying transport failures, and records what the response says about the
//! host. Bare hosts are tried over https first, then http.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{redirect, Client, Method, Url, Version};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{HeaderValues, ProbeEngine, ProbeRun, RawProbeResult, ResultSink};
use crate::config::HttpConfig;
use crate::error::EngineError;
use crate::profile::ProbeProfile;
use crate::targets::Target;

pub struct HttpProbeEngine {
    config: HttpConfig,
}

impl HttpProbeEngine {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

impl ProbeEngine for HttpProbeEngine {
    fn configure(
        &self,
        profile: &ProbeProfile,
        targets: Vec<Target>,
    ) -> Result<Box<dyn ProbeRun>, EngineError> {
        self.validate(profile)?;

        let method = Method::from_bytes(profile.method.as_bytes())
            .map_err(|e| EngineError::Config(format!("invalid method {}: {e}", profile.method)))?;

        let policy = if profile.follow_redirects {
            redirect::Policy::limited(self.config.max_redirects)
        } else {
            redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .user_agent(self.config.user_agent.clone())
            .redirect(policy)
            .danger_accept_invalid_certs(true);
        if !profile.http2_probe {
            builder = builder.http1_only();
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::Init(format!("HTTP client: {e}")))?;

        if profile.jarm || profile.tls_grab {
            debug!("JARM and TLS capture are not supported by the HTTP engine, skipping");
        }

        Ok(Box::new(HttpProbeRun {
            client: Some(client),
            method,
            profile: profile.clone(),
            max_body_bytes: self.config.max_body_bytes,
            targets,
        }))
    }
}

struct HttpProbeRun {
    client: Option<Client>,
    method: Method,
    profile: ProbeProfile,
    max_body_bytes: usize,
    targets: Vec<Target>,
}

/// Everything a single probe needs, shared by all workers of a run
struct ProbeContext {
    client: Client,
    method: Method,
    profile: ProbeProfile,
    max_body_bytes: usize,
}

#[async_trait]
impl ProbeRun for HttpProbeRun {
    async fn run(&mut self, sink: ResultSink) {
        let Some(client) = self.client.clone() else {
            for target in &self.targets {
                sink.emit(RawProbeResult::failed(target.as_str(), "engine closed"))
                    .await;
            }
            return;
        };

        let ctx = Arc::new(ProbeContext {
            client,
            method: self.method.clone(),
            profile: self.profile.clone(),
            max_body_bytes: self.max_body_bytes,
        });
        let permits = Arc::new(Semaphore::new(self.profile.threads));
        let mut workers = JoinSet::new();

        for target in self.targets.drain(..) {
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            let sink = sink.clone();
            workers.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let result = probe_target(&ctx, target.as_str()).await;
                sink.emit(result).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("probe worker failed: {e}");
            }
        }
    }

    fn close(&mut self) {
        self.client = None;
        self.targets.clear();
    }
}

async fn probe_target(ctx: &ProbeContext, input: &str) -> RawProbeResult {
    let mut last_error = format!("no usable URL for {input}");
    for url in candidate_urls(input) {
        match fetch_with_retries(ctx, &url).await {
            Ok(mut result) => {
                result.input = input.to_string();
                return result;
            }
            Err(e) => last_error = e,
        }
    }
    RawProbeResult::failed(input, last_error)
}

/// URLs to try for a target, in order
pub(crate) fn candidate_urls(input: &str) -> Vec<Url> {
    if input.contains("://") {
        return Url::parse(input).into_iter().collect();
    }
    ["https", "http"]
        .iter()
        .filter_map(|scheme| Url::parse(&format!("{scheme}://{input}")).ok())
        .collect()
}

async fn fetch_with_retries(ctx: &ProbeContext, url: &Url) -> Result<RawProbeResult, String> {
    let mut attempt = 0;
    loop {
        match fetch(ctx, url).await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < ctx.profile.retries => {
                debug!("probe {url} attempt {} failed: {e}", attempt + 1);
                attempt += 1;
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}

async fn fetch(ctx: &ProbeContext, url: &Url) -> Result<RawProbeResult, reqwest::Error> {
    let start = Instant::now();
    let mut response = ctx
        .client
        .request(ctx.method.clone(), url.clone())
        .send()
        .await?;
    let elapsed = start.elapsed();

    let status = response.status();
    let version = response.version();
    let final_url = response.url().clone();
    let headers = collect_headers(response.headers());

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = ctx.max_body_bytes.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= ctx.max_body_bytes {
            break;
        }
    }
    let body_text = String::from_utf8_lossy(&body);

    let host = url.host_str().unwrap_or_default().to_string();
    let port = url.port_or_known_default().unwrap_or(0);

    let mut result = RawProbeResult {
        timestamp: Some(Utc::now()),
        url: url.to_string(),
        final_url: (final_url != *url).then(|| final_url.to_string()),
        scheme: url.scheme().to_string(),
        host: host.clone(),
        port: port.to_string(),
        path: url.path().to_string(),
        method: ctx.method.to_string(),
        status_code: Some(status.as_u16()),
        content_type: first_header(&headers, "content-type"),
        content_length: first_header(&headers, "content-length")
            .and_then(|v| v.parse().ok())
            .or(Some(body.len() as u64)),
        title: extract_title(&body_text),
        webserver: first_header(&headers, "server"),
        time: Some(format!("{}ms", elapsed.as_millis())),
        a: resolve_addresses(&host, port).await,
        raw: raw_response(version, status, &headers, &body_text),
        ..Default::default()
    };

    if ctx.profile.http2_probe {
        result.http2 = Some(version == Version::HTTP_2);
    }
    if ctx.profile.tech_detect {
        result.tech = detect_tech(&headers);
    }
    if ctx.profile.csp_probe {
        result.csp = first_header(&headers, "content-security-policy")
            .map(|policy| csp_hosts(&policy))
            .unwrap_or_default();
    }
    if ctx.profile.favicon {
        result.favicon = favicon_hash(ctx, &final_url).await;
    }
    result.headers = Some(headers);

    Ok(result)
}

fn collect_headers(map: &reqwest::header::HeaderMap) -> HeaderValues {
    let mut headers = HeaderValues::new();
    for (name, value) in map {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

fn first_header(headers: &HeaderValues, name: &str) -> Option<String> {
    headers.get(name).and_then(|values| values.first()).cloned()
}

/// Rebuild the response as it looked on the wire
fn raw_response(
    version: Version,
    status: reqwest::StatusCode,
    headers: &HeaderValues,
    body: &str,
) -> String {
    let mut raw = format!("{version:?} {status}\r\n");
    for (name, values) in headers {
        for value in values {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw
}

async fn resolve_addresses(host: &str, port: u16) -> Vec<String> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let Ok(addrs) = tokio::net::lookup_host((host, port)).await else {
        return Vec::new();
    };
    let mut unique: Vec<String> = Vec::new();
    for addr in addrs {
        let ip = addr.ip().to_string();
        if !unique.contains(&ip) {
            unique.push(ip);
        }
    }
    unique
}

pub(crate) fn extract_title(body: &str) -> Option<String> {
    let lower = body.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = body[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Technologies the response headers give away
pub(crate) fn detect_tech(headers: &HeaderValues) -> Vec<String> {
    let mut tech = BTreeSet::new();

    for name in ["server", "x-powered-by", "x-generator"] {
        if let Some(value) = first_header(headers, name) {
            tech.insert(value);
        }
    }
    if headers.contains_key("x-aspnet-version") || headers.contains_key("x-aspnetmvc-version") {
        tech.insert("ASP.NET".to_string());
    }
    if headers.contains_key("cf-ray") {
        tech.insert("Cloudflare".to_string());
    }
    if headers.contains_key("x-amz-cf-id") {
        tech.insert("Amazon CloudFront".to_string());
    }
    if let Some(cookies) = headers.get("set-cookie") {
        for cookie in cookies {
            let name = cookie.split('=').next().unwrap_or_default();
            match name {
                "PHPSESSID" => tech.insert("PHP".to_string()),
                "JSESSIONID" => tech.insert("Java".to_string()),
                "ASP.NET_SessionId" => tech.insert("ASP.NET".to_string()),
                "laravel_session" => tech.insert("Laravel".to_string()),
                "csrftoken" => tech.insert("Django".to_string()),
                _ => false,
            };
        }
    }

    tech.into_iter().collect()
}

/// Hosts named in a Content-Security-Policy value
pub(crate) fn csp_hosts(policy: &str) -> Vec<String> {
    let mut hosts = BTreeSet::new();
    for directive in policy.split(';') {
        // First token is the directive name
        for source in directive.split_whitespace().skip(1) {
            if source.starts_with('\'') || !source.contains('.') {
                continue;
            }
            let without_scheme = source.split("://").last().unwrap_or(source);
            let host = without_scheme
                .split('/')
                .next()
                .unwrap_or(without_scheme)
                .split(':')
                .next()
                .unwrap_or_default();
            if !host.is_empty() {
                hosts.insert(host.to_string());
            }
        }
    }
    hosts.into_iter().collect()
}

async fn favicon_hash(ctx: &ProbeContext, base: &Url) -> Option<String> {
    let url = base.join("/favicon.ico").ok()?;
    let response = ctx.client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let bytes = response.bytes().await.ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(format!("{:x}", Sha256::digest(&bytes)))
}
