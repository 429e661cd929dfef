//! Integration tests for the recon operation surface
//!
//! Exercises `ReconTools` across module boundaries:
//! - Argument validation and the full-scan confirmation gate
//! - ASN lookups through the adapter
//! - A real lite and full scan against a local HTTP server

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use recon_mcp::asn::{AsnAdapter, AsnClient, AsnQuery, AsnResolver, AsnRow};
use recon_mcp::config::HttpConfig;
use recon_mcp::engine::http::HttpProbeEngine;
use recon_mcp::engine::{HeaderValues, ProbeEngine, ProbeRun, RawProbeResult, ResultSink};
use recon_mcp::error::{AsnError, EngineError, ToolError};
use recon_mcp::orchestrator::Orchestrator;
use recon_mcp::profile::{ProbeProfile, ScanMode};
use recon_mcp::targets::Target;
use recon_mcp::tools::{ReconTools, CONFIRMATION_REFUSAL};

// ============================================================================
// Fakes
// ============================================================================

/// Records every configure call and answers each target with a 200
#[derive(Default)]
struct RecordingEngine {
    calls: Arc<Mutex<Vec<(ScanMode, Vec<String>)>>>,
}

struct RecordingRun(Vec<Target>);

impl ProbeEngine for RecordingEngine {
    fn configure(
        &self,
        profile: &ProbeProfile,
        targets: Vec<Target>,
    ) -> Result<Box<dyn ProbeRun>, EngineError> {
        self.calls.lock().unwrap().push((
            profile.mode,
            targets.iter().map(|t| t.to_string()).collect(),
        ));
        Ok(Box::new(RecordingRun(targets)))
    }
}

#[async_trait]
impl ProbeRun for RecordingRun {
    async fn run(&mut self, sink: ResultSink) {
        for target in self.0.drain(..) {
            sink.emit(RawProbeResult {
                input: target.to_string(),
                status_code: Some(200),
                raw: "HTTP/1.1 200 OK\r\nServer: fake\r\n\r\nhello".into(),
                headers: Some(HeaderValues::from([(
                    "server".to_string(),
                    vec!["fake".to_string()],
                )])),
                ..Default::default()
            })
            .await;
        }
    }

    fn close(&mut self) {}
}

/// Answers every ASN query with one Cloudflare row and logs what it was asked
#[derive(Default)]
struct StaticResolver {
    calls: Arc<Mutex<Vec<String>>>,
}

struct StaticClient(Arc<Mutex<Vec<String>>>);

impl AsnResolver for StaticResolver {
    fn new_client(&self) -> Result<Box<dyn AsnClient>, AsnError> {
        Ok(Box::new(StaticClient(Arc::clone(&self.calls))))
    }
}

#[async_trait]
impl AsnClient for StaticClient {
    async fn resolve_domain(&self, name: &str) -> Result<Vec<IpAddr>, AsnError> {
        self.0.lock().unwrap().push(format!("resolve:{name}"));
        match name {
            "one.one.test" => Ok(vec!["1.1.1.1".parse().unwrap()]),
            _ => Ok(Vec::new()),
        }
    }

    async fn get_data(&self, query: &AsnQuery) -> Result<Vec<AsnRow>, AsnError> {
        self.0.lock().unwrap().push(format!("get:{query}"));
        Ok(vec![AsnRow {
            first_ip: "1.1.1.0".into(),
            last_ip: "1.1.1.255".into(),
            input: query.to_string(),
            as_number: 13335,
            as_country: "US".into(),
            as_name: "CLOUDFLARENET".into(),
        }])
    }
}

struct Harness {
    tools: ReconTools,
    engine_calls: Arc<Mutex<Vec<(ScanMode, Vec<String>)>>>,
    asn_calls: Arc<Mutex<Vec<String>>>,
}

fn harness() -> Harness {
    let engine = RecordingEngine::default();
    let engine_calls = Arc::clone(&engine.calls);
    let resolver = StaticResolver::default();
    let asn_calls = Arc::clone(&resolver.calls);
    let asn = AsnAdapter::new(Arc::new(resolver));
    let orchestrator = Orchestrator::new(Arc::new(engine), asn.clone(), false);
    Harness {
        tools: ReconTools::new(orchestrator, asn),
        engine_calls,
        asn_calls,
    }
}

fn http_harness() -> ReconTools {
    let asn = AsnAdapter::new(Arc::new(StaticResolver::default()));
    let engine = Arc::new(HttpProbeEngine::new(HttpConfig::default()));
    ReconTools::new(Orchestrator::new(engine, asn.clone(), false), asn)
}

// ============================================================================
// Validation and confirmation
// ============================================================================

/// Test that a full scan without confirm=true never reaches the engine
#[tokio::test]
async fn test_full_recon_requires_confirmation() {
    let h = harness();
    for args in [
        json!({"targets": "example.com"}),
        json!({"targets": "example.com", "confirm": false}),
    ] {
        let text = h.tools.call("http_full_recon", &args).await.unwrap();
        let payload: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(payload, json!({"error": CONFIRMATION_REFUSAL}));
    }
    assert!(h.engine_calls.lock().unwrap().is_empty());
}

/// Test that missing or mistyped arguments are rejected before any work
#[tokio::test]
async fn test_invalid_arguments_do_no_work() {
    let h = harness();
    let cases = [
        ("http_lite_recon", json!({})),
        ("http_lite_recon", json!({"targets": 42})),
        ("http_full_recon", json!({"targets": "a.test", "confirm": "yes"})),
        ("asn_lookup", json!({})),
        ("asn_lookup", json!({"input": "   "})),
    ];
    for (name, args) in cases {
        let err = h.tools.call(name, &args).await.unwrap_err();
        assert!(
            matches!(err, ToolError::InvalidArgument(_)),
            "{name} {args}: {err:?}"
        );
    }
    assert!(h.engine_calls.lock().unwrap().is_empty());
    assert!(h.asn_calls.lock().unwrap().is_empty());
}

/// Test that unknown tools and prompts are reported as such
#[tokio::test]
async fn test_unknown_names() {
    let h = harness();
    assert!(matches!(
        h.tools.call("port_scan", &json!({})).await,
        Err(ToolError::UnknownTool(_))
    ));
    assert!(matches!(
        h.tools.get_prompt("port_scan", &Default::default()),
        Err(ToolError::UnknownPrompt(_))
    ));
}

// ============================================================================
// Scans through a scripted engine
// ============================================================================

/// Test that targets are split and trimmed before they reach the engine
#[tokio::test]
async fn test_lite_recon_parses_targets() {
    let h = harness();
    let text = h
        .tools
        .call("http_lite_recon", &json!({"targets": " a.test \n\n\tb.test\n"}))
        .await
        .unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["mode"], "lite");
    assert_eq!(payload["results"].as_array().unwrap().len(), 2);
    assert!(payload["results"][0].get("body_preview").is_none());

    let calls = h.engine_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ScanMode::Lite);
    assert_eq!(calls[0].1, vec!["a.test", "b.test"]);
}

/// Test that a confirmed full scan carries headers and a body preview
#[tokio::test]
async fn test_confirmed_full_recon() {
    let h = harness();
    let text = h
        .tools
        .call("http_full_recon", &json!({"targets": "a.test", "confirm": true}))
        .await
        .unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["mode"], "full");
    let result = &payload["results"][0];
    assert_eq!(result["body_preview"], "hello");
    assert_eq!(result["headers"]["Server"], "fake");
    assert_eq!(h.engine_calls.lock().unwrap()[0].0, ScanMode::Full);
}

/// Test that whitespace-only targets still produce an envelope
#[tokio::test]
async fn test_empty_targets_yield_empty_results() {
    let h = harness();
    let text = h
        .tools
        .call("http_lite_recon", &json!({"targets": "\n  \n"}))
        .await
        .unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["results"], json!([]));
}

// ============================================================================
// ASN lookups
// ============================================================================

/// Test that an IP address goes straight to the backend
#[tokio::test]
async fn test_asn_lookup_ip() {
    let h = harness();
    let text = h
        .tools
        .call("asn_lookup", &json!({"input": "8.8.8.8"}))
        .await
        .unwrap();
    let results: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(results[0]["as_number"], "AS13335");
    assert_eq!(results[0]["as_range"], json!(["1.1.1.0/24"]));

    let calls = h.asn_calls.lock().unwrap();
    assert!(calls.iter().all(|c| !c.starts_with("resolve:")));
    assert!(calls.contains(&"get:8.8.8.8".to_string()));
}

/// Test that a domain is resolved first and unresolvable ones fail
#[tokio::test]
async fn test_asn_lookup_domain() {
    let h = harness();
    h.tools
        .call("asn_lookup", &json!({"input": "one.one.test"}))
        .await
        .unwrap();
    assert!(h
        .asn_calls
        .lock()
        .unwrap()
        .contains(&"get:1.1.1.1".to_string()));

    let err = h
        .tools
        .call("asn_lookup", &json!({"input": "nowhere.test"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Asn(AsnError::Resolution(_))));
}

// ============================================================================
// Real HTTP engine
// ============================================================================

const PAGE: &str = "<html><head><title>Local Test</title></head><body>recon body</body></html>";

async fn serve_page() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nServer: local-test\r\nContent-Type: text/html\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    PAGE.len(),
                    PAGE
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Test a lite scan end to end against a local server
#[tokio::test]
async fn test_lite_recon_against_local_server() {
    let addr = serve_page().await;
    let tools = http_harness();

    let text = tools
        .call("http_lite_recon", &json!({"targets": format!("http://{addr}/")}))
        .await
        .unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    let results = payload["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["status_code"], 200);
    assert_eq!(results[0]["title"], "Local Test");
    assert_eq!(results[0]["webserver"], "local-test");
    assert!(results[0].get("headers").is_none());
}

/// Test a full scan end to end, and that dead targets are left out
#[tokio::test]
async fn test_full_recon_against_local_server() {
    let addr = serve_page().await;
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let tools = http_harness();

    let targets = format!("http://{addr}/\nhttp://{dead}/");
    let text = tools
        .call("http_full_recon", &json!({"targets": targets, "confirm": true}))
        .await
        .unwrap();
    let payload: Value = serde_json::from_str(&text).unwrap();
    let results = payload["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["input"], format!("http://{addr}/"));
    assert_eq!(results[0]["headers"]["Content-Type"], "text/html");
    assert!(results[0]["body_preview"]
        .as_str()
        .unwrap()
        .starts_with("<html>"));
}
