//! MCP server — JSON-RPC 2.0 over a line-delimited byte stream
//!
//! Each request runs in its own task; replies funnel through a single writer
//! so lines never interleave. Notifications get no reply.

use std::fs::File;
use std::io;
use std::os::fd::AsFd;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::tools::ReconTools;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Protocol revisions this server speaks, newest first
const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

const OUTBOUND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

pub struct McpServer {
    info: ServerConfig,
    tools: ReconTools,
}

impl McpServer {
    pub fn new(info: ServerConfig, tools: ReconTools) -> Self {
        Self { info, tools }
    }

    /// Handle one raw message; `None` when no reply is due
    pub async fn handle_message(&self, line: &str) -> Option<Response> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(Response::error(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("invalid JSON: {e}")),
                ))
            }
        };
        if !value.is_object() {
            return Some(Response::error(
                Value::Null,
                RpcError::new(INVALID_REQUEST, "top-level message must be an object"),
            ));
        }
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(Response::error(
                    Value::Null,
                    RpcError::new(INVALID_REQUEST, e.to_string()),
                ))
            }
        };

        let Some(method) = request.method else {
            return Some(Response::error(
                request.id.unwrap_or(Value::Null),
                RpcError::new(INVALID_REQUEST, "missing method field"),
            ));
        };

        let Some(id) = request.id else {
            debug!("notification: {method}");
            return None;
        };

        debug!("request {id}: {method}");
        Some(match self.dispatch(&method, request.params).await {
            Ok(result) => Response::result(id, result),
            Err(error) => Response::error(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tools.registry().list_tools() })),
            "tools/call" => self.call_tool(params).await,
            "prompts/list" => Ok(json!({ "prompts": self.tools.registry().list_prompts() })),
            "prompts/get" => self.get_prompt(params),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("unsupported method '{other}'"),
            )),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

        info!(
            "client initialized (requested protocol {}, using {version})",
            requested.unwrap_or("none")
        );

        json!({
            "protocolVersion": version,
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
            "capabilities": {
                "tools": { "listChanged": false },
                "prompts": { "listChanged": false },
            },
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid tools/call params: {e}")))?;
        let arguments = if params.arguments.is_null() {
            Value::Object(Map::new())
        } else {
            params.arguments
        };

        match self.tools.call(&params.name, &arguments).await {
            Ok(text) => Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false,
            })),
            Err(e) => {
                warn!("tool {} failed: {e}", params.name);
                Err(RpcError::new(e.rpc_code(), e.to_string()))
            }
        }
    }

    fn get_prompt(&self, params: Value) -> Result<Value, RpcError> {
        let params: GetPromptParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid prompts/get params: {e}")))?;

        let result = self
            .tools
            .get_prompt(&params.name, &params.arguments)
            .map_err(|e| RpcError::new(e.rpc_code(), e.to_string()))?;
        serde_json::to_value(result).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
    }

    /// Serve until `input` reaches end of stream, then finish in-flight requests
    pub async fn serve<R, W>(self: Arc<Self>, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Response>(OUTBOUND_QUEUE_DEPTH);
        let writer = tokio::spawn(write_responses(rx, output));

        let mut lines = BufReader::new(input).lines();
        let mut inflight = JoinSet::new();

        while let Some(line) = lines.next_line().await.context("failed to read request")? {
            if line.trim().is_empty() {
                continue;
            }
            let server = Arc::clone(&self);
            let tx = tx.clone();
            inflight.spawn(async move {
                let id = request_id(&line);
                // A panicking handler still gets an error reply
                let handler = tokio::spawn(async move { server.handle_message(&line).await });
                let response = match handler.await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("request handler failed: {e}");
                        id.map(|id| {
                            Response::error(
                                id,
                                RpcError::new(INTERNAL_ERROR, "request handler failed"),
                            )
                        })
                    }
                };
                if let Some(response) = response {
                    if tx.send(response).await.is_err() {
                        warn!("response writer gone, reply dropped");
                    }
                }
            });
            while let Some(done) = inflight.try_join_next() {
                log_join(done);
            }
        }

        info!("input closed, waiting for {} in-flight requests", inflight.len());
        while let Some(done) = inflight.join_next().await {
            log_join(done);
        }
        drop(tx);

        writer.await.context("response writer panicked")?
    }
}

async fn write_responses<W>(mut rx: mpsc::Receiver<Response>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response).context("failed to encode response")?;
        line.push(b'\n');
        output.write_all(&line).await.context("failed to write response")?;
        output.flush().await.context("failed to flush response")?;
    }
    Ok(())
}

/// Id of a request that expects a reply; `None` for notifications and garbage
fn request_id(line: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(line).ok()?;
    value.get("method")?;
    value.get("id").filter(|id| !id.is_null()).cloned()
}

fn log_join(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!("request handler failed: {e}");
    }
}

/// Private duplicates of the process's stdin and stdout.
///
/// The transport keeps working while fds 0 and 1 are pointed elsewhere.
pub fn duplicate_stdio() -> io::Result<(tokio::fs::File, tokio::fs::File)> {
    let input = io::stdin().as_fd().try_clone_to_owned()?;
    let output = io::stdout().as_fd().try_clone_to_owned()?;
    Ok((
        tokio::fs::File::from_std(File::from(input)),
        tokio::fs::File::from_std(File::from(output)),
    ))
}
