//! recon-mcp — HTTP reconnaissance and ASN lookup exposed as MCP tools
//!
//! Layers, bottom up: target parsing and scan profiles, the probe engine,
//! the ASN adapter, result shaping, the orchestrator that ties a scan
//! together, and the operation surface served over JSON-RPC on stdio.

pub mod asn;
pub mod config;
pub mod engine;
pub mod error;
pub mod isolation;
pub mod orchestrator;
pub mod profile;
pub mod prompts;
pub mod registry;
pub mod schema;
pub mod server;
pub mod shaper;
pub mod targets;
pub mod tools;
