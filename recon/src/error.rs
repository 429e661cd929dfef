//! Error types shared across the recon pipeline

use thiserror::Error;

/// Probe engine failures that abort a scan before any target is processed
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("probe engine configuration invalid: {0}")]
    Config(String),
    #[error("probe engine initialization failed: {0}")]
    Init(String),
}

/// Failures of a direct ASN lookup
#[derive(Debug, Error)]
pub enum AsnError {
    #[error("asn resolver init failed: {0}")]
    ResolverInit(String),
    #[error("could not resolve '{0}' to an address")]
    Resolution(String),
    #[error("asn lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to isolate standard streams: {0}")]
    Isolation(#[from] std::io::Error),
}

/// Errors surfaced by the operation surface to the protocol layer
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),
    #[error(transparent)]
    Mode(#[from] ProfileError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Asn(#[from] AsnError),
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ToolError {
    /// JSON-RPC error code for this failure
    pub fn rpc_code(&self) -> i64 {
        match self {
            ToolError::InvalidArgument(_)
            | ToolError::UnknownTool(_)
            | ToolError::UnknownPrompt(_)
            | ToolError::Mode(_) => crate::server::INVALID_PARAMS,
            _ => crate::server::INTERNAL_ERROR,
        }
    }
}
