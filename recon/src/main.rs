//! recon-mcp — MCP tool server for HTTP reconnaissance
//!
//! Speaks JSON-RPC on stdin/stdout; everything diagnostic goes to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use recon_mcp::asn::api::ApiAsnResolver;
use recon_mcp::asn::AsnAdapter;
use recon_mcp::config::{self, LogFormat, LoggingConfig};
use recon_mcp::engine::http::HttpProbeEngine;
use recon_mcp::orchestrator::Orchestrator;
use recon_mcp::server::{self, McpServer};
use recon_mcp::tools::ReconTools;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    init_tracing(&config.logging)?;

    info!(
        "{} {} starting on stdio",
        config.server.name, config.server.version
    );

    let asn = AsnAdapter::new(Arc::new(ApiAsnResolver::new(config.asn.clone())));
    let engine = Arc::new(HttpProbeEngine::new(config.http.clone()));
    let orchestrator = Orchestrator::new(engine, asn.clone(), config.scan.isolate_stdio);
    let tools = ReconTools::new(orchestrator, asn);

    let (input, output) = server::duplicate_stdio().context("Failed to duplicate stdio")?;
    let server = Arc::new(McpServer::new(config.server.clone(), tools));
    server.serve(input, output).await?;

    info!("stdin closed, shutting down");
    Ok(())
}
