//! recon-mcp configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_CONFIG_PATH: &str = "/etc/recon-mcp/config.toml";
pub const CONFIG_ENV: &str = "RECON_MCP_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub asn: AsnConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default = "default_server_version")]
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Point fds 0/1 at /dev/null while the engine runs
    #[serde(default = "default_true")]
    pub isolate_stdio: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            isolate_stdio: true,
        }
    }
}

/// Settings for the built-in HTTP probe engine
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsnConfig {
    #[serde(default = "default_asn_api_url")]
    pub api_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_asn_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_asn_timeout")]
    pub timeout_secs: u64,
}

impl Default for AsnConfig {
    fn default() -> Self {
        Self {
            api_url: default_asn_api_url(),
            api_key_env: default_asn_api_key_env(),
            timeout_secs: default_asn_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_server_name() -> String { "recon-mcp".into() }
fn default_server_version() -> String { env!("CARGO_PKG_VERSION").into() }
fn default_true() -> bool { true }
fn default_http_timeout() -> u64 { 10 }
fn default_user_agent() -> String { format!("recon-mcp/{}", env!("CARGO_PKG_VERSION")) }
fn default_max_body_bytes() -> usize { 1024 * 1024 }
fn default_max_redirects() -> usize { 10 }
fn default_asn_api_url() -> String { "https://asnmap.projectdiscovery.io/api/v1/asnmap".into() }
fn default_asn_api_key_env() -> String { "PDCP_API_KEY".into() }
fn default_asn_timeout() -> u64 { 15 }
fn default_log_level() -> String { "warn".into() }

/// `$RECON_MCP_CONFIG`, or /etc/recon-mcp/config.toml
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Load configuration from [`config_path`].
///
/// Runs before the global subscriber exists, so load diagnostics go
/// straight to stderr.
pub fn load_config() -> Result<ReconConfig> {
    load_config_reporting(&config_path(), std::io::stderr)
}

/// Load configuration from a path with a temporary subscriber writing to `writer`
pub fn load_config_reporting<W>(path: &Path, writer: W) -> Result<ReconConfig>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .finish();
    tracing::subscriber::with_default(subscriber, || load_config_from(path))
}

/// Load configuration from a path, falling back to defaults when it is absent
pub fn load_config_from(path: &Path) -> Result<ReconConfig> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: ReconConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    } else {
        tracing::warn!("Config file not found at {}, using defaults", path.display());
        Ok(ReconConfig::default())
    }
}
