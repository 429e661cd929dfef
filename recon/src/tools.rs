//! Operation surface — validates tool calls and dispatches them
//!
//! Pipeline: look up tool → validate arguments against its schema →
//! confirmation gate → parse targets → orchestrator / ASN adapter → JSON text

use serde_json::{json, Map, Value};
use tracing::info;

use crate::asn::AsnAdapter;
use crate::error::ToolError;
use crate::orchestrator::Orchestrator;
use crate::profile::ScanMode;
use crate::prompts::{self, PromptResult};
use crate::registry::{Registry, ASN_LOOKUP, HTTP_FULL_RECON, HTTP_LITE_RECON};
use crate::schema::validate_arguments;
use crate::targets;

pub const CONFIRMATION_REFUSAL: &str = "Full scan requires confirm=true";

/// The recon tools and prompts behind one registry
pub struct ReconTools {
    registry: Registry,
    orchestrator: Orchestrator,
    asn: AsnAdapter,
}

impl ReconTools {
    pub fn new(orchestrator: Orchestrator, asn: AsnAdapter) -> Self {
        Self {
            registry: Registry::builtin(),
            orchestrator,
            asn,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run a tool and return its JSON text payload
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get_tool(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_arguments(arguments, &tool.input_schema)?;

        if tool.requires_confirmation && !confirmed(arguments) {
            info!("{name} refused: confirmation missing");
            return Ok(serde_json::to_string_pretty(&json!({
                "error": CONFIRMATION_REFUSAL
            }))?);
        }

        match name {
            HTTP_LITE_RECON => self.scan(arguments, ScanMode::Lite).await,
            HTTP_FULL_RECON => self.scan(arguments, ScanMode::Full).await,
            ASN_LOOKUP => self.asn_lookup(arguments).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Render a guidance template
    pub fn get_prompt(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<PromptResult, ToolError> {
        if self.registry.get_prompt(name).is_none() {
            return Err(ToolError::UnknownPrompt(name.to_string()));
        }
        prompts::render(name, arguments)
    }

    async fn scan(&self, arguments: &Value, mode: ScanMode) -> Result<String, ToolError> {
        let raw = required_str(arguments, "targets")?;
        let targets = targets::parse(raw);
        info!("Executing {mode} recon on {} targets", targets.len());

        let response = self.orchestrator.run(targets, mode).await?;
        Ok(serde_json::to_string_pretty(&response)?)
    }

    async fn asn_lookup(&self, arguments: &Value) -> Result<String, ToolError> {
        let input = required_str(arguments, "input")?.trim();
        if input.is_empty() {
            return Err(ToolError::InvalidArgument("missing or invalid 'input'".into()));
        }

        let results = self.asn.lookup(input).await?;
        Ok(serde_json::to_string_pretty(&results)?)
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArgument(format!("invalid or missing '{key}'")))
}

fn confirmed(arguments: &Value) -> bool {
    arguments.get("confirm").and_then(Value::as_bool) == Some(true)
}
