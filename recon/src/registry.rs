//! Tool Registry — stores and retrieves tool and prompt definitions

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::schema::object_schema;

pub const HTTP_LITE_RECON: &str = "http_lite_recon";
pub const HTTP_FULL_RECON: &str = "http_full_recon";
pub const ASN_LOOKUP: &str = "asn_lookup";

pub const HTTP_LITE_SCAN_PROMPT: &str = "http_lite_scan";
pub const KATANA_COMMAND_PROMPT: &str = "katana_command_generator";

/// Hints a client may show before calling a tool
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub read_only_hint: bool,
    pub idempotent_hint: bool,
    pub open_world_hint: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
    /// Caller must pass `confirm: true` before the tool does anything
    #[serde(skip)]
    pub requires_confirmation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
}

/// In-memory registry of everything the server exposes
pub struct Registry {
    tools: BTreeMap<String, ToolDefinition>,
    prompts: BTreeMap<String, PromptDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            prompts: BTreeMap::new(),
        }
    }

    /// Registry holding the three recon tools and both prompts
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        register_tools(&mut reg);
        register_prompts(&mut reg);
        info!(
            "Registered {} tools and {} prompts",
            reg.tool_count(),
            reg.prompt_count()
        );
        reg
    }

    /// Register a tool definition
    pub fn register_tool(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn register_prompt(&mut self, prompt: PromptDefinition) {
        self.prompts.insert(prompt.name.clone(), prompt);
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn get_prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.get(name)
    }

    /// All tools, ordered by name
    pub fn list_tools(&self) -> Vec<&ToolDefinition> {
        self.tools.values().collect()
    }

    pub fn list_prompts(&self) -> Vec<&PromptDefinition> {
        self.prompts.values().collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper to create a ToolDefinition
pub fn make_tool(
    name: &str,
    description: &str,
    input_schema: Value,
    idempotent: bool,
    requires_confirmation: bool,
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        annotations: ToolAnnotations {
            read_only_hint: true,
            idempotent_hint: idempotent,
            open_world_hint: true,
        },
        requires_confirmation,
    }
}

/// Helper to create a PromptDefinition from (name, description, required) triples
pub fn make_prompt(name: &str, description: &str, arguments: &[(&str, &str, bool)]) -> PromptDefinition {
    PromptDefinition {
        name: name.to_string(),
        description: description.to_string(),
        arguments: arguments
            .iter()
            .map(|(name, description, required)| PromptArgument {
                name: name.to_string(),
                description: description.to_string(),
                required: *required,
            })
            .collect(),
    }
}

fn targets_property() -> Value {
    json!({
        "type": "string",
        "description": "Newline-separated list of URLs or hosts"
    })
}

fn register_tools(reg: &mut Registry) {
    reg.register_tool(make_tool(
        HTTP_LITE_RECON,
        "Fast, lightweight HTTP reconnaissance",
        object_schema(json!({ "targets": targets_property() }), &["targets"]),
        true,
        false,
    ));

    reg.register_tool(make_tool(
        HTTP_FULL_RECON,
        "Comprehensive full HTTP scan with metadata and body preview. \
Runs only when confirm is true; otherwise returns a refusal and scans nothing",
        object_schema(
            json!({
                "targets": targets_property(),
                "confirm": {
                    "type": "boolean",
                    "description": "Explicit confirmation to run full mode; must be true"
                }
            }),
            &["targets"],
        ),
        true,
        true,
    ));

    reg.register_tool(make_tool(
        ASN_LOOKUP,
        "Query ASN info for IP, ASN number, org name, or domain",
        object_schema(
            json!({
                "input": {
                    "type": "string",
                    "description": "IP address, ASN, domain, or organization"
                }
            }),
            &["input"],
        ),
        true,
        false,
    ));
}

fn register_prompts(reg: &mut Registry) {
    reg.register_prompt(make_prompt(
        HTTP_LITE_SCAN_PROMPT,
        "Quick HTTP scan for basic information about websites",
        &[(
            "targets",
            "Website URLs or hostnames to scan, one per line",
            true,
        )],
    ));

    reg.register_prompt(make_prompt(
        KATANA_COMMAND_PROMPT,
        "Generate optimized Katana crawl commands based on httpx reconnaissance",
        &[
            ("target", "Target URL to crawl", true),
            (
                "goal",
                "Primary reconnaissance goal (e.g., 'api_discovery', 'hidden_functionality', 'comprehensive')",
                false,
            ),
            (
                "thoroughness",
                "Balance between speed and thoroughness (1-3, where 3 is most thorough)",
                false,
            ),
        ],
    ));
}
