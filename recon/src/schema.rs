//! JSON Schema validation for tool arguments

use serde_json::Value;

use crate::error::ToolError;

/// Validate call arguments against a tool's input schema
pub fn validate_arguments(arguments: &Value, schema: &Value) -> Result<(), ToolError> {
    if schema.is_null() {
        return Ok(()); // No schema = no validation
    }

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ToolError::InvalidArgument(format!("Invalid JSON schema: {e}")))?;

    if let Err(error) = validator.validate(arguments) {
        return Err(ToolError::InvalidArgument(format!(
            "Input validation failed: {error}"
        )));
    }

    Ok(())
}

/// Schema for an object whose properties are all given, `required` listing the mandatory ones
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
