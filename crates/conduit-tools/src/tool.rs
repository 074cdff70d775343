//! Tool framework: the [`Tool`] trait, its result payload, and parameter helpers.
//!
//! A tool is a named, schema-described operation. Handlers receive the raw
//! JSON parameters and answer with a [`ToolResult`], which always serializes
//! to an object carrying a boolean `success` field:
//!
//! ```text
//! {"success": true,  ...payload}
//! {"success": false, "error": "..."}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for tool parameter validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing.
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        /// The parameter name.
        name: &'static str,
        /// Hint on how to fix.
        hint: &'static str,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        /// The parameter name.
        name: &'static str,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        actual: String,
    },

    /// A parameter value doesn't match the expected format.
    #[error("'{name}' has invalid value '{value}': {message}")]
    InvalidValue {
        /// The parameter name.
        name: &'static str,
        /// The invalid value.
        value: String,
        /// Why it's invalid.
        message: String,
    },
}

impl ParameterValidationError {
    /// Create a missing required parameter error.
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    /// Create an invalid type error.
    pub fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: actual.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl From<ParameterValidationError> for ToolResult {
    fn from(err: ParameterValidationError) -> Self {
        ToolResult::error(err.to_string())
    }
}

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

/// Helper trait for extracting parameters from JSON.
pub trait ParamExt {
    /// Get a required string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get an optional u64 parameter with default.
    fn optional_u64(&self, name: &str, default: u64) -> u64;

    /// Get an optional boolean parameter with default.
    fn optional_bool(&self, name: &str, default: bool) -> bool;
}

impl ParamExt for Value {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(Value::Null) => Err(ParameterValidationError::missing(name, hint)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name,
                "string",
                json_type_name(other),
            )),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn optional_u64(&self, name: &str, default: u64) -> u64 {
        self.get(name).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    fn optional_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for tool handlers.
///
/// Implementations must not return `Err` for expected failure modes (file not
/// found, invalid parameters); those belong in [`ToolResult::error`]. `Err` is
/// for handlers that cannot run at all.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of this tool within its domain.
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the accepted parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: Value) -> Result<ToolResult>;

    /// Public description of this tool, without its handler.
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters(),
        }
    }
}

/// Outward-facing description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    #[serde(alias = "parameterSchema")]
    pub input_schema: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result payload of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult(Value);

impl ToolResult {
    /// Successful result. Fields of an object `payload` are merged next to
    /// `success: true`; any other value is placed under `result`.
    pub fn ok(payload: Value) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(true));
        match payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if key != "success" {
                        map.insert(key, value);
                    }
                }
            }
            Value::Null => {}
            other => {
                map.insert("result".to_string(), other);
            }
        }
        Self(Value::Object(map))
    }

    /// Failed result with an error message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(false));
        map.insert("error".to_string(), Value::String(message.into()));
        Self(Value::Object(map))
    }

    /// Failed result that also carries payload fields (e.g. captured output).
    pub fn error_with(message: impl Into<String>, payload: Value) -> Self {
        let mut result = Self::error(message);
        if let (Value::Object(map), Value::Object(fields)) = (&mut result.0, payload) {
            for (key, value) in fields {
                if key != "success" && key != "error" {
                    map.insert(key, value);
                }
            }
        }
        result
    }

    /// Wrap a value received from elsewhere (e.g. a remote peer).
    ///
    /// Objects that already carry `success` are kept as-is; anything else is
    /// treated as a successful payload.
    pub fn from_value(value: Value) -> Self {
        if value.get("success").and_then(Value::as_bool).is_some() {
            Self(value)
        } else {
            Self::ok(value)
        }
    }

    /// Check if this result reports success.
    pub fn is_success(&self) -> bool {
        self.0
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Check if this result reports failure.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Error message, if this is a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the underlying JSON.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying JSON.
    pub fn into_value(self) -> Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_merges_payload() {
        let result = ToolResult::ok(json!({"stdout": "hi", "success": false}));
        assert!(result.is_success());
        assert_eq!(result.get("stdout"), Some(&json!("hi")));
        assert_eq!(
            result.into_value(),
            json!({"success": true, "stdout": "hi"})
        );
    }

    #[test]
    fn test_ok_wraps_scalar() {
        let result = ToolResult::ok(json!(42));
        assert_eq!(result.into_value(), json!({"success": true, "result": 42}));
    }

    #[test]
    fn test_error_shape() {
        let result = ToolResult::error("no such file");
        assert!(result.is_error());
        assert_eq!(result.error_message(), Some("no such file"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": false, "error": "no such file"})
        );
    }

    #[test]
    fn test_from_value_keeps_explicit_status() {
        let failed = ToolResult::from_value(json!({"success": false, "error": "x"}));
        assert!(failed.is_error());

        let plain = ToolResult::from_value(json!({"items": []}));
        assert!(plain.is_success());
    }

    #[test]
    fn test_required_str() {
        let params = json!({"path": "/tmp", "count": 3});
        assert_eq!(params.required_str("path", "a path").unwrap(), "/tmp");

        let err = params.required_str("missing", "give it").unwrap_err();
        assert!(matches!(err, ParameterValidationError::MissingRequired { .. }));

        let err = params.required_str("count", "a string").unwrap_err();
        assert!(err.to_string().contains("expected string, got number"));
    }

    #[test]
    fn test_optional_helpers() {
        let params = json!({"n": 7, "flag": true});
        assert_eq!(params.optional_u64("n", 1), 7);
        assert_eq!(params.optional_u64("other", 1), 1);
        assert!(params.optional_bool("flag", false));
        assert_eq!(params.optional_str("absent"), None);
    }

    #[test]
    fn test_validation_error_into_result() {
        let result: ToolResult = ParameterValidationError::missing("path", "x").into();
        assert!(result.is_error());
        assert!(result.error_message().unwrap().contains("path"));
    }

    #[test]
    fn test_tool_info_accepts_parameter_schema_alias() {
        let info: ToolInfo = serde_json::from_value(json!({
            "name": "read_file",
            "description": "Read a file",
            "parameterSchema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(info.input_schema, json!({"type": "object"}));
    }
}
