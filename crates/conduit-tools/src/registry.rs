//! Two-level tool registry: capability domain → tool name → handler.
//!
//! The registry is populated once at startup and then shared behind an `Arc`;
//! registration needs `&mut self`, so nothing can change it afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolInfo, ToolResult};

/// Registry of tools grouped by capability domain.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    domains: HashMap<String, BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under a domain.
    ///
    /// If a tool with the same name already exists in that domain, it is replaced.
    pub fn register<T: Tool + 'static>(&mut self, domain: impl Into<String>, tool: T) {
        self.register_arc(domain, Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, domain: impl Into<String>, tool: Arc<dyn Tool>) {
        let domain = domain.into();
        let name = tool.name().to_string();
        tracing::debug!(domain = %domain, tool = %name, "registering tool");
        self.domains.entry(domain).or_default().insert(name, tool);
    }

    /// Get a tool handler.
    pub fn get(&self, domain: &str, name: &str) -> Option<Arc<dyn Tool>> {
        self.domains.get(domain)?.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, domain: &str, name: &str) -> bool {
        self.domains
            .get(domain)
            .is_some_and(|tools| tools.contains_key(name))
    }

    /// Check if a domain has any tools.
    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    /// All registered domain names, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.domains.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Describe every tool of a domain, ordered by name.
    ///
    /// Unknown domains yield an empty list.
    pub fn list_for_domain(&self, domain: &str) -> Vec<ToolInfo> {
        self.domains
            .get(domain)
            .map(|tools| tools.values().map(|tool| tool.info()).collect())
            .unwrap_or_default()
    }

    /// Total number of tools across all domains.
    pub fn len(&self) -> usize {
        self.domains.values().map(|tools| tools.len()).sum()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute a tool and return whatever its handler returns.
    pub async fn execute(&self, domain: &str, name: &str, params: Value) -> Result<ToolResult> {
        let tool = self
            .get(domain, name)
            .ok_or_else(|| ToolError::not_found(domain, name))?;

        tracing::debug!(domain = %domain, tool = %name, "executing tool");
        let result = tool.execute(params).await;

        match &result {
            Ok(output) if output.is_error() => tracing::debug!(
                domain = %domain,
                tool = %name,
                error = output.error_message().unwrap_or_default(),
                "tool reported failure"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(domain = %domain, tool = %name, error = %e, "tool failed"),
        }

        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let summary: BTreeMap<&str, Vec<&str>> = self
            .domains
            .iter()
            .map(|(domain, tools)| (domain.as_str(), tools.keys().map(|k| k.as_str()).collect()))
            .collect();
        f.debug_struct("ToolRegistry")
            .field("domains", &summary)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A tool with a canned response that records its calls.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct MockTool {
    name: String,
    response: std::result::Result<ToolResult, String>,
    calls: parking_lot::Mutex<Vec<Value>>,
}

#[cfg(test)]
impl MockTool {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: Ok(ToolResult::ok(serde_json::json!({"mock": true}))),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            ..Self::new(name)
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        self.calls.lock().push(params);
        self.response.clone().map_err(ToolError::failed)
    }
}
