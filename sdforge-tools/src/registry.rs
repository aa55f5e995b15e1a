//! Object-safe tool abstraction and registry: any tool is stored as
//! `Arc<dyn ToolDyn>`, keyed by name (§4.9).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sdforge_types::SdForgeError;

/// Object-safe trait for a single published tool (§4.9 "stable name,
/// parameter schema, structured text result").
pub trait ToolDyn: Send + Sync {
    /// The tool's unique, stable name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM host.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool, returning the structured `{success, error?,
    /// ...payload}` result as a JSON value (the caller serializes it to
    /// text).
    fn call(
        &self,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = serde_json::Value> + Send + '_>>;
}

/// Registry of tools published to the LLM host (§4.9).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool, overwriting any existing one with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Invoke a tool by name, returning a structured failure if it's not
    /// registered rather than panicking.
    pub async fn call(&self, name: &str, input: serde_json::Value) -> serde_json::Value {
        match self.get(name) {
            Some(tool) => tool.call(input).await,
            None => serde_json::json!({ "success": false, "error": format!("tool not found: {name}") }),
        }
    }

    /// Iterate over all registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolDyn>> {
        self.tools.values()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// A tool built from a name/description/schema plus an async closure,
/// the usual `from_fn` idiom for wrapping a closure in a trait object.
struct ClosureTool<F> {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    f: F,
}

impl<F, Fut> ToolDyn for ClosureTool<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = serde_json::Value> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.input_schema.clone()
    }

    fn call(&self, input: serde_json::Value) -> Pin<Box<dyn Future<Output = serde_json::Value> + Send + '_>> {
        Box::pin((self.f)(input))
    }
}

/// Build a tool from a name, description, input schema, and async
/// closure.
pub fn tool_fn<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    input_schema: serde_json::Value,
    f: F,
) -> Arc<dyn ToolDyn>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = serde_json::Value> + Send + 'static,
{
    Arc::new(ClosureTool { name: name.into(), description: description.into(), input_schema, f })
}

/// Wrap an `Err(SdForgeError)` into the `{success: false, error}` shape;
/// successful payloads are merged with `{success: true}` by the caller.
pub(crate) fn failure(err: &SdForgeError) -> serde_json::Value {
    serde_json::json!({ "success": false, "error": err.to_string() })
}

/// Merge a payload object with `{success: true}`.
pub(crate) fn success(payload: serde_json::Value) -> serde_json::Value {
    let mut merged = serde_json::json!({ "success": true });
    if let (Some(merged), Some(payload)) = (merged.as_object_mut(), payload.as_object()) {
        for (key, value) in payload {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_dispatches_by_name_and_reports_missing_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(tool_fn("ping", "replies pong", serde_json::json!({}), |_input| async {
            success(serde_json::json!({ "reply": "pong" }))
        }));

        let result = registry.call("ping", serde_json::json!({})).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["reply"], "pong");

        let missing = registry.call("nonexistent", serde_json::json!({})).await;
        assert_eq!(missing["success"], false);
    }
}
