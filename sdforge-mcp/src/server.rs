//! MCP server that exposes a [`ToolRegistry`] over stdio (§4.9, §6 "Tool
//! protocol"). The tool call path is simplified relative to a typical
//! MCP bridge: `sdforge_tools::ToolDyn::call` never throws — every
//! failure is already a `{success: false, error}` payload, so
//! `call_tool` always returns an MCP success result carrying that text.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::io::stdio;
use rmcp::{ErrorData, ServerHandler, ServiceExt};
use sdforge_tools::ToolRegistry;

use crate::error::McpError;

/// MCP server that exposes every tool in a [`ToolRegistry`] to an LLM
/// host over stdio.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    name: String,
    version: String,
}

impl McpServer {
    /// Wrap a tool registry for serving.
    #[must_use]
    pub fn new(registry: ToolRegistry, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { registry: Arc::new(registry), name: name.into(), version: version.into() }
    }

    /// Serve the registry's tools over stdin/stdout until the client
    /// disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`McpError`] if the transport fails to start or the
    /// session ends in error.
    pub async fn serve_stdio(self) -> Result<(), McpError> {
        let transport = stdio();
        let handler = McpServerHandler { registry: self.registry, name: self.name, version: self.version };
        let service = handler.serve(transport).await.map_err(McpError::connection)?;
        service.waiting().await.map_err(McpError::connection)?;
        Ok(())
    }
}

struct McpServerHandler {
    registry: Arc<ToolRegistry>,
    name: String,
    version: String,
}

impl ServerHandler for McpServerHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation { name: self.name.clone(), version: self.version.clone(), ..Default::default() },
            instructions: Some("Stable Diffusion image generation and LoRA management tools.".to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools: Vec<McpTool> = self
            .registry
            .iter()
            .map(|tool| {
                let schema = tool.input_schema().as_object().cloned().unwrap_or_default();
                McpTool {
                    name: Cow::Owned(tool.name().to_string()),
                    title: None,
                    description: Some(Cow::Owned(tool.description().to_string())),
                    input_schema: Arc::new(schema),
                    output_schema: None,
                    annotations: None,
                    execution: None,
                    icons: None,
                    meta: None,
                }
            })
            .collect();

        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let tool_name = &*request.name;
        if self.registry.get(tool_name).is_none() {
            return Err(ErrorData::invalid_params(format!("tool not found: {tool_name}"), None));
        }

        let input = match request.arguments {
            Some(map) => serde_json::Value::Object(map),
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        let result = self.registry.call(tool_name, input).await;
        let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdforge_tools::tool_fn;
    use serde_json::json;

    fn registry_with_echo() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(tool_fn(
            "echo",
            "Echoes its input back.",
            json!({"type": "object", "properties": {"msg": {"type": "string"}}}),
            |input| async move { json!({"success": true, "echoed": input}) },
        ));
        registry
    }

    #[test]
    fn mcp_server_constructs() {
        let server = McpServer::new(registry_with_echo(), "sdforge", "0.1.0");
        assert_eq!(server.name, "sdforge");
        assert_eq!(server.version, "0.1.0");
    }

    #[test]
    fn server_handler_get_info_reports_tools_capability() {
        let handler = McpServerHandler { registry: Arc::new(registry_with_echo()), name: "sdforge".into(), version: "0.1.0".into() };
        let info = handler.get_info();
        assert_eq!(info.server_info.name, "sdforge");
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn registry_call_echoes_and_reports_missing_tools() {
        let registry = registry_with_echo();
        let result = registry.call("echo", json!({"msg": "hi"})).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["echoed"]["msg"], "hi");

        let missing = registry.call("nonexistent", json!({})).await;
        assert_eq!(missing["success"], false);
    }
}
