//! Error type for MCP transport/connection failures.

use std::fmt;

/// Failure starting or running the MCP server.
#[derive(Debug)]
pub struct McpError(String);

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mcp error: {}", self.0)
    }
}

impl std::error::Error for McpError {}

impl McpError {
    pub(crate) fn connection(err: impl fmt::Display) -> Self {
        Self(err.to_string())
    }
}
