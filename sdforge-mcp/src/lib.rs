#![deny(missing_docs)]
//! MCP wire exposure of [`sdforge_tools::ToolSurface`] (§4.9, §6 "Tool
//! protocol"): one [`McpServer`] per process, serving every registered
//! tool over stdio to an LLM host.

pub mod error;
pub mod server;

pub use error::McpError;
pub use server::McpServer;
