//! MCP transport layer: JSON-RPC types, stdio server, HTTP server, tool
//! definitions, and mutation audit logging.

pub mod audit;
pub mod http;
pub mod server;
pub mod tools;
pub mod types;

pub use http::HttpMcpServer;
pub use server::McpServer;
