//! smtp-mcp: MCP Front End for Sending Email
//!
//! Exposes a single `send-email` tool through the Model Context Protocol,
//! over either stdio or HTTP with Server-Sent Events.
//!
//! Architecture:
//! ```text
//! stdin/stdout ─┐
//!               ├─► McpServer ─► ToolRegistry ─► send-email ─► Mailer (smtp-mailer)
//! HTTP + SSE  ──┘                                     │
//!                                                     └─► ResultEnvelope
//! ```
//!
//! Methods:
//! - initialize / notifications/initialized / ping
//! - tools/list
//! - tools/call
//! - logging/setLevel

pub mod config;
pub mod envelope;
pub mod protocol;
pub mod server;
pub mod tool_registry;
pub mod tools;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "smtp-email-server";
pub const SERVER_VERSION: &str = "1.0.0";
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const DEFAULT_HTTP_PORT: u16 = 45450;
/// Name reported by `/api/health`
pub const HEALTH_SERVER_LABEL: &str = "SMTP MCP Server";

// Re-export main types
pub use crate::config::{ServerSettings, Settings, SettingsError};
pub use envelope::{ResultEnvelope, SendDetails};
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use server::{McpServer, ServerCapabilities};
pub use tool_registry::{DispatchError, InputSchema, Tool, ToolDescriptor, ToolError, ToolRegistry};
pub use transport::{HttpSseTransport, McpHandler, PathMode, StdioTransport, Transport};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        McpHandler, McpRequest, McpResponse, McpServer, ResultEnvelope, Settings, ToolRegistry,
        Transport,
    };
}
