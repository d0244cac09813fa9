//! MCP Server
//!
//! Core server implementation that handles all MCP protocol logic.
//! Transport-agnostic - the stdio and HTTP+SSE adapters both feed it.

use crate::envelope::ResultEnvelope;
use crate::protocol::{
    JsonRpcError, McpRequest, McpResponse, SetLevelParams, ToolCallParams, JSONRPC_VERSION,
    LOG_LEVELS,
};
use crate::tool_registry::{Arguments, DispatchError, ToolRegistry};
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Feature sets advertised during `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCapabilities {
    pub tools: bool,
    pub logging: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: true,
            logging: true,
        }
    }
}

impl ServerCapabilities {
    pub fn to_json(&self) -> Value {
        let mut caps = serde_json::Map::new();
        if self.tools {
            caps.insert("tools".into(), json!({ "listChanged": false }));
        }
        if self.logging {
            caps.insert("logging".into(), json!({}));
        }
        Value::Object(caps)
    }
}

/// MCP Server
///
/// Holds no per-call state: the registry is read-only and every request is
/// answered from its own inputs.
pub struct McpServer {
    capabilities: ServerCapabilities,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            capabilities: ServerCapabilities::default(),
            registry,
        }
    }

    /// Handle an MCP request
    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        debug!(method = %request.method, "Handling MCP request");

        if request.jsonrpc != JSONRPC_VERSION {
            return McpResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "notifications/initialized" | "initialized" => {
                McpResponse::success(request.id, json!({}))
            }
            "ping" => McpResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "logging/setLevel" => self.handle_set_level(request),
            _ => McpResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        }
    }

    /// Dispatch straight to the registry, bypassing JSON-RPC framing
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<ResultEnvelope, DispatchError> {
        self.registry.dispatch(name, arguments).await
    }

    fn handle_initialize(&self, request: McpRequest) -> McpResponse {
        let client_info = request.params.as_ref().and_then(|p| p.get("clientInfo"));
        let client_name = client_info
            .and_then(|ci| ci.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let client_version = client_info
            .and_then(|ci| ci.get("version"))
            .and_then(Value::as_str)
            .unwrap_or("?");

        info!(client = %client_name, version = %client_version, "Client connected");

        McpResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": self.capabilities.to_json(),
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: McpRequest) -> McpResponse {
        McpResponse::success(
            request.id,
            json!({
                "tools": self.registry.descriptors()
            }),
        )
    }

    async fn handle_tools_call(&self, request: McpRequest) -> McpResponse {
        let params = match request.params.clone().map(serde_json::from_value::<ToolCallParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return McpResponse::error(
                    request.id,
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                )
            }
            None => {
                return McpResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Missing params"),
                )
            }
        };

        let arguments = params.arguments.unwrap_or_default();
        match self.call_tool(&params.name, arguments).await {
            Ok(envelope) => McpResponse::success(request.id, call_tool_result(&envelope)),
            Err(err @ DispatchError::UnknownTool(_)) => {
                warn!(tool = %params.name, "Unknown tool requested");
                McpResponse::error(request.id, JsonRpcError::invalid_params(err.to_string()))
            }
            Err(err @ DispatchError::InvalidArguments(_)) => {
                McpResponse::success(request.id, call_tool_result(&err.to_envelope()))
            }
        }
    }

    fn handle_set_level(&self, request: McpRequest) -> McpResponse {
        let params = match request.params.clone().map(serde_json::from_value::<SetLevelParams>) {
            Some(Ok(params)) => params,
            _ => {
                return McpResponse::error(
                    request.id,
                    JsonRpcError::invalid_params("Expected params: {\"level\": <string>}"),
                )
            }
        };

        if !LOG_LEVELS.contains(&params.level.as_str()) {
            return McpResponse::error(
                request.id,
                JsonRpcError::invalid_params(format!("Unknown log level: {}", params.level)),
            );
        }

        info!(level = %params.level, "Client requested log level");
        McpResponse::success(request.id, json!({}))
    }
}

/// `tools/call` result: the envelope as one text content block
pub fn call_tool_result(envelope: &ResultEnvelope) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": envelope.to_text()
        }],
        "isError": envelope.is_error()
    })
}
