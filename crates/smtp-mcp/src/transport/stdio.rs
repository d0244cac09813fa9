//! Stdio Transport
//!
//! Standard MCP transport over stdin/stdout. stdout carries protocol
//! messages only; all diagnostics go through tracing to stderr.

use super::{shutdown_signal, McpHandler, Transport};
use crate::{JsonRpcError, McpRequest, McpResponse};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

/// Lifecycle of the single stdio peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Negotiated,
    Serving,
}

impl SessionState {
    /// Before `initialize` only the handshake and liveness checks are served.
    pub fn admits(self, method: &str) -> bool {
        match self {
            SessionState::Uninitialized => matches!(method, "initialize" | "ping"),
            SessionState::Negotiated | SessionState::Serving => true,
        }
    }

    /// State after `method` was answered successfully
    pub fn advance(self, method: &str) -> Self {
        match (self, method) {
            (SessionState::Uninitialized, "initialize") => SessionState::Negotiated,
            (SessionState::Negotiated, "initialize" | "ping") => SessionState::Negotiated,
            (SessionState::Negotiated, _) => SessionState::Serving,
            (state, _) => state,
        }
    }
}

/// Stdio transport - reads JSON-RPC from stdin, writes to stdout
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()> {
        info!("Starting MCP stdio transport");

        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();

        tokio::select! {
            result = serve_lines(handler, reader, writer) => result,
            _ = shutdown_signal() => {
                info!("Stdio transport interrupted");
                Ok(())
            }
        }
    }
}

/// Serve newline-delimited JSON-RPC until `reader` hits EOF.
///
/// Requests are handled one at a time on the calling task.
pub async fn serve_lines<H, R, W>(handler: Arc<H>, mut reader: R, mut writer: W) -> Result<()>
where
    H: McpHandler + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut state = SessionState::Uninitialized;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read from stdin")?;
        if read == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                error!(error = %e, "Request is not valid UTF-8");
                let response = McpResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Invalid UTF-8: {}", e)),
                );
                write_response(&mut writer, &response).await?;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        debug!(request = %line, "Received request");

        let request = match McpRequest::parse(line) {
            Ok(request) => request,
            Err(response) => {
                error!(line = %line, "Rejected malformed request");
                write_response(&mut writer, &response).await?;
                continue;
            }
        };

        let notification = request.is_notification();
        let method = request.method.clone();

        let response = if state.admits(&method) {
            let response = handler.handle_request(request).await;
            if response.is_success() {
                let next = state.advance(&method);
                if next != state {
                    debug!(from = ?state, to = ?next, "Session state changed");
                    state = next;
                }
            }
            response
        } else {
            warn!(method = %method, "Request before initialize");
            McpResponse::error(request.id, JsonRpcError::server_not_initialized())
        };

        if notification {
            continue;
        }
        write_response(&mut writer, &response).await?;
    }

    info!("Stdio transport shutting down");
    Ok(())
}

async fn write_response<W>(writer: &mut W, response: &McpResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response_json = serde_json::to_string(response)?;
    debug!(response = %response_json, "Sending response");

    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
