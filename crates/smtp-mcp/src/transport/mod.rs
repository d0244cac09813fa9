//! Transport Layer
//!
//! Two front ends for the same [`McpHandler`]:
//! - Stdio (newline-delimited JSON-RPC on stdin/stdout)
//! - HTTP+SSE (POST for requests, event stream for pushed responses, plus
//!   the `/api/test-email` and `/api/health` helpers)

mod http;
mod stdio;

pub use http::{router, HttpSseTransport, PathMode, SessionTable};
pub use stdio::{serve_lines, SessionState, StdioTransport};

use crate::envelope::ResultEnvelope;
use crate::tool_registry::{Arguments, DispatchError};
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Generic MCP server trait for transport layer
#[async_trait::async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse;

    /// Direct tool invocation for non-protocol endpoints
    async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> std::result::Result<ResultEnvelope, DispatchError>;
}

/// Transport trait - implement for new transport types
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Serve requests until the peer goes away or a shutdown signal arrives
    async fn serve<H: McpHandler + 'static>(self, handler: Arc<H>) -> Result<()>;
}

#[async_trait::async_trait]
impl McpHandler for crate::McpServer {
    async fn handle_request(&self, request: crate::McpRequest) -> crate::McpResponse {
        self.handle_request(request).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> std::result::Result<ResultEnvelope, DispatchError> {
        self.call_tool(name, arguments).await
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        },
    }
}
