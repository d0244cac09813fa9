//! smtp-mcp-server: MCP Server Exposing a send-email Tool
//!
//! Transports:
//!   smtp-mcp-server                      # HTTP+SSE, messages on POST /
//!   smtp-mcp-server --streamable-http    # HTTP+SSE, messages on POST /message
//!   smtp-mcp-server --stdio              # newline-delimited JSON-RPC on stdin/stdout
//!
//! SMTP settings come from `application.properties` (or `--config PATH`),
//! overridable with `SMTP_MCP_SMTP__<KEY>` environment variables.

use anyhow::{Context, Result};
use clap::Parser;
use smtp_mailer::{Mailer, SmtpMailer};
use smtp_mcp::{
    config::{Settings, DEFAULT_CONFIG_FILE},
    tools,
    transport::{HttpSseTransport, PathMode, StdioTransport, Transport},
    McpServer, ToolRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "smtp-mcp-server")]
#[command(about = "MCP server that sends email over SMTP")]
#[command(version = smtp_mcp::SERVER_VERSION)]
struct Cli {
    /// Serve MCP over stdin/stdout
    #[arg(long, conflicts_with = "streamable_http")]
    stdio: bool,

    /// HTTP+SSE with requests posted to /message instead of /
    #[arg(long)]
    streamable_http: bool,

    /// Properties file with smtp.* and server.* settings
    #[arg(long, env = "SMTP_MCP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,

    /// Log level (ignored when RUST_LOG is set)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging to stderr so stdout stays clean for the stdio transport
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("Invalid log level")?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    let settings = Arc::new(settings);

    info!(
        host = %settings.smtp.host,
        port = settings.smtp.port,
        security = ?settings.smtp.security(),
        "Starting smtp-mcp-server"
    );

    let mailer: Arc<dyn Mailer> =
        Arc::new(SmtpMailer::new(&settings.smtp).context("Failed to set up SMTP transport")?);

    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, mailer).context("Failed to register tools")?;
    let server = Arc::new(McpServer::new(Arc::new(registry)));

    if cli.stdio {
        return StdioTransport::new().serve(server).await;
    }

    let mode = if cli.streamable_http {
        PathMode::Streamable
    } else {
        PathMode::Root
    };

    HttpSseTransport::new(settings.server.bind_addr())
        .with_mode(mode)
        .with_max_in_flight(settings.server.max_concurrent_requests)
        .serve(server)
        .await
}
