//! Built-in Tools
//!
//! Registered once at startup; the registry is read-only afterwards.

pub mod send_email;

pub use send_email::{SendEmailTool, SEND_EMAIL_TOOL};

use crate::tool_registry::{RegistryError, ToolRegistry};
use smtp_mailer::Mailer;
use std::sync::Arc;
use tracing::info;

/// Load all built-in tools into the registry
pub fn register_all(
    registry: &mut ToolRegistry,
    mailer: Arc<dyn Mailer>,
) -> Result<usize, RegistryError> {
    registry.register(Arc::new(SendEmailTool::new(mailer)))?;

    let count = registry.count();
    info!("Loaded {} tool(s)", count);
    Ok(count)
}
