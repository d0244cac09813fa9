//! Shared fixtures for unit tests

use crate::server::McpServer;
use crate::tool_registry::ToolRegistry;
use crate::tools;
use async_trait::async_trait;
use smtp_mailer::{EmailRequest, MailError, Mailer, SendReceipt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mailer stub that records every request it receives
pub struct RecordingMailer {
    calls: AtomicUsize,
    failure: Option<MailError>,
    sent: Mutex<Vec<EmailRequest>>,
}

impl RecordingMailer {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failure: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: MailError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failure: Some(err),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<EmailRequest> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, request: &EmailRequest) -> Result<SendReceipt, MailError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(SendReceipt::new("250", "2.0.0 OK")),
        }
    }
}

/// Server with the built-in tools wired to the given mailer
pub fn server_with(mailer: Arc<dyn Mailer>) -> Arc<McpServer> {
    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, mailer).unwrap();
    Arc::new(McpServer::new(Arc::new(registry)))
}
