//! send-email Tool

use crate::envelope::ResultEnvelope;
use crate::tool_registry::{Arguments, FieldType, InputSchema, Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use smtp_mailer::{EmailRequest, Mailer};
use std::sync::Arc;
use tracing::{error, info};

pub const SEND_EMAIL_TOOL: &str = "send-email";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        SEND_EMAIL_TOOL,
        "Sends an email using SMTP",
        InputSchema::object()
            .required("to", FieldType::String, "Recipient email address")
            .required("subject", FieldType::String, "Email subject line")
            .required("body", FieldType::String, "Email body content")
            .optional("cc", FieldType::String, "CC email address (optional)")
            .optional("bcc", FieldType::String, "BCC email address (optional)"),
    )
}

/// Turn schema-checked arguments into an [`EmailRequest`].
///
/// The schema only guarantees presence; a blank recipient is still rejected here.
pub fn email_request(arguments: &Arguments) -> Result<EmailRequest, ToolError> {
    let text = |key: &str| arguments.get(key).and_then(Value::as_str);

    let to = text("to")
        .filter(|to| !to.trim().is_empty())
        .ok_or_else(|| ToolError::invalid_arguments("Recipient 'to' must not be empty"))?;
    let subject = text("subject")
        .ok_or_else(|| ToolError::invalid_arguments("Missing required fields: subject"))?;
    let body = text("body")
        .ok_or_else(|| ToolError::invalid_arguments("Missing required fields: body"))?;

    Ok(EmailRequest {
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        cc: text("cc").map(String::from),
        bcc: text("bcc").map(String::from),
    })
}

pub struct SendEmailTool {
    descriptor: ToolDescriptor,
    mailer: Arc<dyn Mailer>,
}

impl SendEmailTool {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            descriptor: descriptor(),
            mailer,
        }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, arguments: &Arguments) -> Result<ResultEnvelope, ToolError> {
        let request = email_request(arguments)?;

        info!(to = %request.to, subject = %request.subject, "Executing send-email tool");

        let outcome = self.mailer.send(&request).await;
        match &outcome {
            Ok(receipt) => {
                info!(to = %request.to, code = %receipt.code, "Email sent successfully")
            }
            Err(e) => {
                error!(to = %request.to, kind = e.kind(), error = %e, "send-email failed")
            }
        }

        Ok(ResultEnvelope::from_outcome(&request, &outcome))
    }
}
