//! Result Envelope
//!
//! The single structured payload every tool call and every `/api/test-email`
//! call answers with:
//!
//! ```json
//! {"status": "success", "message": "...", "details": {"to", "subject", "cc", "bcc"}}
//! {"status": "error", "message": "...", "errorType": "..."}
//! ```
//!
//! Encoding goes through serde_json, so backslash, quote, newline, carriage
//! return and tab (and every other control character) come out escaped and
//! any JSON parser reads the original strings back.

use serde::{Deserialize, Serialize};
use smtp_mailer::{EmailRequest, MailError, SendReceipt};

pub const SEND_SUCCESS_MESSAGE: &str = "Email sent successfully";

/// Emitted only if serialization itself fails, which plain strings never do.
const ENCODING_FALLBACK: &str =
    r#"{"status":"error","message":"Failed to encode result","errorType":"EncodingError"}"#;

/// Addressing fields echoed back on success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendDetails {
    pub to: String,
    pub subject: String,
    pub cc: String,
    pub bcc: String,
}

impl From<&EmailRequest> for SendDetails {
    fn from(request: &EmailRequest) -> Self {
        Self {
            to: request.to.clone(),
            subject: request.subject.clone(),
            cc: request.cc.clone().unwrap_or_default(),
            bcc: request.bcc.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResultEnvelope {
    Success {
        message: String,
        details: SendDetails,
    },
    Error {
        message: String,
        #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
        error_type: Option<String>,
    },
}

impl ResultEnvelope {
    pub fn sent(request: &EmailRequest) -> Self {
        ResultEnvelope::Success {
            message: SEND_SUCCESS_MESSAGE.to_string(),
            details: SendDetails::from(request),
        }
    }

    pub fn send_failed(err: &MailError) -> Self {
        Self::error(format!("Failed to send email: {}", err), err.kind())
    }

    pub fn error(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        ResultEnvelope::Error {
            message: message.into(),
            error_type: Some(error_type.into()),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::error(message, "InvalidArguments")
    }

    /// Fold a mailer outcome into an envelope
    pub fn from_outcome(
        request: &EmailRequest,
        outcome: &Result<SendReceipt, MailError>,
    ) -> Self {
        match outcome {
            Ok(_) => Self::sent(request),
            Err(err) => Self::send_failed(err),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResultEnvelope::Error { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            ResultEnvelope::Success { .. } => "success",
            ResultEnvelope::Error { .. } => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResultEnvelope::Success { message, .. } | ResultEnvelope::Error { message, .. } => {
                message
            }
        }
    }

    /// Render as a single text block. Never fails.
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| ENCODING_FALLBACK.to_string())
    }
}
