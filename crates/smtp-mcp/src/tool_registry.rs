//! Tool Registry
//!
//! Holds every callable tool by name. Tools are registered once at startup,
//! then the registry is shared read-only (behind an `Arc`) by all transports.
//!
//! `dispatch` is the only way a tool body runs:
//! - unknown name → `DispatchError::UnknownTool`
//! - required field missing/null or wrong type → `DispatchError::InvalidArguments`,
//!   before the tool sees the call
//! - a tool failure or panic → an `error` envelope, never a dead transport task

use crate::envelope::ResultEnvelope;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Tool arguments as received on the wire
pub type Arguments = Map<String, Value>;

/// JSON type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

/// Object schema for tool input, serialized as JSON Schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self::default()
    }

    pub fn required(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.field(name, field_type, true, description)
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.field(name, field_type, false, description)
    }

    fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required,
            description: description.into(),
        });
        self
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    json!({
                        "type": f.field_type.as_str(),
                        "description": f.description
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self.required_fields().collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// Check presence of required fields and the type of every supplied field.
    /// Extra fields are ignored.
    pub fn validate(&self, arguments: &Arguments) -> Result<(), String> {
        let missing: Vec<&str> = self
            .required_fields()
            .filter(|name| arguments.get(*name).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(format!("Missing required fields: {}", missing.join(", ")));
        }

        for field in &self.fields {
            match arguments.get(&field.name) {
                Some(value) if !value.is_null() && !field.field_type.accepts(value) => {
                    return Err(format!(
                        "Field '{}' must be of type {}",
                        field.name,
                        field.field_type.as_str()
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Name, description and input schema of a tool, as listed by `tools/list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// What a tool body may fail with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Caller error the schema could not express
    #[error("{0}")]
    InvalidArguments(String),

    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
}

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        ToolError::InvalidArguments(msg.into())
    }

    pub fn failed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Failed {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Why a call never produced an envelope
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidArguments(String),
}

impl DispatchError {
    pub fn to_envelope(&self) -> ResultEnvelope {
        match self {
            DispatchError::UnknownTool(_) => ResultEnvelope::error(self.to_string(), "UnknownTool"),
            DispatchError::InvalidArguments(msg) => ResultEnvelope::invalid_arguments(msg.clone()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
}

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Runs only with arguments that already passed the descriptor's schema.
    async fn call(&self, arguments: &Arguments) -> Result<ResultEnvelope, ToolError>;
}

pub type BoxedTool = Arc<dyn Tool>;

/// Name → tool table
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: BoxedTool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }

        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    /// Descriptors in name order
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Arguments,
    ) -> Result<ResultEnvelope, DispatchError> {
        let tool = self
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        tool.descriptor()
            .input_schema
            .validate(&arguments)
            .map_err(|msg| {
                warn!(tool = %name, error = %msg, "Rejected tool call");
                DispatchError::InvalidArguments(msg)
            })?;

        debug!(tool = %name, "Dispatching tool call");

        match AssertUnwindSafe(tool.call(&arguments)).catch_unwind().await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(ToolError::InvalidArguments(msg))) => {
                warn!(tool = %name, error = %msg, "Rejected tool call");
                Err(DispatchError::InvalidArguments(msg))
            }
            Ok(Err(ToolError::Failed { kind, message })) => {
                warn!(tool = %name, kind = %kind, error = %message, "Tool failed");
                Ok(ResultEnvelope::error(message, kind))
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(tool = %name, panic = %detail, "Tool panicked");
                Ok(ResultEnvelope::error(
                    format!("Tool '{}' panicked: {}", name, detail),
                    "Panic",
                ))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
