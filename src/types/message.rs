//! Session and message types
//!
//! Messages are append-only: once written to a session they are never
//! mutated. Tool calls and their outcomes are retained in the log for
//! auditability but never re-executed from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CategorySlug;

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// Structured metadata attached to a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Tool invoked, when the message records a tool call or result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Category the turn was routed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_category: Option<CategorySlug>,

    /// Chunk ids cited by an assistant answer
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub cited_chunk_ids: Vec<String>,
}

impl MessageMeta {
    pub fn is_empty(&self) -> bool {
        self.tool.is_none() && self.routed_category.is_none() && self.cited_chunk_ids.is_empty()
    }
}

/// One entry in a session's append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "MessageMeta::is_empty")]
    pub meta: MessageMeta,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            meta: MessageMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: MessageMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub owner_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Tool name as declared in the registry
    pub tool: String,

    /// Input record, validated against the tool's schema before dispatch
    pub args: serde_json::Value,
}

/// Result of executing a tool request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,

    /// Success payload or typed error message
    #[serde(flatten)]
    pub result: ToolResultBody,

    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

/// Success-or-error body of a tool outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResultBody {
    Ok { payload: serde_json::Value },
    Err { error: String },
}

impl ToolOutcome {
    pub fn ok(tool: impl Into<String>, payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            result: ToolResultBody::Ok { payload },
            duration_ms,
        }
    }

    pub fn err(tool: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            result: ToolResultBody::Err {
                error: error.into(),
            },
            duration_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.result, ToolResultBody::Ok { .. })
    }

    /// Render the outcome for inclusion in model context
    pub fn render(&self) -> String {
        match &self.result {
            ToolResultBody::Ok { payload } => payload.to_string(),
            ToolResultBody::Err { error } => format!("error: {}", error),
        }
    }
}
