//! Finalized conversation turns handed to the chat UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::ToolResult;

/// A finalized turn. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub parts: Vec<MessagePart>,
}

impl Message {
    fn new(role: Role, content: String, extra: Option<MessagePart>) -> Self {
        let mut parts = vec![MessagePart::Text {
            text: content.clone(),
        }];
        parts.extend(extra);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            created_at: Utc::now(),
            parts,
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), None)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), None)
    }

    /// Synthetic assistant message recording a completed tool call.
    ///
    /// The text part is empty; the UI renders the invocation part.
    pub fn tool_invocation(invocation: ToolInvocation) -> Self {
        Self::new(
            Role::Assistant,
            String::new(),
            Some(MessagePart::ToolInvocation(invocation)),
        )
    }

    /// The tool invocation carried by this message, if any.
    pub fn invocation(&self) -> Option<&ToolInvocation> {
        self.parts.iter().find_map(|part| match part {
            MessagePart::ToolInvocation(invocation) => Some(invocation),
            MessagePart::Text { .. } => None,
        })
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A typed segment of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text { text: String },
    ToolInvocation(ToolInvocation),
}

/// One request/response pair for a model-initiated function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    pub raw_arguments: String,
    pub arguments: serde_json::Value,
    pub result: ToolResult,
}

/// Consumer of finalized messages (the surrounding chat UI).
pub trait MessageSink: Send + Sync {
    fn append(&self, message: Message);
}
