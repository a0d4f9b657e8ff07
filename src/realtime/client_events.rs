//! Outbound realtime frames.

use serde::Serialize;
use serde_json::Value;

use super::config::{AudioFormat, RealtimeConfiguration};
use crate::error::ParleyError;
use crate::tools::{ToolDefinition, ToolResult};

/// A client-to-server frame, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

/// Session settings pushed once the data channel opens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub voice: String,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    pub input_audio_transcription: InputAudioTranscription,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    FunctionCallOutput { call_id: String, output: String },
    Message { role: String, content: Vec<InputContent> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
}

impl ClientEvent {
    pub fn session_update(config: &RealtimeConfiguration, tools: Vec<ToolDefinition>) -> Self {
        Self::SessionUpdate {
            session: SessionUpdate {
                modalities: config.modalities.clone(),
                instructions: config.instructions.clone(),
                voice: config.voice.clone(),
                input_audio_format: config.input_audio_format,
                output_audio_format: config.output_audio_format,
                input_audio_transcription: InputAudioTranscription {
                    model: config.transcription_model.clone(),
                },
                tools,
            },
        }
    }

    /// Tool result keyed to `call_id`; the result travels as a JSON string.
    pub fn function_call_output(
        call_id: impl Into<String>,
        result: &ToolResult,
    ) -> Result<Self, ParleyError> {
        Ok(Self::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.into(),
                output: serde_json::to_string(result)?,
            },
        })
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "user".to_string(),
                content: vec![InputContent::InputText { text: text.into() }],
            },
        }
    }

    pub fn response_create() -> Self {
        Self::ResponseCreate
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }

    pub fn to_value(&self) -> Result<Value, ParleyError> {
        serde_json::to_value(self).map_err(ParleyError::from)
    }
}
