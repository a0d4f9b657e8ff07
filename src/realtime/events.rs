//! Inbound realtime frames.

use serde_json::Value;

use crate::error::ParleyError;

/// A decoded server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SessionCreated { session_id: Option<String> },
    SessionUpdated,
    SpeechStarted,
    SpeechStopped,
    InputTranscriptionCompleted { transcript: String },
    ResponseCreated { response_id: Option<String> },
    TranscriptDelta { response_id: Option<String>, delta: String },
    TranscriptDone { response_id: Option<String>, transcript: String },
    ResponseDone { response_id: Option<String> },
    FunctionCallArgumentsDelta { call_id: Option<String>, delta: String },
    FunctionCallArgumentsDone { call_id: String, name: String, arguments: String },
    OutputAudioStarted,
    OutputAudioStopped,
    Error { message: String },
    Unknown { event_type: String },
}

impl ServerEvent {
    /// Decode one text frame, returning the event with its raw payload.
    ///
    /// A frame whose type is known but which lacks a required field is
    /// rejected with its type in the error message.
    pub fn decode(frame: &str) -> Result<(Self, Value), ParleyError> {
        let payload: Value = serde_json::from_str(frame)?;
        match Self::from_server_payload(&payload) {
            Some(event) => Ok((event, payload)),
            None => Err(ParleyError::InvalidArgument(
                match payload.get("type").and_then(Value::as_str) {
                    Some(event_type) => {
                        format!("Realtime frame '{event_type}' is missing required fields")
                    }
                    None => "Realtime frame has no type".to_string(),
                },
            )),
        }
    }

    /// Parse a server event payload into a typed event.
    ///
    /// Returns `None` when the payload has no `type` or lacks a field the
    /// event cannot do without.
    pub fn from_server_payload(payload: &Value) -> Option<Self> {
        let event_type = payload.get("type")?.as_str()?;
        let event = match event_type {
            "session.created" => Self::SessionCreated {
                session_id: string_at(payload, &["session", "id"]),
            },
            "session.updated" => Self::SessionUpdated,
            "input_audio_buffer.speech_started" => Self::SpeechStarted,
            "input_audio_buffer.speech_stopped" => Self::SpeechStopped,
            "conversation.item.input_audio_transcription.completed" => {
                Self::InputTranscriptionCompleted {
                    transcript: string_field(payload, "transcript").unwrap_or_default(),
                }
            }
            "response.created" => Self::ResponseCreated {
                response_id: string_at(payload, &["response", "id"]),
            },
            "response.audio_transcript.delta" => Self::TranscriptDelta {
                response_id: string_field(payload, "response_id"),
                delta: string_field(payload, "delta").unwrap_or_default(),
            },
            "response.audio_transcript.done" => Self::TranscriptDone {
                response_id: string_field(payload, "response_id"),
                transcript: string_field(payload, "transcript").unwrap_or_default(),
            },
            "response.done" => Self::ResponseDone {
                response_id: string_at(payload, &["response", "id"])
                    .or_else(|| string_field(payload, "response_id")),
            },
            "response.function_call_arguments.delta" => Self::FunctionCallArgumentsDelta {
                call_id: string_field(payload, "call_id"),
                delta: string_field(payload, "delta").unwrap_or_default(),
            },
            "response.function_call_arguments.done" => Self::FunctionCallArgumentsDone {
                call_id: string_field(payload, "call_id")?,
                name: string_field(payload, "name")?,
                arguments: string_field(payload, "arguments").unwrap_or_default(),
            },
            "output_audio_buffer.started" => Self::OutputAudioStarted,
            "output_audio_buffer.stopped" => Self::OutputAudioStopped,
            "error" => Self::Error {
                message: string_at(payload, &["error", "message"])
                    .or_else(|| string_field(payload, "message"))
                    .unwrap_or_else(|| "Realtime server error".to_string()),
            },
            other => Self::Unknown {
                event_type: other.to_string(),
            },
        };
        Some(event)
    }

    /// Wire name of this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated => "session.updated",
            Self::SpeechStarted => "input_audio_buffer.speech_started",
            Self::SpeechStopped => "input_audio_buffer.speech_stopped",
            Self::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::ResponseCreated { .. } => "response.created",
            Self::TranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::TranscriptDone { .. } => "response.audio_transcript.done",
            Self::ResponseDone { .. } => "response.done",
            Self::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            Self::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::OutputAudioStarted => "output_audio_buffer.started",
            Self::OutputAudioStopped => "output_audio_buffer.stopped",
            Self::Error { .. } => "error",
            Self::Unknown { event_type } => event_type,
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_created_reads_nested_id() {
        let event = ServerEvent::from_server_payload(
            &json!({"type": "response.created", "response": {"id": "r1"}}),
        );
        assert_eq!(
            event,
            Some(ServerEvent::ResponseCreated {
                response_id: Some("r1".into())
            })
        );
    }

    #[test]
    fn function_call_done_requires_call_id_and_name() {
        let missing = json!({"type": "response.function_call_arguments.done", "arguments": "{}"});
        assert_eq!(ServerEvent::from_server_payload(&missing), None);

        let complete = json!({
            "type": "response.function_call_arguments.done",
            "call_id": "c1",
            "name": "get_price",
            "arguments": "{\"symbol\":\"SOL\"}",
        });
        assert_eq!(
            ServerEvent::from_server_payload(&complete),
            Some(ServerEvent::FunctionCallArgumentsDone {
                call_id: "c1".into(),
                name: "get_price".into(),
                arguments: "{\"symbol\":\"SOL\"}".into(),
            })
        );
    }

    #[test]
    fn unrecognized_type_is_preserved() {
        let event =
            ServerEvent::from_server_payload(&json!({"type": "rate_limits.updated"})).unwrap();
        assert_eq!(event.event_type(), "rate_limits.updated");
    }

    #[test]
    fn error_frame_prefers_nested_message() {
        let event = ServerEvent::from_server_payload(
            &json!({"type": "error", "error": {"message": "bad session"}}),
        );
        assert_eq!(
            event,
            Some(ServerEvent::Error {
                message: "bad session".into()
            })
        );
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(matches!(
            ServerEvent::decode("{oops"),
            Err(ParleyError::Serialization(_))
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"no_type": true}"#),
            Err(ParleyError::InvalidArgument(msg)) if msg == "Realtime frame has no type"
        ));
    }

    #[test]
    fn decode_names_the_type_of_an_incomplete_frame() {
        let err = ServerEvent::decode(
            r#"{"type":"response.function_call_arguments.done","arguments":"{}"}"#,
        )
        .unwrap_err();
        assert!(
            err.to_string()
                .contains("response.function_call_arguments.done"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn decode_keeps_the_raw_payload() {
        let (event, payload) =
            ServerEvent::decode(r#"{"type":"session.created","session":{"id":"sess_9"}}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::SessionCreated {
                session_id: Some("sess_9".into())
            }
        );
        assert_eq!(payload["session"]["id"], "sess_9");
    }
}
