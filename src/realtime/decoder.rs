//! Reduces inbound frames into session state.
//!
//! [`reduce`] is synchronous and side-effect free apart from mutating the
//! state it is handed; anything that must happen outside the state (new
//! messages, tool calls) is returned as a [`ReducerEffect`].

use super::events::ServerEvent;
use super::state::{intensity, LiveState, ResponseCursor};
use crate::types::Message;

/// State owned by the reducer: the published snapshot plus the cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub live: LiveState,
    pub cursor: ResponseCursor,
}

/// Work requested by a frame beyond the state mutation itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducerEffect {
    AppendMessage(Message),
    InvokeTool {
        call_id: String,
        name: String,
        arguments: String,
    },
}

/// Apply one frame to `state`.
pub fn reduce(state: &mut ConversationState, event: &ServerEvent) -> Option<ReducerEffect> {
    let live = &mut state.live;
    let cursor = &mut state.cursor;
    match event {
        ServerEvent::SpeechStarted => {
            live.is_user_speaking = true;
            live.user_transcript.clear();
            live.intensity = intensity::USER_SPEAKING;
        }
        ServerEvent::SpeechStopped => {
            live.is_user_speaking = false;
            live.intensity = intensity::LOW;
        }
        ServerEvent::InputTranscriptionCompleted { transcript } => {
            live.user_transcript = transcript.clone();
            if !transcript.trim().is_empty() {
                return Some(ReducerEffect::AppendMessage(Message::user(transcript.clone())));
            }
        }
        ServerEvent::ResponseCreated { response_id } => {
            cursor.reset(response_id.clone());
            live.assistant_response.clear();
            live.is_assistant_speaking = false;
        }
        ServerEvent::TranscriptDelta { response_id, delta } => {
            if cursor.accepts(response_id.as_deref()) {
                cursor.accumulated_text.push_str(delta);
                live.assistant_response = cursor.accumulated_text.clone();
                live.intensity = intensity::for_delta(delta);
            }
        }
        ServerEvent::TranscriptDone {
            response_id,
            transcript,
        } => {
            if cursor.accepts(response_id.as_deref()) {
                cursor.accumulated_text = transcript.clone();
                live.assistant_response = transcript.clone();
                live.intensity = intensity::LOW;
                if !transcript.trim().is_empty() {
                    return Some(ReducerEffect::AppendMessage(Message::assistant(
                        transcript.clone(),
                    )));
                }
            }
        }
        ServerEvent::ResponseDone { .. } => {
            live.intensity = intensity::IDLE;
        }
        ServerEvent::FunctionCallArgumentsDone {
            call_id,
            name,
            arguments,
        } => {
            return Some(ReducerEffect::InvokeTool {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            });
        }
        ServerEvent::OutputAudioStarted => live.is_assistant_speaking = true,
        ServerEvent::OutputAudioStopped => live.is_assistant_speaking = false,
        ServerEvent::FunctionCallArgumentsDelta { .. }
        | ServerEvent::SessionCreated { .. }
        | ServerEvent::SessionUpdated
        | ServerEvent::Error { .. }
        | ServerEvent::Unknown { .. } => {}
    }
    None
}
