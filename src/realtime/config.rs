//! Realtime session configuration.

use std::fmt;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;

pub const DEFAULT_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "oai-events";
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// Audio encoding negotiated with the realtime model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AudioFormat {
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

/// Configuration for a realtime voice session.
///
/// ```
/// use parley::realtime::RealtimeConfiguration;
///
/// let config = RealtimeConfiguration::builder()
///     .api_key("sk-test")
///     .instructions("You are a Solana assistant.")
///     .build();
/// assert_eq!(config.voice, "alloy");
/// ```
#[derive(Clone, Builder)]
pub struct RealtimeConfiguration {
    #[builder(into)]
    pub api_key: String,
    #[builder(into, default = DEFAULT_REALTIME_URL.to_string())]
    pub base_url: String,
    #[builder(into, default = DEFAULT_REALTIME_MODEL.to_string())]
    pub model: String,
    #[builder(into, default = DEFAULT_VOICE.to_string())]
    pub voice: String,
    #[builder(into)]
    pub instructions: Option<String>,
    #[builder(default = vec!["text".to_string(), "audio".to_string()])]
    pub modalities: Vec<String>,
    #[builder(default = AudioFormat::Pcm16)]
    pub input_audio_format: AudioFormat,
    #[builder(default = AudioFormat::Pcm16)]
    pub output_audio_format: AudioFormat,
    #[builder(into, default = DEFAULT_TRANSCRIPTION_MODEL.to_string())]
    pub transcription_model: String,
    #[builder(into, default = DEFAULT_DATA_CHANNEL_LABEL.to_string())]
    pub data_channel_label: String,
    /// Upper bound on the SDP offer/answer round-trip. Unbounded when unset.
    pub signaling_timeout: Option<Duration>,
    /// Upper bound on a single tool execution. Unbounded when unset.
    pub tool_timeout: Option<Duration>,
    #[builder(default = DEFAULT_EVENT_LOG_CAPACITY)]
    pub event_log_capacity: usize,
}

impl RealtimeConfiguration {
    /// Signaling endpoint with the model id in the query string.
    pub fn signaling_url(&self) -> Result<String, ParleyError> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(ParleyError::Configuration(
                "Realtime base URL cannot be empty".into(),
            ));
        }
        let separator = if trimmed.contains('?') { "&" } else { "?" };
        Ok(format!("{trimmed}{separator}model={}", self.model))
    }

    /// Reject configurations that cannot produce a session.
    pub fn validate(&self) -> Result<(), ParleyError> {
        if self.api_key.trim().is_empty() {
            return Err(ParleyError::Configuration(
                "Realtime API key cannot be empty".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ParleyError::Configuration(
                "Realtime model cannot be empty".into(),
            ));
        }
        self.signaling_url().map(|_| ())
    }
}

impl fmt::Debug for RealtimeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfiguration")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("modalities", &self.modalities)
            .field("input_audio_format", &self.input_audio_format)
            .field("output_audio_format", &self.output_audio_format)
            .field("transcription_model", &self.transcription_model)
            .field("data_channel_label", &self.data_channel_label)
            .field("signaling_timeout", &self.signaling_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .field("event_log_capacity", &self.event_log_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signaling_url_appends_model_query() {
        let config = RealtimeConfiguration::builder()
            .api_key("k")
            .base_url("https://example.test/v1/realtime")
            .model("m1")
            .build();
        assert_eq!(
            config.signaling_url().unwrap(),
            "https://example.test/v1/realtime?model=m1"
        );
    }

    #[test]
    fn signaling_url_extends_existing_query() {
        let config = RealtimeConfiguration::builder()
            .api_key("k")
            .base_url("https://example.test/rt?region=eu")
            .model("m1")
            .build();
        assert_eq!(
            config.signaling_url().unwrap(),
            "https://example.test/rt?region=eu&model=m1"
        );
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let config = RealtimeConfiguration::builder().api_key("  ").build();
        assert!(matches!(
            config.validate(),
            Err(ParleyError::Configuration(_))
        ));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = RealtimeConfiguration::builder().api_key("sk-secret").build();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn audio_format_parses_wire_names() {
        assert_eq!("g711_ulaw".parse::<AudioFormat>().unwrap(), AudioFormat::G711Ulaw);
        assert_eq!(AudioFormat::Pcm16.to_string(), "pcm16");
    }
}
