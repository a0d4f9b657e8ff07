//! Configuration system (layered: code > env > TOML file).

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ParleyError;
use crate::realtime::RealtimeConfiguration;

/// Layered configuration for Parley.
///
/// Every field is optional; unset fields fall back to the next layer and
/// finally to the [`RealtimeConfiguration`] defaults. Layers are combined
/// with [`merge`](Self::merge), where the receiver wins.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ParleyConfig {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub transcription_model: Option<String>,
    pub signaling_timeout_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
    pub event_log_capacity: Option<usize>,
}

impl fmt::Debug for ParleyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParleyConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("realtime_url", &self.realtime_url)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("instructions", &self.instructions)
            .field("transcription_model", &self.transcription_model)
            .field("signaling_timeout_ms", &self.signaling_timeout_ms)
            .field("tool_timeout_ms", &self.tool_timeout_ms)
            .field("event_log_capacity", &self.event_log_capacity)
            .finish()
    }
}

impl ParleyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (`OPENAI_API_KEY`, `PARLEY_*`).
    ///
    /// A `.env` file in the working directory is honored if present.
    pub fn from_env() -> Result<Self, ParleyError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ParleyError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            api_key: var("OPENAI_API_KEY"),
            realtime_url: var("PARLEY_REALTIME_URL"),
            model: var("PARLEY_REALTIME_MODEL"),
            voice: var("PARLEY_VOICE"),
            instructions: None,
            transcription_model: None,
            signaling_timeout_ms: parse_millis("PARLEY_SIGNALING_TIMEOUT_MS", var)?,
            tool_timeout_ms: parse_millis("PARLEY_TOOL_TIMEOUT_MS", var)?,
            event_log_capacity: None,
        })
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ParleyError> {
        toml::from_str(source)
            .map_err(|e| ParleyError::Configuration(format!("Invalid config file: {e}")))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ParleyError> {
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&source)
    }

    /// Environment layered over an optional TOML file.
    pub fn load(path: Option<&Path>) -> Result<Self, ParleyError> {
        let file = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        Ok(Self::from_env()?.merge(file))
    }

    /// Fill unset fields from `lower`.
    pub fn merge(self, lower: Self) -> Self {
        Self {
            api_key: self.api_key.or(lower.api_key),
            realtime_url: self.realtime_url.or(lower.realtime_url),
            model: self.model.or(lower.model),
            voice: self.voice.or(lower.voice),
            instructions: self.instructions.or(lower.instructions),
            transcription_model: self.transcription_model.or(lower.transcription_model),
            signaling_timeout_ms: self.signaling_timeout_ms.or(lower.signaling_timeout_ms),
            tool_timeout_ms: self.tool_timeout_ms.or(lower.tool_timeout_ms),
            event_log_capacity: self.event_log_capacity.or(lower.event_log_capacity),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve into a session configuration.
    pub fn realtime(&self) -> Result<RealtimeConfiguration, ParleyError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            ParleyError::Configuration("No API key configured (set OPENAI_API_KEY)".into())
        })?;
        let mut config = RealtimeConfiguration::builder()
            .api_key(api_key)
            .maybe_instructions(self.instructions.clone())
            .maybe_signaling_timeout(self.signaling_timeout_ms.map(Duration::from_millis))
            .maybe_tool_timeout(self.tool_timeout_ms.map(Duration::from_millis))
            .build();
        if let Some(url) = &self.realtime_url {
            config.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(voice) = &self.voice {
            config.voice = voice.clone();
        }
        if let Some(model) = &self.transcription_model {
            config.transcription_model = model.clone();
        }
        if let Some(capacity) = self.event_log_capacity {
            config.event_log_capacity = capacity;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_millis(
    key: &str,
    var: impl Fn(&str) -> Option<String>,
) -> Result<Option<u64>, ParleyError> {
    var(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                ParleyError::Configuration(format!("{key} must be a whole number of milliseconds"))
            })
        })
        .transpose()
}
