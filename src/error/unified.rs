//! Error classification and recovery hints for session failures.

use strum::Display;

/// Where a failure came from, used to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    /// Microphone access was refused.
    Permission,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    /// Peer connection, data channel, or SDP negotiation.
    Transport,
    Configuration,
    Serialization,
    ToolExecution,
    Unknown,
}

/// What the host app should offer the user after a failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    GrantMicrophoneAccess,
    IncreaseTimeout,
    CheckToolImplementation,
    ContactSupport,
}

impl RecoverySuggestion {
    /// Short user-facing hint.
    pub fn hint(self) -> &'static str {
        match self {
            Self::RetryWithBackoff => {
                "Connection interrupted. Try starting the conversation again."
            }
            Self::CheckCredentials => "The realtime API key was rejected.",
            Self::CheckConfiguration => "Voice settings are incomplete.",
            Self::GrantMicrophoneAccess => "Allow microphone access to talk to the assistant.",
            Self::IncreaseTimeout => "The voice service took too long to answer.",
            Self::CheckToolImplementation => "An assistant action failed.",
            Self::ContactSupport => "Something went wrong with the voice session.",
        }
    }
}
