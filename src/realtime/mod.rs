//! Realtime voice sessions over WebRTC.

pub mod bridge;
pub mod client_events;
pub mod config;
pub mod decoder;
pub mod events;
pub mod session;
pub mod signaling;
pub mod state;
pub mod transport;

pub use bridge::{ToolCallBridge, ToolCallOutbound};
pub use client_events::{ClientEvent, ConversationItem, InputContent, SessionUpdate};
pub use config::{AudioFormat, RealtimeConfiguration};
pub use decoder::{reduce, ConversationState, ReducerEffect};
pub use events::ServerEvent;
pub use session::{AppState, RealtimeSessionManager};
pub use signaling::{HttpSignaler, SdpSignaler};
pub use state::{ConnectionState, EventDirection, EventLogEntry, LiveState, ResponseCursor};
pub use transport::{
    AudioTrack, DataChannel, DataChannelEvent, DataChannelHandle, LocalAudioStream,
    PeerConnection, PeerConnectionHandle, PeerEvent, RtcBackend,
};
