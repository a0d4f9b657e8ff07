//! Abstractions over the platform WebRTC stack.
//!
//! The session manager owns exactly one of each resource per session and
//! drives them only through these traits. Event receivers are created
//! together with the object that emits into them, so nothing the remote
//! side sends can arrive before a consumer exists; unread events queue.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::state::ConnectionState;
use crate::error::ParleyError;

/// Events emitted by a data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChannelEvent {
    Open,
    Message(String),
    Closed,
    Error(String),
}

/// Events emitted by a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    ConnectionState(ConnectionState),
    /// The remote side started sending audio; playback is the platform's job.
    RemoteAudioTrack { track_id: String },
}

/// A local microphone track.
pub trait AudioTrack: Send + Sync {
    fn id(&self) -> &str;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    /// Stop capture and release the device.
    fn stop(&self);
}

/// A captured microphone stream.
pub trait LocalAudioStream: Send + Sync {
    fn audio_tracks(&self) -> Vec<Arc<dyn AudioTrack>>;

    /// Stop every track in the stream.
    fn stop(&self) {
        for track in self.audio_tracks() {
            track.stop();
        }
    }
}

/// Bidirectional text channel carrying JSON frames.
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;
    fn is_open(&self) -> bool;
    fn send_text(&self, frame: &str) -> Result<(), ParleyError>;
    fn close(&self);
}

/// A data channel with its event stream.
pub struct DataChannelHandle {
    pub channel: Arc<dyn DataChannel>,
    pub events: mpsc::UnboundedReceiver<DataChannelEvent>,
}

/// A peer connection with its event stream.
pub struct PeerConnectionHandle {
    pub connection: Arc<dyn PeerConnection>,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn add_audio_track(&self, track: Arc<dyn AudioTrack>) -> Result<(), ParleyError>;

    fn create_data_channel(&self, label: &str) -> Result<DataChannelHandle, ParleyError>;

    /// Create an SDP offer and apply it as the local description.
    async fn create_offer(&self) -> Result<String, ParleyError>;

    async fn set_remote_answer(&self, sdp: &str) -> Result<(), ParleyError>;

    fn close(&self);
}

/// Factory for the platform resources a session needs.
#[async_trait]
pub trait RtcBackend: Send + Sync {
    /// Acquire microphone permission and open a capture stream.
    ///
    /// Denial should surface as [`ParleyError::PermissionDenied`].
    async fn open_microphone(&self) -> Result<Arc<dyn LocalAudioStream>, ParleyError>;

    fn create_peer_connection(&self) -> Result<PeerConnectionHandle, ParleyError>;
}
