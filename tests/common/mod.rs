//! Shared test helpers: an in-memory WebRTC backend and scripted signaling.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use parley::error::ParleyError;
use parley::realtime::{
    AudioTrack, ConnectionState, DataChannel, DataChannelEvent, DataChannelHandle,
    LocalAudioStream, PeerConnection, PeerConnectionHandle, PeerEvent, RealtimeConfiguration,
    RtcBackend, SdpSignaler,
};

pub const FAKE_ANSWER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=answer\r\n";

pub fn test_config() -> RealtimeConfiguration {
    RealtimeConfiguration::builder()
        .api_key("sk-test")
        .instructions("You are a Solana assistant.")
        .build()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within timeout");
}

pub struct FakeTrack {
    id: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl AudioTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

pub struct FakeMicrophone {
    pub tracks: Vec<Arc<FakeTrack>>,
}

impl FakeMicrophone {
    pub fn is_stopped(&self) -> bool {
        self.tracks.iter().all(|t| t.is_stopped())
    }
}

impl LocalAudioStream for FakeMicrophone {
    fn audio_tracks(&self) -> Vec<Arc<dyn AudioTrack>> {
        self.tracks
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn AudioTrack>)
            .collect()
    }
}

pub struct FakeDataChannel {
    label: String,
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<String>>,
    sends_left: Mutex<Option<usize>>,
}

impl FakeDataChannel {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Accept `n` more frames, then fail every send while staying open.
    pub fn fail_after(&self, n: usize) {
        *self.sends_left.lock().unwrap() = Some(n);
    }

    /// Every frame sent so far, decoded.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).expect("frames are JSON"))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|f| f["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl DataChannel for FakeDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.is_closed()
    }

    fn send_text(&self, frame: &str) -> Result<(), ParleyError> {
        if !self.is_open() {
            return Err(ParleyError::Transport("data channel closed".into()));
        }
        if let Some(left) = self.sends_left.lock().unwrap().as_mut() {
            if *left == 0 {
                return Err(ParleyError::Transport("send buffer full".into()));
            }
            *left -= 1;
        }
        self.sent.lock().unwrap().push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakePeer {
    auto_open: bool,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
    channel: Mutex<Option<(Arc<FakeDataChannel>, mpsc::UnboundedSender<DataChannelEvent>)>>,
    tracks: Mutex<Vec<String>>,
    remote_answer: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl FakePeer {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn tracks(&self) -> Vec<String> {
        self.tracks.lock().unwrap().clone()
    }

    pub fn remote_answer(&self) -> Option<String> {
        self.remote_answer.lock().unwrap().clone()
    }

    pub fn channel(&self) -> Arc<FakeDataChannel> {
        let guard = self.channel.lock().unwrap();
        Arc::clone(&guard.as_ref().expect("data channel created").0)
    }

    pub fn open_channel(&self) {
        let guard = self.channel.lock().unwrap();
        let (channel, tx) = guard.as_ref().expect("data channel created");
        channel.open.store(true, Ordering::SeqCst);
        let _ = tx.send(DataChannelEvent::Open);
    }

    pub fn close_channel(&self) {
        let guard = self.channel.lock().unwrap();
        let (channel, tx) = guard.as_ref().expect("data channel created");
        channel.open.store(false, Ordering::SeqCst);
        let _ = tx.send(DataChannelEvent::Closed);
    }

    /// Deliver a raw inbound frame.
    pub fn deliver(&self, frame: impl Into<String>) {
        let guard = self.channel.lock().unwrap();
        let (_, tx) = guard.as_ref().expect("data channel created");
        let _ = tx.send(DataChannelEvent::Message(frame.into()));
    }

    pub fn deliver_json(&self, frame: Value) {
        self.deliver(frame.to_string());
    }

    pub fn set_state(&self, state: ConnectionState) {
        let _ = self.peer_tx.send(PeerEvent::ConnectionState(state));
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_audio_track(&self, track: Arc<dyn AudioTrack>) -> Result<(), ParleyError> {
        self.tracks.lock().unwrap().push(track.id().to_string());
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> Result<DataChannelHandle, ParleyError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Arc::new(FakeDataChannel {
            label: label.to_string(),
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            sends_left: Mutex::new(None),
        });
        *self.channel.lock().unwrap() = Some((Arc::clone(&channel), tx));
        Ok(DataChannelHandle {
            channel,
            events: rx,
        })
    }

    async fn create_offer(&self) -> Result<String, ParleyError> {
        self.set_state(ConnectionState::Connecting);
        Ok("v=0\r\ns=offer\r\n".to_string())
    }

    async fn set_remote_answer(&self, sdp: &str) -> Result<(), ParleyError> {
        *self.remote_answer.lock().unwrap() = Some(sdp.to_string());
        self.set_state(ConnectionState::Connected);
        if self.auto_open {
            self.open_channel();
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory backend recording every resource it hands out.
#[derive(Default)]
pub struct FakeBackend {
    deny_microphone: AtomicBool,
    manual_open: AtomicBool,
    microphones: Mutex<Vec<Arc<FakeMicrophone>>>,
    peers: Mutex<Vec<Arc<FakePeer>>>,
    track_ids: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny_microphone(&self) {
        self.deny_microphone.store(true, Ordering::SeqCst);
    }

    /// Leave the data channel closed after negotiation until opened by hand.
    pub fn manual_open(&self) {
        self.manual_open.store(true, Ordering::SeqCst);
    }

    pub fn microphones(&self) -> Vec<Arc<FakeMicrophone>> {
        self.microphones.lock().unwrap().clone()
    }

    pub fn peers(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().unwrap().clone()
    }

    pub fn last_peer(&self) -> Arc<FakePeer> {
        self.peers().pop().expect("a peer connection was created")
    }

    pub fn last_microphone(&self) -> Arc<FakeMicrophone> {
        self.microphones().pop().expect("a microphone was opened")
    }
}

#[async_trait]
impl RtcBackend for FakeBackend {
    async fn open_microphone(&self) -> Result<Arc<dyn LocalAudioStream>, ParleyError> {
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(ParleyError::PermissionDenied(
                "microphone access was denied".into(),
            ));
        }
        let n = self.track_ids.fetch_add(1, Ordering::SeqCst);
        let microphone = Arc::new(FakeMicrophone {
            tracks: vec![Arc::new(FakeTrack {
                id: format!("mic-{n}"),
                enabled: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
            })],
        });
        self.microphones.lock().unwrap().push(Arc::clone(&microphone));
        Ok(microphone)
    }

    fn create_peer_connection(&self) -> Result<PeerConnectionHandle, ParleyError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(FakePeer {
            auto_open: !self.manual_open.load(Ordering::SeqCst),
            peer_tx: tx,
            channel: Mutex::new(None),
            tracks: Mutex::new(Vec::new()),
            remote_answer: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        self.peers.lock().unwrap().push(Arc::clone(&peer));
        Ok(PeerConnectionHandle {
            connection: peer,
            events: rx,
        })
    }
}

/// Signaler answering from a script instead of the network.
#[derive(Default)]
pub struct ScriptedSignaler {
    failure: Mutex<Option<ParleyError>>,
    offers: Mutex<Vec<String>>,
    hold: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedSignaler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next exchange with `error`.
    pub fn fail_with(&self, error: ParleyError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Block exchanges until [`release`](Self::release) is notified.
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn offers(&self) -> Vec<String> {
        self.offers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SdpSignaler for ScriptedSignaler {
    async fn exchange(
        &self,
        offer: &str,
        _config: &RealtimeConfiguration,
    ) -> Result<String, ParleyError> {
        self.offers.lock().unwrap().push(offer.to_string());
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(FAKE_ANSWER.to_string())
    }
}
