//! Realtime voice session over WebRTC.
//!
//! [`RealtimeSessionManager`] owns at most one live session: microphone
//! stream, peer connection, and the `oai-events` data channel. Inbound
//! frames are reduced into [`LiveState`] on a dedicated task in arrival
//! order; tool calls are handed to the [`ToolCallBridge`] on their own tasks.
//!
//! Every session is stamped with an epoch. Stopping bumps the epoch, so
//! work that outlives its session (a slow tool, an in-flight SDP exchange)
//! finds a different epoch when it completes and becomes a no-op.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bridge::{self, ToolCallBridge, ToolCallOutbound};
use super::client_events::ClientEvent;
use super::config::RealtimeConfiguration;
use super::decoder::{reduce, ConversationState, ReducerEffect};
use super::events::ServerEvent;
use super::signaling::{HttpSignaler, SdpSignaler};
use super::state::{ConnectionState, EventDirection, EventLog, EventLogEntry, LiveState};
use super::transport::{
    DataChannel, DataChannelEvent, DataChannelHandle, LocalAudioStream, PeerConnection,
    PeerConnectionHandle, PeerEvent, RtcBackend,
};
use crate::error::ParleyError;
use crate::tools::{ToolRegistry, ToolResult};
use crate::types::{Message, MessageSink, ToolInvocation};
use crate::util::timeout::with_timeout;

/// Host application lifecycle, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

/// Manages the lifecycle of a single realtime voice session.
pub struct RealtimeSessionManager {
    config: RealtimeConfiguration,
    backend: Arc<dyn RtcBackend>,
    signaler: Arc<dyn SdpSignaler>,
    bridge: Arc<ToolCallBridge>,
    shared: Arc<SessionShared>,
    lifecycle: tokio::sync::Mutex<()>,
}

#[bon::bon]
impl RealtimeSessionManager {
    /// Build a manager.
    ///
    /// Signaling defaults to [`HttpSignaler`]; the message sink is optional,
    /// finalized messages are always readable through [`messages`](Self::messages).
    #[builder]
    pub fn new(
        config: RealtimeConfiguration,
        backend: Arc<dyn RtcBackend>,
        #[builder(default)] tools: ToolRegistry,
        signaler: Option<Arc<dyn SdpSignaler>>,
        message_sink: Option<Arc<dyn MessageSink>>,
    ) -> Self {
        let tools = Arc::new(tools);
        let bridge = Arc::new(ToolCallBridge::new(Arc::clone(&tools), config.tool_timeout));
        let shared = Arc::new(SessionShared::new(&config, tools, message_sink));
        Self {
            config,
            backend,
            signaler: signaler.unwrap_or_else(|| Arc::new(HttpSignaler::new())),
            bridge,
            shared,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }
}

impl RealtimeSessionManager {
    /// Establish a new session, tearing down any existing one first.
    ///
    /// On failure every resource acquired so far is released before the
    /// error is returned. A [`stop_session`](Self::stop_session) issued
    /// while this is suspended makes it return [`ParleyError::Cancelled`].
    pub async fn start_session(&self) -> Result<(), ParleyError> {
        self.config.validate()?;
        let _lifecycle = self.lifecycle.lock().await;

        if self.shared.teardown(None) {
            info!("tore down previous realtime session before restart");
        }
        let (epoch, cancel) = self.shared.begin();
        info!(epoch, model = %self.config.model, "starting realtime session");

        match self.establish(epoch, cancel).await {
            Ok(()) => {
                info!(epoch, "realtime session negotiated");
                Ok(())
            }
            Err(error) => {
                warn!(
                    epoch,
                    %error,
                    category = %error.category(),
                    "realtime session failed to start"
                );
                self.shared.teardown(Some(epoch));
                Err(error)
            }
        }
    }

    async fn establish(&self, epoch: u64, cancel: CancellationToken) -> Result<(), ParleyError> {
        let microphone = self.backend.open_microphone().await?;
        if let Err(error) = self
            .shared
            .attach(epoch, |r| r.microphone = Some(Arc::clone(&microphone)))
        {
            microphone.stop();
            return Err(error);
        }
        let Some(track) = microphone.audio_tracks().into_iter().next() else {
            return Err(ParleyError::Transport(
                "Microphone stream has no audio track".into(),
            ));
        };

        let PeerConnectionHandle {
            connection: peer,
            events: peer_events,
        } = self.backend.create_peer_connection()?;
        if let Err(error) = self.shared.attach(epoch, |r| r.peer = Some(Arc::clone(&peer))) {
            peer.close();
            return Err(error);
        }
        self.shared.spawn_peer_pump(epoch, cancel.clone(), peer_events);
        peer.add_audio_track(track)?;

        let DataChannelHandle {
            channel,
            events: channel_events,
        } = peer.create_data_channel(&self.config.data_channel_label)?;
        if let Err(error) = self
            .shared
            .attach(epoch, |r| r.channel = Some(Arc::clone(&channel)))
        {
            channel.close();
            return Err(error);
        }
        self.shared.spawn_channel_pump(
            epoch,
            cancel,
            Arc::clone(&self.bridge),
            channel_events,
        );

        let offer = peer.create_offer().await?;
        self.shared.ensure_current(epoch)?;

        let answer = with_timeout(
            self.config.signaling_timeout,
            self.signaler.exchange(&offer, &self.config),
        )
        .await?;
        self.shared.ensure_current(epoch)?;

        peer.set_remote_answer(&answer).await?;
        self.shared.ensure_current(epoch)
    }

    /// Tear down the current session, if any. Safe to call repeatedly.
    pub fn stop_session(&self) {
        if self.shared.teardown(None) {
            info!("realtime session stopped");
        }
    }

    /// Flip the enabled flag of the first microphone track.
    ///
    /// Returns the resulting mute flag; without a track nothing changes.
    pub fn toggle_mute(&self) -> bool {
        self.shared.toggle_mute()
    }

    /// Send a typed user message and ask the model to respond.
    ///
    /// No local [`Message`] is appended; the caller owns any echo.
    pub fn send_message(&self, text: &str) {
        if !self.shared.is_active() {
            warn!("cannot send message, realtime session is not active");
            return;
        }
        if let Err(error) = self
            .shared
            .send_frames(None, &[ClientEvent::user_text(text), ClientEvent::response_create()])
        {
            warn!(%error, "failed to send message");
        }
    }

    /// Run a tool call against the current session's data channel.
    pub async fn handle_tool_call(
        &self,
        call_id: &str,
        tool_name: &str,
        raw_arguments: &str,
    ) -> ToolInvocation {
        let outbound = EpochOutbound {
            shared: Arc::clone(&self.shared),
            epoch: self.shared.current_epoch(),
        };
        self.bridge
            .handle_tool_call(&outbound, call_id, tool_name, raw_arguments)
            .await
    }

    /// Send a tool result followed by `response.create`.
    ///
    /// Returns `false` when the data channel is not open.
    pub fn send_tool_call_response(&self, call_id: &str, result: &ToolResult) -> bool {
        let outbound = EpochOutbound {
            shared: Arc::clone(&self.shared),
            epoch: self.shared.current_epoch(),
        };
        bridge::send_tool_call_response(&outbound, call_id, result)
    }

    /// React to the host app changing lifecycle state.
    pub fn handle_app_state(&self, state: AppState) {
        if state == AppState::Background {
            debug!("app moved to background");
            self.stop_session();
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.shared.connection_tx.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection_tx.subscribe()
    }

    pub fn live_state(&self) -> LiveState {
        self.shared.live_tx.borrow().clone()
    }

    pub fn watch_live_state(&self) -> watch::Receiver<LiveState> {
        self.shared.live_tx.subscribe()
    }

    pub fn is_muted(&self) -> bool {
        *self.shared.muted_tx.borrow()
    }

    pub fn watch_muted(&self) -> watch::Receiver<bool> {
        self.shared.muted_tx.subscribe()
    }

    /// Whether the data channel of the current session is open.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn watch_active(&self) -> watch::Receiver<bool> {
        self.shared.active_tx.subscribe()
    }

    /// Finalized messages of the current session, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    /// Recent frames in both directions, oldest first.
    pub fn events(&self) -> Vec<EventLogEntry> {
        self.shared.lock().events.snapshot()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.bridge.tools()
    }
}

impl Drop for RealtimeSessionManager {
    fn drop(&mut self) {
        self.shared.teardown(None);
    }
}

/// Resources held by the live session; each slot fills as startup proceeds.
#[derive(Default)]
struct SessionResources {
    cancel: CancellationToken,
    microphone: Option<Arc<dyn LocalAudioStream>>,
    peer: Option<Arc<dyn PeerConnection>>,
    channel: Option<Arc<dyn DataChannel>>,
}

impl SessionResources {
    fn release(self) {
        self.cancel.cancel();
        if let Some(channel) = self.channel {
            channel.close();
        }
        if let Some(microphone) = self.microphone {
            microphone.stop();
        }
        if let Some(peer) = self.peer {
            peer.close();
        }
    }
}

struct SessionInner {
    epoch: u64,
    resources: Option<SessionResources>,
    conversation: ConversationState,
    messages: Vec<Message>,
    events: EventLog,
    muted: bool,
    active: bool,
}

/// State reachable from the manager and from its background tasks.
///
/// Watch values are only published while `inner` is locked, so a publish
/// from a stale task cannot land after the teardown that retired it.
struct SessionShared {
    inner: Mutex<SessionInner>,
    connection_tx: watch::Sender<ConnectionState>,
    live_tx: watch::Sender<LiveState>,
    muted_tx: watch::Sender<bool>,
    active_tx: watch::Sender<bool>,
    config: RealtimeConfiguration,
    tools: Arc<ToolRegistry>,
    sink: Option<Arc<dyn MessageSink>>,
}

impl SessionShared {
    fn new(
        config: &RealtimeConfiguration,
        tools: Arc<ToolRegistry>,
        sink: Option<Arc<dyn MessageSink>>,
    ) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                epoch: 0,
                resources: None,
                conversation: ConversationState::default(),
                messages: Vec::new(),
                events: EventLog::new(config.event_log_capacity),
                muted: false,
                active: false,
            }),
            connection_tx: watch::channel(ConnectionState::Closed).0,
            live_tx: watch::channel(LiveState::default()).0,
            muted_tx: watch::channel(false).0,
            active_tx: watch::channel(false).0,
            config: config.clone(),
            tools,
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Open a fresh epoch with empty resource slots.
    fn begin(&self) -> (u64, CancellationToken) {
        let mut inner = self.lock();
        inner.epoch += 1;
        let resources = SessionResources::default();
        let cancel = resources.cancel.clone();
        inner.resources = Some(resources);
        reset_conversation(&mut inner);
        let epoch = inner.epoch;
        self.connection_tx.send_replace(ConnectionState::New);
        self.publish_reset();
        drop(inner);

        (epoch, cancel)
    }

    /// Release the session, optionally only if it still belongs to `expected`.
    ///
    /// Returns whether a session was torn down.
    fn teardown(&self, expected: Option<u64>) -> bool {
        let mut inner = self.lock();
        if expected.is_some_and(|epoch| epoch != inner.epoch) {
            return false;
        }
        let resources = inner.resources.take();
        if resources.is_some() {
            inner.epoch += 1;
        }
        reset_conversation(&mut inner);
        self.connection_tx.send_replace(ConnectionState::Closed);
        self.publish_reset();
        drop(inner);

        if let Some(resources) = &resources {
            debug!(
                has_channel = resources.channel.is_some(),
                has_peer = resources.peer.is_some(),
                has_microphone = resources.microphone.is_some(),
                "releasing realtime session resources"
            );
        }
        resources.map(SessionResources::release).is_some()
    }

    fn publish_connection_state(&self, epoch: u64, state: ConnectionState) -> bool {
        let inner = self.lock();
        if inner.epoch != epoch || inner.resources.is_none() {
            return false;
        }
        self.connection_tx.send_replace(state);
        true
    }

    fn publish_reset(&self) {
        self.live_tx.send_replace(LiveState::default());
        self.muted_tx.send_replace(false);
        self.active_tx.send_replace(false);
    }

    fn attach(
        &self,
        epoch: u64,
        slot: impl FnOnce(&mut SessionResources),
    ) -> Result<(), ParleyError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.resources.as_mut() {
            Some(resources) if inner.epoch == epoch => {
                slot(resources);
                Ok(())
            }
            _ => Err(cancelled()),
        }
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), ParleyError> {
        let inner = self.lock();
        if inner.epoch == epoch && inner.resources.is_some() {
            Ok(())
        } else {
            Err(cancelled())
        }
    }

    fn toggle_mute(&self) -> bool {
        let mut inner = self.lock();
        let track = inner
            .resources
            .as_ref()
            .and_then(|r| r.microphone.as_ref())
            .and_then(|m| m.audio_tracks().into_iter().next());
        let Some(track) = track else {
            debug!("toggle_mute ignored, no local audio track");
            return inner.muted;
        };
        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        inner.muted = !enabled;
        self.muted_tx.send_replace(inner.muted);
        inner.muted
    }

    /// Send frames as one uninterrupted sequence on the open data channel.
    ///
    /// With `epoch` set, the frames are only sent if that session is still
    /// the current one.
    fn send_frames(&self, epoch: Option<u64>, frames: &[ClientEvent]) -> Result<(), ParleyError> {
        let mut inner = self.lock();
        if epoch.is_some_and(|epoch| epoch != inner.epoch) {
            return Err(ParleyError::InvalidState(
                "Realtime session is no longer active".into(),
            ));
        }
        let channel = inner
            .resources
            .as_ref()
            .and_then(|r| r.channel.clone())
            .filter(|c| c.is_open())
            .ok_or_else(|| ParleyError::InvalidState("Data channel is not open".into()))?;

        let payloads = frames
            .iter()
            .map(ClientEvent::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        for (sent, (frame, payload)) in frames.iter().zip(payloads).enumerate() {
            if let Err(error) = channel.send_text(&payload.to_string()) {
                if sent > 0 {
                    warn!(
                        sent,
                        total = frames.len(),
                        event_type = frame.event_type(),
                        %error,
                        "frame sequence interrupted after partial send"
                    );
                }
                return Err(error);
            }
            debug!(event_type = frame.event_type(), "sent frame");
            inner
                .events
                .record(EventDirection::Outbound, frame.event_type(), payload);
        }
        Ok(())
    }

    fn append_message(&self, epoch: u64, message: Message) {
        let mut inner = self.lock();
        if inner.epoch != epoch || inner.resources.is_none() {
            debug!("dropping message for a stopped session");
            return;
        }
        inner.messages.push(message.clone());
        drop(inner);

        if let Some(sink) = &self.sink {
            sink.append(message);
        }
    }

    fn on_channel_open(&self, epoch: u64) {
        {
            let mut inner = self.lock();
            if inner.epoch != epoch || inner.resources.is_none() {
                return;
            }
            inner.active = true;
            self.active_tx.send_replace(true);
        }
        info!(epoch, "data channel open");

        let update = ClientEvent::session_update(&self.config, self.tools.definitions());
        if let Err(error) = self.send_frames(Some(epoch), &[update]) {
            warn!(%error, "failed to send session.update");
        }
    }

    fn on_channel_closed(&self, epoch: u64) {
        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return;
            }
            inner.active = false;
            self.active_tx.send_replace(false);
        }
        info!(epoch, "data channel closed");
    }

    fn on_frame(&self, epoch: u64, frame: &str) -> Option<ReducerEffect> {
        let (event, payload) = match ServerEvent::decode(frame) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(%error, "dropping realtime frame");
                return None;
            }
        };

        let mut inner = self.lock();
        if inner.epoch != epoch || inner.resources.is_none() {
            return None;
        }
        inner
            .events
            .record(EventDirection::Inbound, event.event_type(), payload);
        match &event {
            ServerEvent::Error { message } => warn!(detail = %message, "realtime server error"),
            ServerEvent::Unknown { event_type } => {
                debug!(event_type = %event_type, "ignoring frame");
            }
            other => debug!(event_type = other.event_type(), "received frame"),
        }
        let effect = reduce(&mut inner.conversation, &event);
        let live = &inner.conversation.live;
        self.live_tx.send_if_modified(|current| {
            if *current == *live {
                false
            } else {
                *current = live.clone();
                true
            }
        });
        effect
    }

    fn spawn_channel_pump(
        self: &Arc<Self>,
        epoch: u64,
        cancel: CancellationToken,
        bridge: Arc<ToolCallBridge>,
        mut events: mpsc::UnboundedReceiver<DataChannelEvent>,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                match event {
                    DataChannelEvent::Open => shared.on_channel_open(epoch),
                    DataChannelEvent::Closed => shared.on_channel_closed(epoch),
                    DataChannelEvent::Error(message) => {
                        warn!(epoch, detail = %message, "data channel error");
                    }
                    DataChannelEvent::Message(text) => match shared.on_frame(epoch, &text) {
                        Some(ReducerEffect::AppendMessage(message)) => {
                            shared.append_message(epoch, message);
                        }
                        Some(ReducerEffect::InvokeTool {
                            call_id,
                            name,
                            arguments,
                        }) => {
                            let outbound = EpochOutbound {
                                shared: Arc::clone(&shared),
                                epoch,
                            };
                            let bridge = Arc::clone(&bridge);
                            tokio::spawn(async move {
                                bridge
                                    .handle_tool_call(&outbound, &call_id, &name, &arguments)
                                    .await;
                            });
                        }
                        None => {}
                    },
                }
            }
            debug!(epoch, "data channel pump finished");
        });
    }

    fn spawn_peer_pump(
        self: &Arc<Self>,
        epoch: u64,
        cancel: CancellationToken,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                match event {
                    PeerEvent::ConnectionState(state) => {
                        if !shared.publish_connection_state(epoch, state) {
                            break;
                        }
                        info!(epoch, state = %state, "peer connection state changed");
                        if state == ConnectionState::Failed {
                            warn!(epoch, "peer connection failed, tearing down session");
                            shared.teardown(Some(epoch));
                            break;
                        }
                    }
                    PeerEvent::RemoteAudioTrack { track_id } => {
                        debug!(epoch, track_id = %track_id, "remote audio track attached");
                    }
                }
            }
        });
    }
}

fn reset_conversation(inner: &mut SessionInner) {
    inner.conversation = ConversationState::default();
    inner.messages.clear();
    inner.events.clear();
    inner.muted = false;
    inner.active = false;
}

fn cancelled() -> ParleyError {
    ParleyError::Cancelled("Realtime session was stopped during startup".into())
}

/// Bridge output bound to one session epoch.
struct EpochOutbound {
    shared: Arc<SessionShared>,
    epoch: u64,
}

impl ToolCallOutbound for EpochOutbound {
    fn send_frames(&self, frames: &[ClientEvent]) -> Result<(), ParleyError> {
        self.shared.send_frames(Some(self.epoch), frames)
    }

    fn append_message(&self, message: Message) {
        self.shared.append_message(self.epoch, message);
    }
}
