//! Persistent Agent Link
//!
//! Maintains one long-lived WebSocket connection to the war-room backend,
//! reassembles streamed response tokens, and recovers from transport loss
//! with doubling backoff. Consumers hold an [`AgentLink`] handle; all
//! transport work happens on a single background task.
//!
//! # Design Philosophy
//!
//! The link is an actor. Exactly one task owns the socket, the response
//! accumulator, and every timer, so frame handling never overlaps and the
//! teardown path can guarantee that no timer outlives the link. The handle
//! communicates with the actor through an unbounded command channel and
//! observes it through a `watch` channel carrying [`LinkState`] snapshots.
//!
//! Completion and error callbacks live in a swappable slot shared between
//! the handle and the actor. Replacing a callback never disturbs the
//! connection.
//!
//! # Lifecycle
//!
//! ```text
//!            +------------+   open    +------+
//!   spawn -->| Connecting |---------->| Open |
//!            +------------+           +------+
//!                  ^                   |    |
//!            sleep | delay        lost |    | close()
//!                  |                   v    v
//!            +------------+         +--------+
//!            |  Backoff   |<--------| Closed | (terminal)
//!            +------------+         +--------+
//! ```
//!
//! The reconnect delay starts at the configured floor, doubles after every
//! failed cycle, caps at the ceiling, and resets to the floor whenever a
//! connection opens. Retries continue until teardown.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::LinkConfig;
use crate::protocol::{
    classify, ActivityEvent, ActivityReport, GpuStatus, InboundFrame, OutboundFrame,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

// =============================================================================
// Observable State
// =============================================================================

/// Where the link is in its connection lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkPhase {
    /// A connect attempt is in flight
    Connecting,
    /// The transport is live
    Open,
    /// Waiting out the reconnect delay after a transport loss
    Backoff,
    /// Torn down; the link will not reconnect
    Closed,
}

/// Snapshot of the link published on the state channel
///
/// Transport loss flips only [`phase`](Self::phase); the response flags,
/// buffered text, and telemetry keep their last values so a reconnect does
/// not erase what the consumer is displaying.
#[derive(Clone, Debug)]
pub struct LinkState {
    /// Connection lifecycle phase
    pub phase: LinkPhase,
    /// A user message is in flight and no response fragment has arrived yet
    pub sending: bool,
    /// Response fragments are arriving
    pub streaming: bool,
    /// Contents of the response accumulator
    pub streaming_text: String,
    /// Latest GPU telemetry, if any has arrived
    pub gpu: Option<GpuStatus>,
}

impl LinkState {
    fn new() -> Self {
        Self {
            phase: LinkPhase::Connecting,
            sending: false,
            streaming: false,
            streaming_text: String::new(),
            gpu: None,
        }
    }

    /// Whether the transport is currently live
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == LinkPhase::Open
    }
}

// =============================================================================
// Callbacks
// =============================================================================

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct CallbackSlots {
    on_message_complete: Option<Callback>,
    on_error: Option<Callback>,
}

/// Swappable callback slots shared by the handle and the actor.
///
/// Invocation clones the `Arc` and drops the lock guard before calling, so
/// a callback may re-register callbacks without deadlocking.
#[derive(Clone, Default)]
struct CallbackHub {
    slots: Arc<RwLock<CallbackSlots>>,
}

impl CallbackHub {
    fn set_message_complete(&self, callback: Callback) {
        self.slots.write().on_message_complete = Some(callback);
    }

    fn set_error(&self, callback: Callback) {
        self.slots.write().on_error = Some(callback);
    }

    fn message_complete(&self, text: &str) {
        let callback = self.slots.read().on_message_complete.clone();
        if let Some(callback) = callback {
            callback(text);
        }
    }

    fn error(&self, message: &str) {
        let callback = self.slots.read().on_error.clone();
        if let Some(callback) = callback {
            callback(message);
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Commands from the handle to the actor task
enum Command {
    /// Transmit a user message
    Send(String),
    /// Swap the persona profile attached to subsequent messages
    SetProfile(String),
    /// Tear the link down
    Close,
}

/// Handle to a persistent connection to the backend agent
///
/// Created with [`AgentLink::connect`]; cheap to share by reference. The
/// connection itself lives on a background task and survives transport loss
/// transparently. Dropping the handle tears the connection down the same way
/// [`close`](Self::close) does, without waiting for the task to finish.
pub struct AgentLink {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<LinkState>,
    callbacks: CallbackHub,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AgentLink {
    /// Open a link to the backend agent
    ///
    /// Returns immediately; connecting, retrying, and heartbeating all happen
    /// on a spawned task, so this must be called from within a Tokio runtime.
    #[must_use]
    pub fn connect(config: LinkConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::new());
        let callbacks = CallbackHub::default();

        let actor = LinkActor {
            profile: config.profile.clone(),
            config,
            state: state_tx,
            callbacks: callbacks.clone(),
            accumulator: String::new(),
        };
        let task = tokio::spawn(actor.run(cmd_rx));

        Self {
            commands: cmd_tx,
            state_rx,
            callbacks,
            task: Mutex::new(Some(task)),
        }
    }

    /// Send a user message to the agent
    ///
    /// Returns immediately. A message that trims to empty is ignored with a
    /// log line. When the link is not open the registered error callback
    /// fires exactly once with `"Not connected to server"` and the transport
    /// is left untouched; the message is not queued for later.
    pub fn send(&self, text: &str) {
        if text.trim().is_empty() {
            tracing::warn!("Ignoring empty message");
            return;
        }

        if !self.state_rx.borrow().is_connected() {
            tracing::warn!("Send attempted while disconnected");
            self.callbacks.error("Not connected to server");
            return;
        }

        if self.commands.send(Command::Send(text.to_string())).is_err() {
            tracing::warn!("Link task has exited, dropping message");
        }
    }

    /// Swap the persona profile attached to subsequent messages
    pub fn set_profile(&self, profile: impl Into<String>) {
        if self.commands.send(Command::SetProfile(profile.into())).is_err() {
            tracing::debug!("Link task has exited, profile change dropped");
        }
    }

    /// Register the callback fired once per completed exchange
    ///
    /// Replaces any previous callback without disturbing the connection.
    pub fn on_message_complete<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.set_message_complete(Arc::new(callback));
    }

    /// Register the callback fired with advisory error messages
    ///
    /// Replaces any previous callback without disturbing the connection.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.set_error(Arc::new(callback));
    }

    /// Snapshot the current link state
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state_rx.borrow().clone()
    }

    /// Whether the transport is currently live
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Subscribe to link state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Tear the link down and wait for the background task to exit
    ///
    /// Reports the disconnect to the backend (best effort), closes the
    /// transport, and cancels every timer. Once this resolves no further
    /// callbacks fire and no further state is published. Idempotent. A
    /// connect attempt in flight delays this by at most the configured
    /// connect timeout.
    pub async fn close(&self) {
        if self.commands.send(Command::Close).is_err() {
            tracing::debug!("Link task already stopped");
        }

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Link task failed during shutdown");
            }
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// How a session or backoff wait ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Transport lost or delay elapsed; continue the reconnect loop
    Lost,
    /// Teardown requested; exit the actor
    Teardown,
}

/// The reconnect delay for the next cycle: doubled, capped at the ceiling
fn next_delay(current: Duration, ceiling: Duration) -> Duration {
    (current * 2).min(ceiling)
}

struct LinkActor {
    config: LinkConfig,
    profile: String,
    state: watch::Sender<LinkState>,
    callbacks: CallbackHub,
    accumulator: String,
}

impl LinkActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut delay = self.config.reconnect_floor;

        loop {
            self.publish(|s| s.phase = LinkPhase::Connecting);

            if let Some(stream) = self.try_connect().await {
                // A successful open resets the backoff to the floor
                delay = self.config.reconnect_floor;

                if self.drive_session(&mut commands, stream).await == SessionEnd::Teardown {
                    return;
                }
            }

            self.publish(|s| s.phase = LinkPhase::Backoff);
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");

            if self.wait_backoff(&mut commands, delay).await == SessionEnd::Teardown {
                return;
            }
            delay = next_delay(delay, self.config.reconnect_ceiling);
        }
    }

    /// One connect attempt, bounded by the configured timeout
    async fn try_connect(&self) -> Option<WsStream> {
        match time::timeout(self.config.connect_timeout, connect_async(self.config.url.as_str()))
            .await
        {
            Ok(Ok((stream, _response))) => Some(stream),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, url = %self.config.url, "Connect attempt failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    url = %self.config.url,
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "Connect attempt timed out"
                );
                None
            }
        }
    }

    /// Drive one live transport until it is lost or torn down
    async fn drive_session(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        stream: WsStream,
    ) -> SessionEnd {
        let (mut sink, mut reader): (WsSink, WsReader) = stream.split();

        self.publish(|s| s.phase = LinkPhase::Open);
        tracing::info!(url = %self.config.url, "Connected to backend agent");
        self.send_frame(
            &mut sink,
            &OutboundFrame::activity(ActivityReport::now(ActivityEvent::MobileConnected)),
        )
        .await;

        // First ping goes out one full interval after open
        let mut heartbeat = time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Grace timer that clears the accumulator after a finished exchange.
        // Armed by a finished frame, disarmed by the next send.
        let clear_timer = time::sleep(Duration::ZERO);
        tokio::pin!(clear_timer);
        let mut clear_armed = false;

        loop {
            tokio::select! {
                msg = reader.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_frame(&text, &mut sink).await {
                                clear_armed = true;
                                clear_timer
                                    .as_mut()
                                    .reset(Instant::now() + self.config.clear_grace);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::warn!("Connection lost");
                            return SessionEnd::Lost;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket error");
                            return SessionEnd::Lost;
                        }
                        Some(Ok(_)) => {} // binary and protocol-level ping/pong frames
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Send(text)) => {
                            clear_armed = false;
                            self.start_exchange(&text, &mut sink).await;
                        }
                        Some(Command::SetProfile(profile)) => {
                            tracing::debug!(profile = %profile, "Profile changed");
                            self.profile = profile;
                        }
                        Some(Command::Close) | None => {
                            self.teardown(&mut sink).await;
                            return SessionEnd::Teardown;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if !self.send_frame(&mut sink, &OutboundFrame::ping()).await {
                        tracing::debug!("Heartbeat ping failed");
                    }
                }
                () = &mut clear_timer, if clear_armed => {
                    clear_armed = false;
                    self.accumulator.clear();
                    self.publish(|s| s.streaming_text.clear());
                }
            }
        }
    }

    /// Wait out the reconnect delay, still answering commands
    async fn wait_backoff(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        delay: Duration,
    ) -> SessionEnd {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return SessionEnd::Lost,
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Send(_)) => {
                            // Raced a transport loss; same answer send() gives
                            self.callbacks.error("Not connected to server");
                        }
                        Some(Command::SetProfile(profile)) => {
                            self.profile = profile;
                        }
                        Some(Command::Close) | None => {
                            self.publish(|s| s.phase = LinkPhase::Closed);
                            tracing::info!("Link closed");
                            return SessionEnd::Teardown;
                        }
                    }
                }
            }
        }
    }

    /// Begin a new exchange: reset the buffer, report, transmit
    async fn start_exchange(&mut self, text: &str, sink: &mut WsSink) {
        self.accumulator.clear();
        self.publish(|s| {
            s.sending = true;
            s.streaming = false;
            s.streaming_text.clear();
        });

        self.send_frame(
            sink,
            &OutboundFrame::activity(
                ActivityReport::now(ActivityEvent::MobileRequestStart).with_message(text),
            ),
        )
        .await;

        let frame = OutboundFrame::user(text, self.profile.clone());
        if !self.send_frame(sink, &frame).await {
            self.publish(|s| s.sending = false);
            self.callbacks.error("Failed to send message");
        }
    }

    /// Handle one inbound text frame; returns whether to arm the clear timer
    async fn handle_frame(&mut self, raw: &str, sink: &mut WsSink) -> bool {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable frame");
                return false;
            }
        };

        let Some(frame) = classify(&value) else {
            tracing::debug!(frame = %value, "Dropping unrecognized frame");
            return false;
        };

        match frame {
            InboundFrame::StatusUpdate { gpu } => {
                self.publish(|s| s.gpu = Some(gpu));
                false
            }
            InboundFrame::SystemLog { message } => {
                tracing::info!(message = %message, "Server log");
                false
            }
            InboundFrame::Pong => {
                tracing::trace!("Heartbeat pong");
                false
            }
            InboundFrame::AgentToken { text } => {
                if !text.is_empty() {
                    self.accumulator.push_str(&text);
                    let snapshot = self.accumulator.clone();
                    self.publish(|s| {
                        s.sending = false;
                        s.streaming = true;
                        s.streaming_text = snapshot;
                    });
                }
                false
            }
            InboundFrame::AgentFinished { text, error, stats } => {
                self.finish_exchange(text, error, stats, sink).await;
                true
            }
            InboundFrame::SystemNotice { text } => {
                tracing::info!(text = ?text, "System notice");
                false
            }
        }
    }

    /// Complete the current exchange: report, then notify the consumer
    async fn finish_exchange(
        &mut self,
        text: Option<String>,
        error: bool,
        stats: Option<Value>,
        sink: &mut WsSink,
    ) {
        self.publish(|s| {
            s.streaming = false;
            s.sending = false;
        });

        let final_text = self.accumulator.clone();

        // The response report goes out before the consumer hears anything
        let mut report =
            ActivityReport::now(ActivityEvent::MobileResponse).with_message(final_text.clone());
        if let Some(stats) = stats {
            report = report.with_stats(stats);
        }
        self.send_frame(sink, &OutboundFrame::activity(report)).await;

        if error {
            let message = text
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Server error".to_string());
            tracing::warn!(message = %message, "Agent reported an error");
            self.callbacks.error(&message);
        } else if !final_text.is_empty() {
            self.callbacks.message_complete(&final_text);
        }
    }

    /// Orderly teardown of a live transport
    async fn teardown(&mut self, sink: &mut WsSink) {
        self.send_frame(
            sink,
            &OutboundFrame::activity(ActivityReport::now(ActivityEvent::MobileDisconnected)),
        )
        .await;
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "Close handshake failed");
        }
        self.publish(|s| s.phase = LinkPhase::Closed);
        tracing::info!("Link closed");
    }

    /// Transmit one frame; failures are reported to the caller, not retried
    async fn send_frame(&self, sink: &mut WsSink, frame: &OutboundFrame) -> bool {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode outbound frame");
                return false;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::debug!(error = %e, "WebSocket send failed");
            return false;
        }
        true
    }

    fn publish<F: FnOnce(&mut LinkState)>(&self, update: F) {
        self.state.send_modify(update);
    }
}

// =============================================================================
// Tests
// =============================================================================
