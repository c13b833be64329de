//! Voice widget state machine
//!
//! Handles transitions between Disconnected, Connecting and Connected in
//! response to user actions and provider callbacks. Speaking is a short-lived
//! substate of Connected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::events::SessionEvent;
use crate::lifecycle::ReadyWatcher;

use super::provider::{SessionSink, SessionUpdate, VoiceError, VoiceProvider};
use super::transcript::{Transcript, TranscriptEntry};

/// Window after a button press during which further presses are ignored
pub const CONTROL_LOCK: Duration = Duration::from_millis(300);
/// How long a user message keeps the widget in Speaking
pub const SPEAKING_HOLD: Duration = Duration::from_secs(1);
/// Minimum spacing between manual reconnect attempts
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(3);
/// Pause between ending the old session and starting the new one on reconnect
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);
/// Entrance delay after the page reports it has finished loading
pub const ENTRANCE_DELAY: Duration = Duration::from_millis(500);

const MIC_DENIED: &str = "Microphone access was denied. Please check your browser settings.";
const START_FAILED: &str = "Unable to start voice assistant. Please try again.";
const MOBILE_START_FAILED: &str =
    "Unable to start voice assistant. Please check your microphone permissions.";
const STOP_FAILED: &str = "Failed to end conversation cleanly. Please try again.";
const PROVIDER_ERROR: &str = "Error connecting to voice service. Please try again.";

/// Connection state of the voice session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
        }
    }
}

/// What the panel shows: the connection state plus the Speaking substate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetStatus {
    Disconnected,
    Connecting,
    Connected,
    Speaking,
}

/// Platform class of the browser driving the widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Microphone is requested before the session is opened
    #[default]
    Desktop,
    /// Permission is left to the provider SDK
    Mobile,
}

/// Outcome of the browser's microphone prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MicrophonePermission {
    #[default]
    Granted,
    Denied,
}

/// Parameters of a start request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    pub platform: Platform,
    pub microphone: MicrophonePermission,
}

/// A connection state change, broadcast to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    /// Time spent in `from`
    pub duration_ms: u64,
}

impl std::fmt::Display for StatusChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} ({}ms)", self.from, self.to, self.duration_ms)
    }
}

/// Point-in-time view of the widget for the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSnapshot {
    pub ready: bool,
    pub open: bool,
    pub status: WidgetStatus,
    pub connection: ConnectionStatus,
    pub speaking: bool,
    pub transcript: Vec<TranscriptEntry>,
    pub error: Option<String>,
    pub controls_locked: bool,
}

/// User actions on the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Snapshot,
    Toggle,
    ClickOutside,
    Start(StartOptions),
    Stop,
    Reset,
    DismissError,
    Reconnect,
}

/// Result of a command: whether it took effect and the state afterwards
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub applied: bool,
    /// Set when a reconnect was refused by the cooldown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub snapshot: WidgetSnapshot,
}

/// A command paired with the channel its reply goes back on
pub struct Envelope {
    command: Command,
    reply: oneshot::Sender<Reply>,
}

/// Cloneable sender for driving a running widget
#[derive(Clone)]
pub struct WidgetHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WidgetHandle {
    /// Send a command and wait for the widget to process it
    pub async fn send(&self, command: Command) -> Result<Reply, VoiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| VoiceError::WidgetGone)?;
        rx.await.map_err(|_| VoiceError::WidgetGone)
    }
}

/// Create the command channel for a widget that will be `run`
pub fn command_channel(capacity: usize) -> (WidgetHandle, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity);
    (WidgetHandle { tx }, rx)
}

/// The voice assistant widget
///
/// Owns the session exclusively. Commands and provider callbacks are handled
/// one at a time on the widget's own task, so there is never more than one
/// transition in flight.
pub struct VoiceWidget<P> {
    agent_id: String,
    provider: P,
    ready: bool,
    open: bool,
    status: ConnectionStatus,
    status_entered_at: Instant,
    speaking_until: Option<Instant>,
    transcript: Transcript,
    error: Option<String>,
    controls_locked_until: Option<Instant>,
    last_reconnect: Option<Instant>,
    last_start: Option<StartOptions>,
    /// Id of the provider session this widget currently owns
    session: Option<u64>,
    next_session: u64,
    session_tx: mpsc::Sender<SessionUpdate>,
    session_rx: mpsc::Receiver<SessionUpdate>,
    status_tx: broadcast::Sender<StatusChange>,
}

impl<P: VoiceProvider> VoiceWidget<P> {
    /// Create a new widget
    pub fn new(
        agent_id: impl Into<String>,
        provider: P,
        status_tx: broadcast::Sender<StatusChange>,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::channel(64);
        Self {
            agent_id: agent_id.into(),
            provider,
            ready: false,
            open: false,
            status: ConnectionStatus::Disconnected,
            status_entered_at: Instant::now(),
            speaking_until: None,
            transcript: Transcript::new(),
            error: None,
            controls_locked_until: None,
            last_reconnect: None,
            last_start: None,
            session: None,
            next_session: 1,
            session_tx,
            session_rx,
            status_tx,
        }
    }

    /// Run the widget, processing commands and session callbacks
    ///
    /// Commands queue until the page reports it has loaded. The session is
    /// ended when the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Envelope>, ready: ReadyWatcher) {
        if !ready.is_ready() {
            debug!("waiting for initial load");
        }
        ready.wait().await;
        sleep(ENTRANCE_DELAY).await;
        self.ready = true;
        info!("voice widget ready");

        loop {
            tokio::select! {
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        break;
                    };
                    let reply_value = self.handle_command(command).await;
                    let _ = reply.send(reply_value);
                }
                Some(update) = self.session_rx.recv() => {
                    self.handle_session_event(update).await;
                }
            }
        }

        self.teardown().await;
        info!("voice widget stopped");
    }

    /// Apply one command and describe the result
    pub async fn handle_command(&mut self, command: Command) -> Reply {
        debug!(?command, "widget command");
        let mut retry_after_ms = None;
        let applied = match command {
            Command::Snapshot => true,
            Command::Toggle => self.toggle(),
            Command::ClickOutside => self.click_outside(),
            Command::Start(options) => self.start(options),
            Command::Stop => self.stop().await,
            Command::Reset => {
                self.reset().await;
                true
            }
            Command::DismissError => {
                self.error = None;
                true
            }
            Command::Reconnect => match self.reconnect().await {
                Ok(started) => started,
                Err(remaining) => {
                    retry_after_ms = Some(remaining.as_millis() as u64);
                    false
                }
            },
        };

        Reply {
            applied,
            retry_after_ms,
            snapshot: self.snapshot(),
        }
    }

    /// Take the 300ms control lock; false if a previous press still holds it
    fn acquire_controls(&mut self) -> bool {
        let now = Instant::now();
        if self.controls_locked_until.is_some_and(|until| now < until) {
            debug!("controls locked, ignoring press");
            return false;
        }
        self.controls_locked_until = Some(now + CONTROL_LOCK);
        true
    }

    /// Open or close the panel; the session is left alone
    pub fn toggle(&mut self) -> bool {
        if !self.acquire_controls() {
            return false;
        }
        self.open = !self.open;
        if self.open {
            debug!("panel opened");
        } else {
            info!(status = %self.status, "panel closed, session left running");
        }
        true
    }

    /// A press outside the open panel hides it; the session is left alone
    pub fn click_outside(&mut self) -> bool {
        if !self.open || !self.acquire_controls() {
            return false;
        }
        self.open = false;
        info!(status = %self.status, "clicked outside panel, closing UI");
        true
    }

    /// Start a conversation; only valid while Disconnected
    pub fn start(&mut self, options: StartOptions) -> bool {
        if self.status != ConnectionStatus::Disconnected {
            info!(status = %self.status, "session already active, ignoring start request");
            return false;
        }
        if !self.acquire_controls() {
            return false;
        }
        self.begin_session(options)
    }

    fn begin_session(&mut self, options: StartOptions) -> bool {
        if self.status != ConnectionStatus::Disconnected {
            info!(status = %self.status, "session already active, ignoring start request");
            return false;
        }

        self.last_start = Some(options);
        self.error = None;

        match options.platform {
            Platform::Desktop => {
                if options.microphone == MicrophonePermission::Denied {
                    warn!("microphone permission denied");
                    self.error = Some(MIC_DENIED.to_string());
                    return false;
                }
                debug!("microphone permission granted");
            }
            Platform::Mobile => {
                debug!("mobile platform, microphone permission left to provider");
            }
        }

        let session = self.next_session;
        self.next_session += 1;
        self.transition_to(ConnectionStatus::Connecting);
        info!(agent_id = %self.agent_id, session, "starting conversation session");

        let sink = SessionSink::new(session, self.session_tx.clone());
        match self.provider.start_session(&self.agent_id, sink) {
            Ok(()) => {
                debug!("session start requested, awaiting provider acknowledgement");
                self.session = Some(session);
                true
            }
            Err(e) => {
                warn!(?e, "failed to start conversation");
                self.error = Some(self.start_failure().to_string());
                self.transition_to(ConnectionStatus::Disconnected);
                false
            }
        }
    }

    fn start_failure(&self) -> &'static str {
        match self.last_start.unwrap_or_default().platform {
            Platform::Desktop => START_FAILED,
            Platform::Mobile => MOBILE_START_FAILED,
        }
    }

    /// End the conversation; a logged no-op unless Connected
    pub async fn stop(&mut self) -> bool {
        if self.status != ConnectionStatus::Connected {
            info!(status = %self.status, "not ending session");
            return false;
        }
        if !self.acquire_controls() {
            return false;
        }
        self.end_session().await;
        true
    }

    async fn end_session(&mut self) {
        info!(session = ?self.session, "ending conversation session");
        self.session = None;
        if let Err(e) = self.provider.end_session().await {
            warn!(?e, "failed to stop conversation");
            self.error = Some(STOP_FAILED.to_string());
        }
        self.transition_to(ConnectionStatus::Disconnected);
    }

    /// Force-end any session and clear transcript and error; does not restart
    pub async fn reset(&mut self) {
        info!(status = %self.status, "resetting conversation state");
        if self.session.take().is_some() {
            if let Err(e) = self.provider.end_session().await {
                warn!(?e, "error ending session during reset");
            }
        }

        self.transcript.clear();
        self.error = None;
        self.last_reconnect = None;
        self.speaking_until = None;
        self.transition_to(ConnectionStatus::Disconnected);
    }

    /// Manual reconnect
    ///
    /// `Ok` says whether a new session was started; `Err` carries the
    /// remaining cooldown.
    pub async fn reconnect(&mut self) -> Result<bool, Duration> {
        let now = Instant::now();
        if let Some(last) = self.last_reconnect {
            let elapsed = now.duration_since(last);
            if elapsed < RECONNECT_COOLDOWN {
                let remaining = RECONNECT_COOLDOWN - elapsed;
                info!(remaining_ms = remaining.as_millis() as u64, "reconnect cooling down");
                return Err(remaining);
            }
        }

        info!("manually reconnecting conversation");
        self.last_reconnect = Some(now);

        if self.status == ConnectionStatus::Connected {
            self.end_session().await;
        }

        sleep(RECONNECT_DELAY).await;
        Ok(self.begin_session(self.last_start.unwrap_or_default()))
    }

    /// Apply a provider callback
    ///
    /// Callbacks from a session that has already been ended or replaced are
    /// dropped.
    pub async fn handle_session_event(&mut self, update: SessionUpdate) {
        let SessionUpdate { session, event } = update;
        if self.session != Some(session) {
            debug!(session, %event, "dropping event from ended session");
            return;
        }

        debug!(%event, "session event");
        match event {
            SessionEvent::Connected { conversation_id } => {
                info!(?conversation_id, "connected to voice provider");
                self.error = None;
                self.transition_to(ConnectionStatus::Connected);
            }
            SessionEvent::Disconnected => {
                info!("disconnected from voice provider");
                self.release_session().await;
            }
            SessionEvent::ConnectFailed { reason } => {
                warn!(%reason, "failed to start conversation");
                self.release_session().await;
                self.error = Some(self.start_failure().to_string());
            }
            SessionEvent::Message { text, is_user } => {
                if self.transcript.push(text, is_user) && is_user {
                    self.speaking_until = Some(Instant::now() + SPEAKING_HOLD);
                }
            }
            SessionEvent::Error { message } => {
                warn!(%message, "voice provider error");
                self.error = Some(PROVIDER_ERROR.to_string());
            }
        }
    }

    /// Forget a session the provider ended on its own
    async fn release_session(&mut self) {
        if self.session.take().is_some() {
            if let Err(e) = self.provider.end_session().await {
                debug!(?e, "provider session already released");
            }
        }
        self.transition_to(ConnectionStatus::Disconnected);
    }

    fn is_speaking(&self) -> bool {
        self.status == ConnectionStatus::Connected
            && self
                .speaking_until
                .is_some_and(|until| Instant::now() < until)
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        let speaking = self.is_speaking();
        let status = match self.status {
            ConnectionStatus::Disconnected => WidgetStatus::Disconnected,
            ConnectionStatus::Connecting => WidgetStatus::Connecting,
            ConnectionStatus::Connected if speaking => WidgetStatus::Speaking,
            ConnectionStatus::Connected => WidgetStatus::Connected,
        };

        WidgetSnapshot {
            ready: self.ready,
            open: self.open,
            status,
            connection: self.status,
            speaking,
            transcript: self.transcript.entries().to_vec(),
            error: self.error.clone(),
            controls_locked: self
                .controls_locked_until
                .is_some_and(|until| Instant::now() < until),
        }
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_status: ConnectionStatus) {
        let old_status = self.status;
        if old_status == new_status {
            return;
        }

        let change = StatusChange {
            from: old_status,
            to: new_status,
            duration_ms: self.status_entered_at.elapsed().as_millis() as u64,
        };
        debug!(%change, "status transition");

        self.status = new_status;
        self.status_entered_at = Instant::now();
        if new_status != ConnectionStatus::Connected {
            self.speaking_until = None;
        }

        let _ = self.status_tx.send(change);
    }

    /// Ends any session still owned, including one stuck in its handshake
    async fn teardown(&mut self) {
        if self.session.take().is_some() {
            info!(status = %self.status, "cleaning up conversation on teardown");
            if let Err(e) = self.provider.end_session().await {
                warn!(?e, "error ending conversation on teardown");
            }
            self.transition_to(ConnectionStatus::Disconnected);
        }
    }
}
