//! Conversation provider binding
//!
//! The provider owns the audio transport. The widget only starts and ends
//! sessions; everything else arrives as [`SessionEvent`]s on the sink it
//! hands over at start.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::SessionEvent;

/// Errors that can occur while driving a voice session
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("a session is already open")]
    AlreadyConnected,

    #[error("no session is open")]
    NotConnected,

    #[error("failed to build session url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("session transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("voice widget is no longer running")]
    WidgetGone,
}

/// A provider callback tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub session: u64,
    pub event: SessionEvent,
}

/// Delivery side of one session's callbacks
#[derive(Debug, Clone)]
pub struct SessionSink {
    session: u64,
    tx: mpsc::Sender<SessionUpdate>,
}

impl SessionSink {
    pub fn new(session: u64, tx: mpsc::Sender<SessionUpdate>) -> Self {
        Self { session, tx }
    }

    /// Deliver an event; false once the widget is gone
    pub async fn emit(&self, event: SessionEvent) -> bool {
        self.tx
            .send(SessionUpdate {
                session: self.session,
                event,
            })
            .await
            .is_ok()
    }

    /// Deliver without waiting for room in the channel
    pub fn try_emit(&self, event: SessionEvent) -> bool {
        let delivered = self
            .tx
            .try_send(SessionUpdate {
                session: self.session,
                event,
            })
            .is_ok();
        if !delivered {
            debug!(session = self.session, "session event dropped");
        }
        delivered
    }
}

#[async_trait]
pub trait VoiceProvider: Send {
    /// Begin opening a session for `agent_id`
    ///
    /// Must return without waiting on the network. The outcome of the
    /// handshake, including failure to connect, is reported on `sink`.
    fn start_session(&mut self, agent_id: &str, sink: SessionSink) -> Result<(), VoiceError>;

    /// Close the open session, cancelling a handshake still in progress
    async fn end_session(&mut self) -> Result<(), VoiceError>;
}
