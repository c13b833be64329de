//! ElevenLabs conversational agent session over websocket
//!
//! Only session control and transcript events are handled here. Audio frames
//! travel between the browser and the provider and are ignored.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::events::SessionEvent;

use super::provider::{SessionSink, VoiceError, VoiceProvider};

#[derive(Debug, Deserialize)]
struct InitiationMetadata {
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserTranscription {
    user_transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    agent_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingEvent {
    event_id: u64,
}

/// Messages pushed by the provider that the widget cares about
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },
    UserTranscript {
        user_transcription_event: UserTranscription,
    },
    AgentResponse {
        agent_response_event: AgentResponse,
    },
    Ping {
        ping_event: PingEvent,
    },
    #[serde(other)]
    Other,
}

/// What to do with one inbound text frame
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Event(SessionEvent),
    Pong(String),
    Ignore,
}

fn parse_frame(text: &str) -> Inbound {
    let message = match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(?e, "unrecognized provider frame");
            return Inbound::Ignore;
        }
    };

    match message {
        ServerMessage::ConversationInitiationMetadata {
            conversation_initiation_metadata_event: meta,
        } => Inbound::Event(SessionEvent::Connected {
            conversation_id: meta.conversation_id,
        }),
        ServerMessage::UserTranscript {
            user_transcription_event: event,
        } => event
            .user_transcript
            .map(|text| Inbound::Event(SessionEvent::Message { text, is_user: true }))
            .unwrap_or(Inbound::Ignore),
        ServerMessage::AgentResponse {
            agent_response_event: event,
        } => event
            .agent_response
            .map(|text| Inbound::Event(SessionEvent::Message { text, is_user: false }))
            .unwrap_or(Inbound::Ignore),
        ServerMessage::Ping { ping_event } => Inbound::Pong(
            serde_json::json!({ "type": "pong", "event_id": ping_event.event_id }).to_string(),
        ),
        ServerMessage::Other => Inbound::Ignore,
    }
}

struct ActiveSession {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Voice provider backed by the ElevenLabs conversation websocket
pub struct ElevenLabsProvider {
    api_url: String,
    session: Option<ActiveSession>,
}

impl ElevenLabsProvider {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            session: None,
        }
    }

    fn session_url(&self, agent_id: &str) -> Result<Url, VoiceError> {
        Ok(Url::parse_with_params(&self.api_url, &[("agent_id", agent_id)])?)
    }
}

/// Connect, then pump provider frames into `sink` until closed from either side
async fn run_session(url: Url, sink: SessionSink, mut close_rx: oneshot::Receiver<()>) {
    let connect = async {
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut write, read) = stream.split();

        let init = serde_json::json!({ "type": "conversation_initiation_client_data" });
        write.send(Message::Text(init.to_string())).await?;
        Ok::<_, VoiceError>((write, read))
    };

    let (mut write, mut read) = tokio::select! {
        _ = &mut close_rx => {
            debug!("voice session closed during handshake");
            return;
        }
        result = connect => match result {
            Ok(halves) => halves,
            Err(e) => {
                error!(?e, "failed to open voice session");
                sink.try_emit(SessionEvent::ConnectFailed { reason: e.to_string() });
                return;
            }
        }
    };

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                debug!("closing voice session");
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!(?e, "failed to send close frame");
                }
                break;
            }
            frame = read.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        error!(?e, "voice session read failed");
                        sink.emit(SessionEvent::Error { message: e.to_string() }).await;
                        break;
                    }
                    None => break,
                };

                match message {
                    Message::Text(text) => match parse_frame(&text) {
                        Inbound::Event(event) => {
                            if !sink.emit(event).await {
                                warn!("widget dropped session events, closing");
                                break;
                            }
                        }
                        Inbound::Pong(reply) => {
                            if let Err(e) = write.send(Message::Text(reply)).await {
                                warn!(?e, "failed to answer ping");
                            }
                        }
                        Inbound::Ignore => {}
                    },
                    Message::Close(frame) => {
                        debug!(?frame, "provider closed session");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // the widget may be awaiting end_session, so never block here
    sink.try_emit(SessionEvent::Disconnected);
}

#[async_trait]
impl VoiceProvider for ElevenLabsProvider {
    fn start_session(&mut self, agent_id: &str, sink: SessionSink) -> Result<(), VoiceError> {
        if self.session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return Err(VoiceError::AlreadyConnected);
        }

        let url = self.session_url(agent_id)?;
        info!(host = ?url.host_str(), "opening voice session");

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(run_session(url, sink, close_rx));

        self.session = Some(ActiveSession { close_tx, task });
        Ok(())
    }

    async fn end_session(&mut self) -> Result<(), VoiceError> {
        let session = self.session.take().ok_or(VoiceError::NotConnected)?;
        let _ = session.close_tx.send(());
        if let Err(e) = session.task.await {
            warn!(?e, "voice session task ended abnormally");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_session_url_carries_agent() {
        let provider = ElevenLabsProvider::new("wss://example.com/v1/convai/conversation");
        let url = provider.session_url("agent-42").unwrap();
        assert_eq!(url.query(), Some("agent_id=agent-42"));
    }

    #[test]
    fn test_invalid_url() {
        let provider = ElevenLabsProvider::new("not a url");
        assert!(matches!(
            provider.session_url("a"),
            Err(VoiceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_parse_metadata() {
        let frame = r#"{"type":"conversation_initiation_metadata","conversation_initiation_metadata_event":{"conversation_id":"c-1","agent_output_audio_format":"pcm_16000"}}"#;
        assert_eq!(
            parse_frame(frame),
            Inbound::Event(SessionEvent::Connected {
                conversation_id: Some("c-1".to_string())
            })
        );
    }

    #[test]
    fn test_parse_transcripts() {
        let user = r#"{"type":"user_transcript","user_transcription_event":{"user_transcript":"hello"}}"#;
        assert_eq!(
            parse_frame(user),
            Inbound::Event(SessionEvent::Message {
                text: "hello".to_string(),
                is_user: true
            })
        );

        let agent = r#"{"type":"agent_response","agent_response_event":{"agent_response":"hi!"}}"#;
        assert_eq!(
            parse_frame(agent),
            Inbound::Event(SessionEvent::Message {
                text: "hi!".to_string(),
                is_user: false
            })
        );
    }

    #[test]
    fn test_ping_gets_pong() {
        let frame = r#"{"type":"ping","ping_event":{"event_id":7,"ping_ms":40}}"#;
        let Inbound::Pong(reply) = parse_frame(frame) else {
            panic!("expected pong");
        };
        let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["type"], "pong");
        assert_eq!(reply["event_id"], 7);
    }

    #[test]
    fn test_audio_and_garbage_ignored() {
        let audio = r#"{"type":"audio","audio_event":{"audio_base_64":"AAAA","event_id":1}}"#;
        assert_eq!(parse_frame(audio), Inbound::Ignore);
        assert_eq!(parse_frame("not json"), Inbound::Ignore);
    }

    #[tokio::test]
    async fn test_end_cancels_hung_handshake() {
        // accepts the TCP connection but never answers the upgrade
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepting = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
            drop(socket);
        });

        let (tx, mut rx) = mpsc::channel(8);
        let mut provider = ElevenLabsProvider::new(format!("ws://{}/v1/convai", addr));
        provider
            .start_session("agent-1", SessionSink::new(1, tx))
            .unwrap();
        assert!(matches!(
            provider.start_session("agent-1", SessionSink::new(2, mpsc::channel(1).0)),
            Err(VoiceError::AlreadyConnected)
        ));

        tokio::time::timeout(Duration::from_secs(5), provider.end_session())
            .await
            .expect("end_session should not wait for the handshake")
            .unwrap();
        assert!(rx.try_recv().is_err());
        accepting.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_reports_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, mut rx) = mpsc::channel(8);
        let mut provider = ElevenLabsProvider::new(format!("ws://{}/v1/convai", addr));
        provider
            .start_session("agent-1", SessionSink::new(7, tx))
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.session, 7);
        assert!(matches!(update.event, SessionEvent::ConnectFailed { .. }));

        // a finished session does not block the next start
        provider.end_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_without_session() {
        let mut provider = ElevenLabsProvider::new("wss://example.com");
        assert!(matches!(
            provider.end_session().await,
            Err(VoiceError::NotConnected)
        ));
    }
}
