//! Session Event Surface
//!
//! Messages pushed to the presentation layer as the session changes. The
//! conversation log itself is the single source of truth for the transcript;
//! these events only signal state the layer cannot derive from it.

use crate::session::SessionState;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// Events emitted by the session for a presentation layer.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The lifecycle state changed.
    StateChanged { state: SessionState },
    /// An utterance began synthesis.
    SpeakingStarted { text: String },
    /// The queue drained or was interrupted.
    SpeakingEnded,
    /// The microphone flag changed.
    MicrophoneChanged { active: bool },
    /// A surfaced failure (connect errors and absorbed per-turn failures).
    Error { message: String },
}

/// A cloneable, optional event channel.
///
/// Sessions constructed with [`EventSink::disabled`] run silently; otherwise
/// events flow over an unbounded channel so emitting never blocks session
/// logic on a slow consumer.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                warn!("Event receiver dropped; discarding session event.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SessionEvent::SpeakingStarted {
            text: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"speaking_started","text":"hello"}"#);

        let state = SessionEvent::StateChanged {
            state: SessionState::Active,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"type":"state_changed","state":"active"}"#);
    }

    #[test]
    fn test_disabled_sink_discards_silently() {
        let sink = EventSink::disabled();
        sink.emit(SessionEvent::SpeakingEnded);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(SessionEvent::SpeakingStarted {
            text: "a".to_string(),
        });
        sink.emit(SessionEvent::SpeakingEnded);

        match rx.recv().await.unwrap() {
            SessionEvent::SpeakingStarted { text } => assert_eq!(text, "a"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::SpeakingEnded));
    }
}
