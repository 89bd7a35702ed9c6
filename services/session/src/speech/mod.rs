//! Speech Capability Contracts
//!
//! The narrow async boundary the session core drives the speech engine
//! through: construct-from-credentials, continuous recognition with an event
//! subscription, markup synthesis with an explicit outcome, and in-progress
//! stop. Implementations wrap whatever vendor SDK provides the capability;
//! the orchestration layer never sees past these traits.

pub mod queue;
pub mod relay;
pub mod ssml;

use crate::config::Config;
use crate::transport::MediaTransport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome the synthesis engine reports for one utterance.
///
/// A reported failure is distinct from a thrown error; both are absorbed by
/// the speech queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Completed,
    Failed { reason: String },
}

/// Events delivered by the recognizer subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A final recognition result.
    Recognized { text: String },
    /// An interim (partial) result; diagnostics only.
    Recognizing { text: String },
    /// The recognizer reported a cancellation or error; diagnostics only.
    Canceled { reason: String },
}

/// Text-to-speech synthesis plus the media-session negotiation the remote
/// avatar rides on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes one utterance from markup, returning the engine-reported
    /// outcome.
    async fn speak_markup(&self, markup: &str) -> Result<SynthesisOutcome>;

    /// Halts in-progress audio.
    async fn stop_speaking(&self) -> Result<()>;

    /// Negotiates the remote media session over the given transport.
    async fn start_media_session(&self, transport: Arc<dyn MediaTransport>) -> Result<()>;

    /// Releases the underlying engine resources.
    async fn close(&self);
}

/// Continuous speech recognition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn start_continuous(&self) -> Result<()>;

    async fn stop_continuous(&self) -> Result<()>;

    /// Subscription point for recognition events. The session subscribes once
    /// per connection and drops the receiver on disconnect.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RecognitionEvent>;

    /// Releases the underlying engine resources.
    async fn close(&self);
}

/// Factory boundary for the speech engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Whether the underlying engine is loaded and usable. Connecting while
    /// this is false fails without a state change.
    fn is_loaded(&self) -> bool;

    async fn create_synthesizer(&self, config: &Config) -> Result<Arc<dyn Synthesizer>>;

    async fn create_recognizer(&self, config: &Config) -> Result<Arc<dyn Recognizer>>;

    /// Fetches the short-lived relay credential authorizing media
    /// negotiation.
    async fn fetch_relay_credential(&self) -> Result<relay::RelayCredential>;
}
