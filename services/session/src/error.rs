//! Session Error Taxonomy
//!
//! Only `CapabilityUnavailable` and `ConnectFailed` ever change session
//! state. Per-turn failures (`BackendCallFailed`, `SynthesisFailed`) are
//! absorbed by the orchestration layer and converted into spoken messages;
//! recognition errors are observed only.

use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The speech capability was not loaded at connect time. Non-fatal; the
    /// caller may retry later.
    #[error("speech capability is not available")]
    CapabilityUnavailable,

    /// Credential fetch, recognizer/synthesizer construction, or media
    /// negotiation failed. The session is back in the idle state.
    #[error("failed to establish realtime session: {0}")]
    ConnectFailed(anyhow::Error),

    /// Non-2xx or network failure on the backend chat call.
    #[error("backend chat call failed: {0}")]
    BackendCallFailed(anyhow::Error),

    /// The speech engine reported a non-success reason or threw.
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// A recognizer cancellation or error event.
    #[error("speech recognition error: {0}")]
    RecognitionError(String),

    /// The operation is not valid in the session's current lifecycle state.
    #[error("operation not valid while session is {0:?}")]
    InvalidState(SessionState),
}
