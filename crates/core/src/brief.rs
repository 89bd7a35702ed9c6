//! Project Brief Tracking
//!
//! Tracks the user-supplied project brief and the cached backend session
//! identifier it can invalidate. The identifier is a pure hook point for the
//! backend collaborator: this crate stores and clears it, nothing more.

use crate::prompts;
use tracing::info;
use uuid::Uuid;

/// Length delta above which an in-progress edit invalidates the cached
/// backend session identifier.
pub const BRIEF_INVALIDATION_DELTA: usize = 100;

/// Minimum brief length that earns a spoken acknowledgment on blur.
pub const ACK_MIN_LEN: usize = 50;

/// Mutable project-brief state: current text, last committed (blurred) text,
/// and the cached backend session identifier.
#[derive(Debug, Clone, Default)]
pub struct ProjectBriefTracker {
    current: String,
    committed: String,
    cached_session_id: Option<Uuid>,
}

impl ProjectBriefTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn cached_session_id(&self) -> Option<Uuid> {
        self.cached_session_id
    }

    pub fn set_cached_session_id(&mut self, id: Option<Uuid>) {
        self.cached_session_id = id;
    }

    /// Records an in-progress edit.
    ///
    /// A length delta beyond [`BRIEF_INVALIDATION_DELTA`] counts as a
    /// substantial rewrite and drops the cached session identifier.
    pub fn handle_change(&mut self, text: &str) {
        if self.cached_session_id.is_some()
            && text.len().abs_diff(self.current.len()) > BRIEF_INVALIDATION_DELTA
        {
            info!("Project brief changed substantially; dropping cached backend session.");
            self.cached_session_id = None;
        }
        self.current = text.to_string();
    }

    /// Records a confirmed-finalize (blur) of the brief editor.
    ///
    /// Any difference from the last committed value drops the cached session
    /// identifier; the text then becomes the committed value.
    pub fn handle_blur(&mut self, text: &str) {
        if self.cached_session_id.is_some() && text != self.committed {
            info!("Project brief finalized with new content; dropping cached backend session.");
            self.cached_session_id = None;
        }
        self.current = text.to_string();
        self.committed = text.to_string();
    }

    /// Selects the length-tiered acknowledgment spoken after a blur, if the
    /// brief is substantial enough to deserve one.
    pub fn acknowledgment_for(text: &str) -> Option<&'static str> {
        if text.len() <= ACK_MIN_LEN {
            return None;
        }
        Some(if text.len() > 1000 {
            prompts::ACK_COMPREHENSIVE
        } else if text.len() > 500 {
            prompts::ACK_DETAILED
        } else if text.len() > 200 {
            prompts::ACK_RECEIVED
        } else {
            prompts::ACK_MINIMAL
        })
    }
}
