//! Session Lifecycle
//!
//! The singleton session aggregate: the Idle -> Connecting -> Active state
//! machine, exclusive ownership of the synthesizer/recognizer/transport
//! handles (acquired on connect, released on disconnect or failure), the
//! microphone, and the per-turn query driver that ties barge-in, context
//! building, the backend call, and response routing together.

use crate::config::Config;
use crate::error::SessionError;
use crate::events::{EventSink, SessionEvent};
use crate::router;
use crate::speech::queue::SpeechOutputQueue;
use crate::speech::{RecognitionEvent, Recognizer, SpeechProvider, Synthesizer};
use crate::transport::{RealtimeTransportSetup, SinkFactory, TransportFactory};
use anyhow::{Context as _, Result};
use archcoach_core::backend::BackendClient;
use archcoach_core::brief::ProjectBriefTracker;
use archcoach_core::context::ConversationContext;
use archcoach_core::message::Message;
use archcoach_core::prompts;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Delay before the welcome utterance, giving the remote avatar time to
/// finish initializing.
const AVATAR_WARMUP: Duration = Duration::from_secs(2);

/// Delay before the spoken acknowledgment after the user finishes editing
/// the project brief.
const BRIEF_ACK_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle states. Idle is both the initial and the only terminal rest
/// state; there is no reconnecting or paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
}

/// The engine handles held while a session is up. Owned exclusively by the
/// aggregate; other components act only through handles lent per call.
struct ActiveHandles {
    synthesizer: Arc<dyn Synthesizer>,
    recognizer: Arc<dyn Recognizer>,
    transport: RealtimeTransportSetup,
}

/// The session aggregate. Exactly one exists per app instance.
pub struct CoachSession {
    config: Arc<Config>,
    provider: Arc<dyn SpeechProvider>,
    backend: Arc<dyn BackendClient>,
    transport_factory: Arc<dyn TransportFactory>,
    sink_factory: Arc<dyn SinkFactory>,
    state: Mutex<SessionState>,
    handles: Mutex<Option<ActiveHandles>>,
    context: Mutex<ConversationContext>,
    brief: Mutex<ProjectBriefTracker>,
    queue: SpeechOutputQueue,
    microphone_active: AtomicBool,
    last_interaction: Mutex<DateTime<Utc>>,
    recognition_listener: Mutex<Option<JoinHandle<()>>>,
    events: EventSink,
}

impl CoachSession {
    pub fn new(
        config: Config,
        provider: Arc<dyn SpeechProvider>,
        backend: Arc<dyn BackendClient>,
        transport_factory: Arc<dyn TransportFactory>,
        sink_factory: Arc<dyn SinkFactory>,
        events: EventSink,
    ) -> Arc<Self> {
        let queue = SpeechOutputQueue::new(config.tts_voice.clone(), events.clone());
        Arc::new(Self {
            config: Arc::new(config),
            provider,
            backend,
            transport_factory,
            sink_factory,
            state: Mutex::new(SessionState::Idle),
            handles: Mutex::new(None),
            context: Mutex::new(ConversationContext::new()),
            brief: Mutex::new(ProjectBriefTracker::new()),
            queue,
            microphone_active: AtomicBool::new(false),
            last_interaction: Mutex::new(Utc::now()),
            recognition_listener: Mutex::new(None),
            events,
        })
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub async fn is_speaking(&self) -> bool {
        self.queue.is_speaking().await
    }

    pub fn microphone_active(&self) -> bool {
        self.microphone_active.load(Ordering::SeqCst)
    }

    pub async fn last_interaction(&self) -> DateTime<Utc> {
        *self.last_interaction.lock().await
    }

    /// Snapshot of the conversation log, the single source of truth for the
    /// displayed transcript.
    pub async fn messages(&self) -> Vec<Message> {
        self.context.lock().await.messages().to_vec()
    }

    pub async fn cached_backend_session(&self) -> Option<Uuid> {
        self.brief.lock().await.cached_session_id()
    }

    /// Hook point for the backend collaborator; brief edits invalidate it.
    pub async fn set_cached_backend_session(&self, id: Option<Uuid>) {
        self.brief.lock().await.set_cached_session_id(id);
    }

    /// Connects the realtime session. Valid only from Idle.
    ///
    /// Construction of the engine handles runs concurrently with the relay
    /// credential fetch; the media channel is negotiated once both are in
    /// hand. Any sub-step failure releases every partially constructed
    /// handle and returns the session to Idle.
    #[instrument(skip_all)]
    pub async fn connect(self: &Arc<Self>) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock().await;
            if *state != SessionState::Idle {
                return Err(SessionError::InvalidState(*state));
            }
            if !self.provider.is_loaded() {
                warn!("Speech capability not loaded; connect refused.");
                return Err(SessionError::CapabilityUnavailable);
            }
            *state = SessionState::Connecting;
        }
        self.events.emit(SessionEvent::StateChanged {
            state: SessionState::Connecting,
        });
        self.touch().await;
        info!("Connecting realtime session.");

        match self.establish().await {
            Ok(handles) => {
                self.queue
                    .set_synthesizer(Some(handles.synthesizer.clone()))
                    .await;
                *self.handles.lock().await = Some(handles);
                self.set_state(SessionState::Active).await;
                info!("Realtime session active.");

                // The avatar needs a moment before its first utterance.
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(AVATAR_WARMUP).await;
                    session.queue.speak(prompts::WELCOME_UTTERANCE).await;
                });
                Ok(())
            }
            Err(source) => {
                error!(error = ?source, "Connect attempt failed; returning to idle.");
                self.set_state(SessionState::Idle).await;
                self.events.emit(SessionEvent::Error {
                    message: format!("Connection failed: {source}"),
                });
                Err(SessionError::ConnectFailed(source))
            }
        }
    }

    /// Builds every handle the session needs, releasing them all on failure.
    async fn establish(&self) -> Result<ActiveHandles> {
        let (engine, credential) = tokio::join!(self.build_engine_handles(), async {
            self.provider
                .fetch_relay_credential()
                .await
                .context("relay credential fetch failed")
        });

        let ((synthesizer, recognizer), credential) = match (engine, credential) {
            (Ok(engine), Ok(credential)) => (engine, credential),
            (Ok((synthesizer, recognizer)), Err(error)) => {
                synthesizer.close().await;
                recognizer.close().await;
                return Err(error);
            }
            (Err(error), _) => return Err(error),
        };

        let transport = match self.transport_factory.create(&credential).await {
            Ok(transport) => transport,
            Err(error) => {
                synthesizer.close().await;
                recognizer.close().await;
                return Err(error.context("transport construction failed"));
            }
        };

        match RealtimeTransportSetup::negotiate(
            transport,
            self.sink_factory.clone(),
            synthesizer.clone(),
        )
        .await
        {
            Ok(setup) => Ok(ActiveHandles {
                synthesizer,
                recognizer,
                transport: setup,
            }),
            Err(error) => {
                synthesizer.close().await;
                recognizer.close().await;
                Err(error)
            }
        }
    }

    async fn build_engine_handles(&self) -> Result<(Arc<dyn Synthesizer>, Arc<dyn Recognizer>)> {
        let synthesizer = self
            .provider
            .create_synthesizer(&self.config)
            .await
            .context("synthesizer construction failed")?;
        match self.provider.create_recognizer(&self.config).await {
            Ok(recognizer) => Ok((synthesizer, recognizer)),
            Err(error) => {
                synthesizer.close().await;
                Err(error.context("recognizer construction failed"))
            }
        }
    }

    /// Disconnects and releases all handles: synthesizer, recognizer (any
    /// in-progress recognition stopped), then transport, each tolerated
    /// absent. Microphone and speaking flags reset unconditionally.
    #[instrument(skip_all)]
    pub async fn disconnect(&self) {
        if let Some(listener) = self.recognition_listener.lock().await.take() {
            listener.abort();
        }
        self.queue.set_synthesizer(None).await;
        self.queue.reset().await;

        if let Some(handles) = self.handles.lock().await.take() {
            handles.synthesizer.close().await;
            if let Err(error) = handles.recognizer.stop_continuous().await {
                debug!(?error, "Recognizer was not running at disconnect.");
            }
            handles.recognizer.close().await;
            let mut transport = handles.transport;
            transport.close().await;
        }

        self.microphone_active.store(false, Ordering::SeqCst);
        self.events
            .emit(SessionEvent::MicrophoneChanged { active: false });
        self.set_state(SessionState::Idle).await;
        info!("Session disconnected.");
    }

    /// Begins continuous recognition. Valid only while Active.
    pub async fn start_microphone(self: &Arc<Self>) -> Result<(), SessionError> {
        {
            let state = self.state.lock().await;
            if *state != SessionState::Active {
                return Err(SessionError::InvalidState(*state));
            }
        }
        self.touch().await;

        let recognizer = self
            .handles
            .lock()
            .await
            .as_ref()
            .map(|handles| handles.recognizer.clone())
            .ok_or(SessionError::InvalidState(SessionState::Idle))?;

        let mut events = recognizer.subscribe();
        let session = Arc::clone(self);
        let listener = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.on_recognition_event(event).await;
            }
        });
        if let Some(previous) = self.recognition_listener.lock().await.replace(listener) {
            previous.abort();
        }

        if let Err(error) = recognizer.start_continuous().await {
            if let Some(listener) = self.recognition_listener.lock().await.take() {
                listener.abort();
            }
            return Err(SessionError::RecognitionError(error.to_string()));
        }

        self.microphone_active.store(true, Ordering::SeqCst);
        self.events
            .emit(SessionEvent::MicrophoneChanged { active: true });
        info!("Continuous recognition started.");
        Ok(())
    }

    /// Halts continuous recognition. Valid only while Active.
    pub async fn stop_microphone(&self) -> Result<(), SessionError> {
        {
            let state = self.state.lock().await;
            if *state != SessionState::Active {
                return Err(SessionError::InvalidState(*state));
            }
        }
        let recognizer = self
            .handles
            .lock()
            .await
            .as_ref()
            .map(|handles| handles.recognizer.clone());
        if let Some(recognizer) = recognizer {
            if let Err(error) = recognizer.stop_continuous().await {
                warn!(?error, "Failed to stop continuous recognition.");
            }
        }
        self.microphone_active.store(false, Ordering::SeqCst);
        self.events
            .emit(SessionEvent::MicrophoneChanged { active: false });
        Ok(())
    }

    /// Recognition results: final results with non-empty trimmed text become
    /// user queries; interim and canceled events are diagnostics only.
    async fn on_recognition_event(self: &Arc<Self>, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Recognized { text } => {
                let query = text.trim().to_string();
                if query.is_empty() {
                    return;
                }
                if !self.config.continuous_conversation {
                    // Outside continuous mode the microphone stops after
                    // each recognized phrase.
                    let recognizer = self
                        .handles
                        .lock()
                        .await
                        .as_ref()
                        .map(|handles| handles.recognizer.clone());
                    if let Some(recognizer) = recognizer {
                        if let Err(error) = recognizer.stop_continuous().await {
                            warn!(?error, "Failed to stop continuous recognition.");
                        }
                    }
                    self.microphone_active.store(false, Ordering::SeqCst);
                    self.events
                        .emit(SessionEvent::MicrophoneChanged { active: false });
                }
                self.handle_user_query(&query).await;
            }
            RecognitionEvent::Recognizing { text } => {
                debug!(chars = text.len(), "Interim recognition result.");
            }
            RecognitionEvent::Canceled { reason } => {
                warn!(%reason, "Recognition canceled.");
            }
        }
    }

    /// Drives one conversation turn: barge-in, context build, backend call,
    /// response routing. Per-turn failures are absorbed into spoken messages
    /// and never change the lifecycle state.
    #[instrument(skip_all, fields(chars = query.len()))]
    pub async fn handle_user_query(self: &Arc<Self>, query: &str) {
        self.touch().await;

        // Barge-in: a new query never talks over in-flight speech.
        if self.queue.is_speaking().await {
            self.queue.stop().await;
        }

        let prompt = {
            let mut context = self.context.lock().await;
            let prompt = context.build_outbound_context(query);
            context.push(Message::user(query));
            prompt
        };

        match self.backend.chat(&prompt).await {
            Ok(reply) => {
                router::dispatch(&reply, &self.context, &self.queue, self.backend.base_url())
                    .await;
            }
            Err(error) => {
                let error = SessionError::BackendCallFailed(error);
                error!(%error, "Backend chat call failed.");
                self.events.emit(SessionEvent::Error {
                    message: error.to_string(),
                });
                self.queue.speak(prompts::BACKEND_ERROR_UTTERANCE).await;
            }
        }
    }

    /// Enqueues an ad-hoc utterance.
    pub async fn speak(&self, text: impl Into<String>) {
        self.touch().await;
        self.queue.speak(text).await;
    }

    /// Interrupts in-progress and queued speech.
    pub async fn stop_speaking(&self) {
        self.touch().await;
        self.queue.stop().await;
    }

    /// Drops all conversation history, keeping the system message.
    pub async fn clear_history(&self) {
        self.context.lock().await.clear();
        info!("Conversation history cleared.");
    }

    /// Records an in-progress brief edit and re-derives the system prompt.
    pub async fn set_project_brief(&self, text: &str) {
        self.brief.lock().await.handle_change(text);
        self.context.lock().await.set_project_brief(text);
    }

    /// Finalizes the brief (editor blur): commits it, re-derives the system
    /// prompt, and schedules the spoken acknowledgment when the session is
    /// active and quiet.
    pub async fn finalize_project_brief(self: &Arc<Self>, text: &str) {
        self.brief.lock().await.handle_blur(text);
        self.context.lock().await.set_project_brief(text);

        let active = *self.state.lock().await == SessionState::Active;
        if active && !self.queue.is_speaking().await {
            if let Some(acknowledgment) = ProjectBriefTracker::acknowledgment_for(text) {
                let session = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(BRIEF_ACK_DELAY).await;
                    session.queue.speak(acknowledgment).await;
                });
            }
        }
    }

    async fn touch(&self) {
        *self.last_interaction.lock().await = Utc::now();
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.lock().await = state;
        self.events.emit(SessionEvent::StateChanged { state });
    }
}
