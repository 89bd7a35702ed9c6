//! Speech Output Queue
//!
//! Serializes utterances against the single synthesis capability. At most one
//! utterance is in flight; later `speak` calls append to a FIFO drained by an
//! explicit loop. `stop` clears the queue and forces the speaking flag down;
//! it is the only interruption path. An in-flight synthesis call is never
//! aborted, but a generation counter invalidates its continuation so a
//! stopped drain cannot resurrect itself or race a newer one.

use crate::error::SessionError;
use crate::events::{EventSink, SessionEvent};
use crate::speech::ssml::build_ssml;
use crate::speech::{SynthesisOutcome, Synthesizer};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<String>,
    current: Option<String>,
    speaking: bool,
    generation: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    synthesizer: Mutex<Option<Arc<dyn Synthesizer>>>,
    voice: String,
    events: EventSink,
}

/// The serialized speech output path.
#[derive(Clone)]
pub struct SpeechOutputQueue {
    inner: Arc<Inner>,
}

impl SpeechOutputQueue {
    pub fn new(voice: impl Into<String>, events: EventSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                synthesizer: Mutex::new(None),
                voice: voice.into(),
                events,
            }),
        }
    }

    /// Attaches (or detaches) the synthesizer lent by the session for the
    /// duration of a connection.
    pub async fn set_synthesizer(&self, synthesizer: Option<Arc<dyn Synthesizer>>) {
        *self.inner.synthesizer.lock().await = synthesizer;
    }

    pub async fn is_speaking(&self) -> bool {
        self.inner.state.lock().await.speaking
    }

    pub async fn current_utterance(&self) -> Option<String> {
        self.inner.state.lock().await.current.clone()
    }

    pub async fn queued(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Speaks `text`, or appends it to the queue while another utterance is
    /// in flight. Without an attached synthesizer the utterance is dropped.
    pub async fn speak(&self, text: impl Into<String>) {
        let text = text.into();
        if self.inner.synthesizer.lock().await.is_none() {
            warn!("No synthesizer attached; dropping utterance.");
            return;
        }
        let generation;
        {
            let mut state = self.inner.state.lock().await;
            if state.speaking {
                state.pending.push_back(text);
                return;
            }
            state.speaking = true;
            generation = state.generation;
        }
        let queue = self.clone();
        tokio::spawn(async move { queue.drain(text, generation).await });
    }

    /// Interrupts speech: clears the queue, forces the speaking flag down,
    /// and asks the engine to halt in-progress audio. Utterances discarded
    /// here are never spoken.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.pending.clear();
            state.current = None;
            state.speaking = false;
            state.generation = state.generation.wrapping_add(1);
        }
        let synthesizer = self.inner.synthesizer.lock().await.clone();
        if let Some(synthesizer) = synthesizer {
            if let Err(error) = synthesizer.stop_speaking().await {
                warn!(?error, "Error while stopping in-progress speech.");
            }
            info!("Stop speaking request sent.");
        }
        self.inner.events.emit(SessionEvent::SpeakingEnded);
    }

    /// Clears queue state without touching the synthesizer. Used on
    /// disconnect, after the engine handles are already released.
    pub async fn reset(&self) {
        let mut state = self.inner.state.lock().await;
        state.pending.clear();
        state.current = None;
        state.speaking = false;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Drains the queue, one utterance at a time, until it is empty or a
    /// `stop` moves the generation on.
    async fn drain(&self, first: String, generation: u64) {
        let mut utterance = first;
        loop {
            {
                let mut state = self.inner.state.lock().await;
                if state.generation != generation {
                    return;
                }
                state.current = Some(utterance.clone());
            }
            self.inner.events.emit(SessionEvent::SpeakingStarted {
                text: utterance.clone(),
            });

            let synthesizer = self.inner.synthesizer.lock().await.clone();
            match synthesizer {
                Some(synthesizer) => {
                    let markup = build_ssml(&utterance, &self.inner.voice, 0);
                    match synthesizer.speak_markup(&markup).await {
                        Ok(SynthesisOutcome::Completed) => {
                            info!(chars = utterance.len(), "Utterance synthesized.");
                        }
                        Ok(SynthesisOutcome::Failed { reason }) => {
                            let error = SessionError::SynthesisFailed(reason);
                            error!(%error, "Speech synthesis reported failure.");
                        }
                        Err(error) => {
                            error!(?error, "Speech synthesis call failed.");
                        }
                    }
                }
                None => warn!("Synthesizer detached mid-drain; skipping utterance."),
            }

            let next = {
                let mut state = self.inner.state.lock().await;
                if state.generation != generation {
                    // A stop landed while synthesis was in flight; the queue
                    // and flags are already reset.
                    return;
                }
                state.current = None;
                let next = state.pending.pop_front();
                if next.is_none() {
                    state.speaking = false;
                }
                next
            };
            match next {
                Some(text) => utterance = text,
                None => {
                    self.inner.events.emit(SessionEvent::SpeakingEnded);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// A synthesizer the test drives by hand: every `speak_markup` call
    /// reports its markup and then waits for the test to release it with an
    /// outcome.
    struct ScriptedSynthesizer {
        started_tx: mpsc::UnboundedSender<String>,
        release_rx: Mutex<mpsc::UnboundedReceiver<Result<SynthesisOutcome>>>,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl Synthesizer for ScriptedSynthesizer {
        async fn speak_markup(&self, markup: &str) -> Result<SynthesisOutcome> {
            self.started_tx.send(markup.to_string()).unwrap();
            self.release_rx
                .lock()
                .await
                .recv()
                .await
                .unwrap_or(Ok(SynthesisOutcome::Completed))
        }

        async fn stop_speaking(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn start_media_session(
            &self,
            _transport: Arc<dyn crate::transport::MediaTransport>,
        ) -> Result<()> {
            Ok(())
        }

        async fn close(&self) {}
    }

    struct Harness {
        queue: SpeechOutputQueue,
        synthesizer: Arc<ScriptedSynthesizer>,
        started_rx: mpsc::UnboundedReceiver<String>,
        release_tx: mpsc::UnboundedSender<Result<SynthesisOutcome>>,
    }

    async fn harness() -> Harness {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let synthesizer = Arc::new(ScriptedSynthesizer {
            started_tx,
            release_rx: Mutex::new(release_rx),
            stops: AtomicUsize::new(0),
        });
        let queue = SpeechOutputQueue::new("test-voice", EventSink::disabled());
        queue
            .set_synthesizer(Some(synthesizer.clone() as Arc<dyn Synthesizer>))
            .await;
        Harness {
            queue,
            synthesizer,
            started_rx,
            release_tx,
        }
    }

    async fn next_started(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for synthesis to start")
            .expect("synthesizer channel closed")
    }

    async fn wait_until_quiet(queue: &SpeechOutputQueue) {
        timeout(Duration::from_secs(1), async {
            while queue.is_speaking().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("queue never went quiet");
    }

    #[tokio::test]
    async fn test_fifo_order_and_speech_exclusivity() {
        let mut h = harness().await;

        h.queue.speak("first").await;
        let markup_a = next_started(&mut h.started_rx).await;
        assert!(markup_a.contains("first"));
        assert!(h.queue.is_speaking().await);

        // B arrives while A is in flight: queued, not started.
        h.queue.speak("second").await;
        assert_eq!(h.queue.queued().await, 1);
        assert!(h.started_rx.try_recv().is_err());
        assert_eq!(h.queue.current_utterance().await.as_deref(), Some("first"));

        // A completes; only then does B start.
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        let markup_b = next_started(&mut h.started_rx).await;
        assert!(markup_b.contains("second"));
        assert_eq!(h.queue.current_utterance().await.as_deref(), Some("second"));

        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        wait_until_quiet(&h.queue).await;
        assert_eq!(h.queue.queued().await, 0);
    }

    #[tokio::test]
    async fn test_stop_discards_queued_utterances() {
        let mut h = harness().await;

        h.queue.speak("first").await;
        next_started(&mut h.started_rx).await;
        h.queue.speak("second").await;
        h.queue.speak("third").await;
        assert_eq!(h.queue.queued().await, 2);

        h.queue.stop().await;
        assert!(!h.queue.is_speaking().await);
        assert_eq!(h.queue.queued().await, 0);
        assert_eq!(h.synthesizer.stops.load(Ordering::SeqCst), 1);

        // The in-flight call runs to completion, but its continuation is
        // dead: nothing further is spoken.
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(h.started_rx.try_recv().is_err());
        assert!(!h.queue.is_speaking().await);
    }

    #[tokio::test]
    async fn test_speak_after_stop_starts_fresh() {
        let mut h = harness().await;

        h.queue.speak("first").await;
        next_started(&mut h.started_rx).await;
        h.queue.stop().await;

        // A new utterance while the stopped call is still settling.
        h.queue.speak("fresh").await;
        let markup = next_started(&mut h.started_rx).await;
        assert!(markup.contains("fresh"));
        assert!(h.queue.is_speaking().await);

        // The stale drain finishing must not clear the new drain's state.
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        tokio::task::yield_now().await;
        assert!(h.queue.is_speaking().await);

        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        wait_until_quiet(&h.queue).await;
    }

    #[tokio::test]
    async fn test_reported_failure_keeps_draining() {
        let mut h = harness().await;

        h.queue.speak("first").await;
        next_started(&mut h.started_rx).await;
        h.queue.speak("second").await;

        h.release_tx
            .send(Ok(SynthesisOutcome::Failed {
                reason: "engine busy".to_string(),
            }))
            .unwrap();

        // The failure is absorbed and the next utterance still plays.
        let markup = next_started(&mut h.started_rx).await;
        assert!(markup.contains("second"));
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        wait_until_quiet(&h.queue).await;
    }

    #[tokio::test]
    async fn test_thrown_error_keeps_draining() {
        let mut h = harness().await;

        h.queue.speak("first").await;
        next_started(&mut h.started_rx).await;
        h.queue.speak("second").await;

        h.release_tx
            .send(Err(anyhow::anyhow!("socket dropped")))
            .unwrap();

        let markup = next_started(&mut h.started_rx).await;
        assert!(markup.contains("second"));
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        wait_until_quiet(&h.queue).await;
    }

    #[tokio::test]
    async fn test_speak_without_synthesizer_is_a_noop() {
        let queue = SpeechOutputQueue::new("test-voice", EventSink::disabled());
        queue.speak("dropped").await;
        assert!(!queue.is_speaking().await);
        assert_eq!(queue.queued().await, 0);

        // stop with no capability attached is tolerated too.
        queue.stop().await;
        assert!(!queue.is_speaking().await);
    }

    #[tokio::test]
    async fn test_markup_carries_configured_voice_and_escaping() {
        let mut h = harness().await;

        h.queue.speak("a < b").await;
        let markup = next_started(&mut h.started_rx).await;
        assert!(markup.contains("<voice name='test-voice'>"));
        assert!(markup.contains("a &lt; b"));
        h.release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        wait_until_quiet(&h.queue).await;
    }

    #[tokio::test]
    async fn test_speaking_events_are_emitted() {
        let (sink, mut events) = EventSink::channel();
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let synthesizer = Arc::new(ScriptedSynthesizer {
            started_tx,
            release_rx: Mutex::new(release_rx),
            stops: AtomicUsize::new(0),
        });
        let queue = SpeechOutputQueue::new("v", sink);
        queue
            .set_synthesizer(Some(synthesizer as Arc<dyn Synthesizer>))
            .await;

        queue.speak("hello").await;
        next_started(&mut started_rx).await;
        match timeout(Duration::from_secs(1), events.recv()).await.unwrap() {
            Some(SessionEvent::SpeakingStarted { text }) => assert_eq!(text, "hello"),
            other => panic!("unexpected event {other:?}"),
        }

        release_tx.send(Ok(SynthesisOutcome::Completed)).unwrap();
        match timeout(Duration::from_secs(1), events.recv()).await.unwrap() {
            Some(SessionEvent::SpeakingEnded) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
}
