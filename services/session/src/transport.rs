//! Realtime Transport Setup
//!
//! Negotiates the bidirectional media channel carrying the remote avatar's
//! audio and video back to the user, and binds inbound tracks to playback
//! sinks. The transport itself is an opaque capability; this module owns the
//! orchestration: exactly two send-receive transceivers, exactly one sink per
//! track kind (a newer track tears the previous sink down first), and
//! playback that starts only after the first data frame so autoplay policies
//! cannot reject the stream.

use crate::speech::Synthesizer;
use crate::speech::relay::RelayCredential;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The two logical track kinds of the media channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// An inbound media track delivered by the negotiated channel.
#[derive(Debug, Clone)]
pub struct InboundTrack {
    pub kind: TrackKind,
    pub stream_id: String,
}

/// The negotiated media channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Registers a send-receive transceiver for the given track kind.
    async fn add_transceiver(&self, kind: TrackKind) -> Result<()>;

    /// Subscription point for inbound track arrivals.
    fn subscribe_tracks(&self) -> mpsc::UnboundedReceiver<InboundTrack>;

    async fn close(&self);
}

/// Constructs a transport configured with a relay credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, credential: &RelayCredential) -> Result<Arc<dyn MediaTransport>>;
}

/// A playback endpoint for one inbound track.
///
/// Attaching leaves the sink vendor-muted; `begin_playback` is called only
/// once `first_frame` has resolved.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn attach(&self, track: &InboundTrack) -> Result<()>;

    /// Resolves when the first data frame has arrived.
    async fn first_frame(&self) -> Result<()>;

    async fn begin_playback(&self) -> Result<()>;

    async fn detach(&self);
}

/// Creates playback sinks per track kind.
#[cfg_attr(test, mockall::automock)]
pub trait SinkFactory: Send + Sync {
    fn create(&self, kind: TrackKind) -> Arc<dyn PlaybackSink>;
}

/// The live media channel: transport handle, bound sinks, and the binder task
/// routing inbound tracks to them.
pub struct RealtimeTransportSetup {
    transport: Arc<dyn MediaTransport>,
    sinks: Arc<Mutex<HashMap<TrackKind, Arc<dyn PlaybackSink>>>>,
    binder: Option<JoinHandle<()>>,
}

impl RealtimeTransportSetup {
    /// Negotiates the media channel and starts routing inbound tracks.
    ///
    /// Reports one aggregate outcome: on any failure the transport is closed
    /// and the binder task is gone, so the caller never sees partial success.
    pub async fn negotiate(
        transport: Arc<dyn MediaTransport>,
        sink_factory: Arc<dyn SinkFactory>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Result<Self> {
        let mut tracks = transport.subscribe_tracks();

        if let Err(error) = async {
            transport.add_transceiver(TrackKind::Video).await?;
            transport.add_transceiver(TrackKind::Audio).await
        }
        .await
        {
            transport.close().await;
            return Err(error).context("transceiver registration failed");
        }

        let sinks: Arc<Mutex<HashMap<TrackKind, Arc<dyn PlaybackSink>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let binder = tokio::spawn({
            let sinks = sinks.clone();
            async move {
                while let Some(track) = tracks.recv().await {
                    info!(kind = ?track.kind, stream = %track.stream_id, "Inbound media track arrived.");
                    let sink = sink_factory.create(track.kind);
                    // Exactly one sink per kind: tear down the previous one
                    // before binding the replacement.
                    let previous = sinks.lock().await.insert(track.kind, sink.clone());
                    if let Some(previous) = previous {
                        previous.detach().await;
                    }
                    tokio::spawn(bind_sink(sink, track));
                }
            }
        });

        if let Err(error) = synthesizer.start_media_session(transport.clone()).await {
            binder.abort();
            transport.close().await;
            return Err(error).context("media negotiation failed");
        }

        info!("Media channel negotiated.");
        Ok(Self {
            transport,
            sinks,
            binder: Some(binder),
        })
    }

    /// The sink currently bound for a track kind, if any.
    pub async fn sink_for(&self, kind: TrackKind) -> Option<Arc<dyn PlaybackSink>> {
        self.sinks.lock().await.get(&kind).cloned()
    }

    /// Tears the channel down: binder task, bound sinks, then the transport.
    pub async fn close(&mut self) {
        if let Some(binder) = self.binder.take() {
            binder.abort();
        }
        let sinks: Vec<_> = self.sinks.lock().await.drain().collect();
        for (_, sink) in sinks {
            sink.detach().await;
        }
        self.transport.close().await;
    }
}

/// Attaches a sink muted, then starts playback once the first frame lands.
async fn bind_sink(sink: Arc<dyn PlaybackSink>, track: InboundTrack) {
    if let Err(error) = sink.attach(&track).await {
        warn!(kind = ?track.kind, ?error, "Failed to attach playback sink.");
        return;
    }
    if sink.first_frame().await.is_ok() {
        if let Err(error) = sink.begin_playback().await {
            warn!(kind = ?track.kind, ?error, "Failed to start playback.");
        }
    }
}
