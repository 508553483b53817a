//! # Session Lifecycle
//!
//! One session per completed offer/answer exchange. Each session opens its
//! own handles on the backing files and runs two independent workers, audio
//! and video, that push to the transport's sinks with open-loop pacing.
//!
//! ```text
//!   Created ──workers spawned──▶ Streaming ──deadline──▶ TimedOut
//!                                    │
//!                                    └──connection closed──▶ Closed
//! ```
//!
//! Both terminal states tear down the same way: raise the cancel flag, let
//! in-flight pushes finish, join the workers (which drops the file handles).
//! A stream that fails or runs dry does not end the session; only the
//! deadline or the close notification does.

use std::fmt;
use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use loopcast_media::{
    AudioFramer, AudioSourceHandle, MediaError, MediaKind, MediaSample, Pacer, SampleSink,
    SleepPacer, VideoFramer, VideoSourceHandle,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{MediaConfig, SessionConfig};
use crate::worker::{CancelFlag, StreamOutcome, StreamWorker};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio source: {0}")]
    Audio(#[source] MediaError),
    #[error("video source: {0}")]
    Video(#[source] MediaError),
    #[error("session supervisor failed: {0}")]
    Supervisor(String),
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Context built, workers not yet running.
    Created,
    /// Workers running (or finished early) and the deadline armed.
    Streaming,
    /// Deadline expired before the connection closed.
    TimedOut,
    /// Transport reported the connection closed.
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::TimedOut | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Streaming => "streaming",
            SessionState::TimedOut => "timed_out",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Freshly opened, validated sources for one session. Never shared.
pub struct SessionSources {
    audio: AudioFramer<BufReader<File>>,
    video: VideoFramer<BufReader<File>>,
}

/// The transport's two tracks.
#[derive(Clone)]
pub struct SessionSinks {
    pub audio: Arc<dyn SampleSink>,
    pub video: Arc<dyn SampleSink>,
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: u64,
    pub state: SessionState,
    pub audio: StreamOutcome,
    pub video: StreamOutcome,
}

impl SessionReport {
    pub fn log(&self) {
        tracing::info!(
            session_id = self.session_id,
            state = %self.state,
            audio_pushed = self.audio.samples_pushed,
            audio_end = %self.audio.end,
            video_pushed = self.video.samples_pushed,
            video_end = %self.video.end,
            "session ended"
        );
    }
}

/// Creates sessions from a fixed configuration.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    media: MediaConfig,
    session: SessionConfig,
    pacer: Arc<dyn Pacer>,
    next_id: AtomicU64,
}

impl SessionCoordinator {
    /// Coordinator with the sleeping open-loop pacer.
    pub fn new(media: MediaConfig, session: SessionConfig) -> Self {
        Self::with_pacer(media, session, Arc::new(SleepPacer))
    }

    pub fn with_pacer(media: MediaConfig, session: SessionConfig, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                media,
                session,
                pacer,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn media(&self) -> &MediaConfig {
        &self.inner.media
    }

    /// Open both backing files and validate the audio header.
    ///
    /// Called before negotiation so a bad file fails the request without
    /// creating any session.
    pub fn open_sources(&self) -> Result<SessionSources, SessionError> {
        let media = &self.inner.media;
        let audio = AudioSourceHandle::open(&media.audio_path)
            .map_err(SessionError::Audio)?
            .into_framer(media.audio_frame);
        let video = VideoSourceHandle::open(&media.video_path)
            .map_err(SessionError::Video)?
            .into_framer(media.video_frame, media.scanner.scanner());
        Ok(SessionSources { audio, video })
    }

    /// Start streaming `sources` into `sinks`.
    ///
    /// The session closes when `closed` resolves (the transport's
    /// connection-closed notification), when [`SessionHandle::close`] is
    /// called, or when the deadline expires. Must be called from within a
    /// tokio runtime.
    pub fn start<F>(&self, sources: SessionSources, sinks: SessionSinks, closed: F) -> SessionHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let session_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + self.inner.session.deadline;
        let cancel = CancelFlag::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Created);
        let (close_tx, close_rx) = oneshot::channel();

        let audio = spawn_worker(
            StreamWorker {
                session_id,
                kind: MediaKind::Audio,
                sink: sinks.audio,
                pacer: self.inner.pacer.clone(),
                cancel: cancel.clone(),
            },
            sources.audio,
        );
        let video = spawn_worker(
            StreamWorker {
                session_id,
                kind: MediaKind::Video,
                sink: sinks.video,
                pacer: self.inner.pacer.clone(),
                cancel: cancel.clone(),
            },
            sources.video,
        );
        state_tx.send_replace(SessionState::Streaming);

        tracing::info!(
            session_id,
            deadline_secs = self.inner.session.deadline.as_secs_f64(),
            "session started"
        );

        let task = tokio::spawn(supervise(Supervisor {
            session_id,
            deadline,
            cancel,
            state_tx,
            audio,
            video,
            close_rx,
            closed,
        }));

        SessionHandle {
            session_id,
            close_tx: Some(close_tx),
            state: state_rx,
            task,
        }
    }
}

fn spawn_worker<I>(worker: StreamWorker, samples: I) -> JoinHandle<StreamOutcome>
where
    I: Iterator<Item = Result<MediaSample, MediaError>> + Send + 'static,
{
    tokio::task::spawn_blocking(move || worker.run(samples))
}

struct Supervisor<F> {
    session_id: u64,
    deadline: Instant,
    cancel: CancelFlag,
    state_tx: watch::Sender<SessionState>,
    audio: JoinHandle<StreamOutcome>,
    video: JoinHandle<StreamOutcome>,
    close_rx: oneshot::Receiver<()>,
    closed: F,
}

async fn supervise<F>(s: Supervisor<F>) -> SessionReport
where
    F: Future<Output = ()> + Send + 'static,
{
    let Supervisor {
        session_id,
        deadline,
        cancel,
        state_tx,
        audio,
        video,
        close_rx,
        closed,
    } = s;

    // A dropped handle is not a close request; only an explicit close is.
    let close_requested = async move {
        if close_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let state = tokio::select! {
        _ = tokio::time::sleep_until(deadline) => {
            tracing::warn!(session_id, "session deadline reached, tearing down");
            SessionState::TimedOut
        }
        _ = closed => {
            tracing::info!(session_id, "connection closed, tearing down");
            SessionState::Closed
        }
        _ = close_requested => {
            tracing::info!(session_id, "session closed locally, tearing down");
            SessionState::Closed
        }
    };

    cancel.cancel();
    let audio = audio
        .await
        .unwrap_or_else(|_| StreamOutcome::panicked(MediaKind::Audio));
    let video = video
        .await
        .unwrap_or_else(|_| StreamOutcome::panicked(MediaKind::Video));
    state_tx.send_replace(state);

    SessionReport {
        session_id,
        state,
        audio,
        video,
    }
}

/// Owner's view of a running session.
pub struct SessionHandle {
    session_id: u64,
    close_tx: Option<oneshot::Sender<()>>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes state changes, for registries.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Deliver the connection-closed notification. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for teardown to complete.
    pub async fn wait(self) -> Result<SessionReport, SessionError> {
        self.task
            .await
            .map_err(|e| SessionError::Supervisor(e.to_string()))
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}
