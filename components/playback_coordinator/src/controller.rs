use crate::media::MediaSelection;
use display_primitives::{PlayOutcome, PlaybackState, TriggerSource};
use display_supervisor::{DisplaySupervisor, SupervisorError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for an in-flight session to wind down
const SESSION_DRAIN: Duration = Duration::from_secs(5);

/// The single source of truth for "is a video playing".
///
/// Whoever flips the state from `Idle` to `Playing` holds the right to call
/// the supervisor until the state is flipped back. That one transition is the
/// only serialization point for every trigger source.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<PlaybackState>,
    supervisor: Arc<dyn DisplaySupervisor>,
    media: MediaSelection,
    shutdown: CancellationToken,
    sessions: TaskTracker,
}

impl PlaybackController {
    pub fn new(
        supervisor: Arc<dyn DisplaySupervisor>,
        media: MediaSelection,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(PlaybackState::Idle),
                supervisor,
                media,
                shutdown,
                sessions: TaskTracker::new(),
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.inner.state.lock()
    }

    pub fn is_playing(&self) -> bool {
        !self.state().is_idle()
    }

    pub fn media(&self) -> &MediaSelection {
        &self.inner.media
    }

    /// Start a video session unless one is already running.
    ///
    /// Returns as soon as the session task is spawned; the task waits for the
    /// player to exit, puts the idle image back and releases the state.
    /// Must be called from within a tokio runtime.
    pub fn request_play(&self, source: TriggerSource) -> PlayOutcome {
        if !self.inner.try_begin() {
            info!("Play request from {} ignored: already playing", source);
            return PlayOutcome::AlreadyPlaying;
        }

        if self.inner.shutdown.is_cancelled() {
            self.inner.release();
            info!("Play request from {} ignored: shutting down", source);
            return PlayOutcome::AlreadyPlaying;
        }

        let video = self.inner.media.video_path();
        if !video.exists() {
            self.inner.release();
            warn!(
                "Play request from {} rejected: video not found: {}",
                source,
                video.display()
            );
            return PlayOutcome::VideoMissing;
        }

        info!("Play request from {} accepted: {}", source, video.display());
        let inner = Arc::clone(&self.inner);
        self.inner.sessions.spawn(inner.run_session(video));

        PlayOutcome::Started
    }

    /// Redisplay the idle image with the current selection.
    ///
    /// Does nothing while a video is playing; the session picks up the new
    /// image when it ends. Returns whether the image was (re)displayed.
    pub async fn refresh_idle_image(&self) -> bool {
        if !self.inner.try_begin() {
            debug!("Idle image refresh deferred until playback ends");
            return false;
        }

        if self.inner.shutdown.is_cancelled() {
            self.inner.release();
            return false;
        }

        self.inner.show_idle_image().await;
        self.inner.release();
        true
    }

    /// Stop accepting requests, kill every display process and wait for the
    /// running session (if any) to finish.
    pub async fn shutdown(&self) {
        info!("Playback controller shutting down");
        self.inner.shutdown.cancel();
        self.inner.supervisor.shutdown().await;

        self.inner.sessions.close();
        if tokio::time::timeout(SESSION_DRAIN, self.inner.sessions.wait())
            .await
            .is_err()
        {
            warn!("Video session did not finish within {:?}", SESSION_DRAIN);
        }
    }
}

impl Inner {
    /// Atomic Idle -> Playing; false if someone else holds the transition.
    fn try_begin(&self) -> bool {
        let mut state = self.state.lock();
        if !state.is_idle() {
            return false;
        }
        *state = PlaybackState::Playing;
        true
    }

    fn release(&self) {
        *self.state.lock() = PlaybackState::Idle;
    }

    async fn show_idle_image(&self) {
        let image = self.media.image_path();
        if let Err(e) = self.supervisor.show_idle_image(&image).await {
            warn!("Could not show idle image {}: {}", image.display(), e);
        }
    }

    async fn run_session(self: Arc<Self>, video: PathBuf) {
        match self.supervisor.play_video(&video).await {
            Ok(exit) => info!("Video session ended with {}", exit),
            Err(SupervisorError::ShuttingDown) => info!("Video session cancelled by shutdown"),
            Err(e) => error!("Video session failed: {}", e),
        }

        if self.shutdown.is_cancelled() {
            debug!("Shutting down, not restoring idle image");
        } else {
            self.show_idle_image().await;
        }

        // Released only after the idle image handoff so supervisor calls never overlap
        self.release();
    }
}
