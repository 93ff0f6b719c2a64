use crate::input::DigitalInput;
use crate::time::TimeSource;
use display_primitives::{Level, PlayOutcome, TriggerSource};
use playback_coordinator::PlaybackController;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEBOUNCE: Duration = Duration::from_secs(2);
pub const READ_BACKOFF: Duration = Duration::from_millis(500);

/// What the button asks playback to do
pub trait PlayTrigger: Send + Sync {
    fn is_idle(&self) -> bool;

    /// Must not block until playback finishes.
    fn request_play(&self, source: TriggerSource) -> PlayOutcome;
}

impl PlayTrigger for PlaybackController {
    fn is_idle(&self) -> bool {
        !self.is_playing()
    }

    fn request_play(&self, source: TriggerSource) -> PlayOutcome {
        PlaybackController::request_play(self, source)
    }
}

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Released,
    /// Pressed, but a video is already playing
    Busy,
    /// Pressed within the debounce window of the last accepted press
    Debounced,
    Triggered(PlayOutcome),
    ReadFailed,
}

/// Debounced poller for the physical play button.
///
/// Debounce is time based: a press is accepted when playback is idle and at
/// least [`DEBOUNCE`] has passed since the last *accepted* press. A button
/// held down therefore re-triggers every debounce window once playback is idle
/// again; there is no release edge detection.
pub struct ButtonMonitor<I, P, T> {
    input: I,
    trigger: P,
    time_source: T,
    pressed: Level,
    poll_interval: Duration,
    debounce: Duration,
    read_backoff: Duration,
    last_accepted: Option<Instant>,
}

impl<I, P, T> ButtonMonitor<I, P, T>
where
    I: DigitalInput,
    P: PlayTrigger,
    T: TimeSource,
{
    /// Active-low button (pull-up wiring) with the default timing
    pub fn new(input: I, trigger: P, time_source: T) -> Self {
        Self {
            input,
            trigger,
            time_source,
            pressed: Level::Low,
            poll_interval: POLL_INTERVAL,
            debounce: DEBOUNCE,
            read_backoff: READ_BACKOFF,
            last_accepted: None,
        }
    }

    pub fn with_pressed_level(mut self, pressed: Level) -> Self {
        self.pressed = pressed;
        self
    }

    pub fn with_timing(
        mut self,
        poll_interval: Duration,
        debounce: Duration,
        read_backoff: Duration,
    ) -> Self {
        self.poll_interval = poll_interval;
        self.debounce = debounce;
        self.read_backoff = read_backoff;
        self
    }

    pub fn tick(&mut self) -> TickOutcome {
        // Blocking read; a sysfs value file is served from kernel memory
        let level = match self.input.read() {
            Ok(level) => level,
            Err(e) => {
                error!("Error in button monitor: {}", e);
                return TickOutcome::ReadFailed;
            }
        };

        if level != self.pressed {
            return TickOutcome::Released;
        }

        if !self.trigger.is_idle() {
            return TickOutcome::Busy;
        }

        let now = self.time_source.now();
        if let Some(last) = self.last_accepted {
            if now.duration_since(last) < self.debounce {
                return TickOutcome::Debounced;
            }
        }

        self.last_accepted = Some(now);
        debug!("Button press detected (debounced)");
        TickOutcome::Triggered(self.trigger.request_play(TriggerSource::Button))
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting button monitor loop");

        while !shutdown.is_cancelled() {
            let pause = match self.tick() {
                TickOutcome::ReadFailed => self.read_backoff,
                _ => self.poll_interval,
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("Button monitor loop exiting");
    }
}
