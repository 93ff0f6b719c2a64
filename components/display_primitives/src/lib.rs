use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Whether a video session currently owns the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

/// Who asked for playback to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Button,
    Remote,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Button => write!(f, "button"),
            TriggerSource::Remote => write!(f, "remote"),
        }
    }
}

/// Result of a play request, rendered by callers as user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayOutcome {
    /// This request won the transition and a session was started
    Started,
    /// Another session already owns the display; the request was dropped
    AlreadyPlaying,
    /// The selected video did not exist; state was rolled back to idle
    VideoMissing,
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, PlayOutcome::Started)
    }

    pub fn message(&self) -> &'static str {
        match self {
            PlayOutcome::Started => "Video playback triggered!",
            PlayOutcome::AlreadyPlaying => "Video is already playing. Try again later.",
            PlayOutcome::VideoMissing => "Selected video file was not found.",
        }
    }
}

/// Logic level of a digital input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn from_sysfs(raw: &str) -> Option<Self> {
        match raw.trim() {
            "0" => Some(Level::Low),
            "1" => Some(Level::High),
            _ => None,
        }
    }
}

/// The currently selected idle image and video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPaths {
    pub image: PathBuf,
    pub video: PathBuf,
}

impl MediaPaths {
    pub fn new(image: impl Into<PathBuf>, video: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            video: video.into(),
        }
    }
}
