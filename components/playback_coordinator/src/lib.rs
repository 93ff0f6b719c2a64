//! Playback coordination: one video session at a time, idle image otherwise

mod controller;
mod media;

pub use controller::PlaybackController;
pub use display_primitives::{MediaPaths, PlayOutcome, PlaybackState, TriggerSource};
pub use media::MediaSelection;
