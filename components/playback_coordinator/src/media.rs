use display_primitives::MediaPaths;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared, externally settable selection of the idle image and the video.
///
/// Readers always get the value current at the moment of the call; nothing
/// downstream caches it.
#[derive(Debug, Clone)]
pub struct MediaSelection {
    paths: Arc<RwLock<MediaPaths>>,
}

impl MediaSelection {
    pub fn new(paths: MediaPaths) -> Self {
        Self {
            paths: Arc::new(RwLock::new(paths)),
        }
    }

    pub fn image_path(&self) -> PathBuf {
        self.paths.read().image.clone()
    }

    pub fn video_path(&self) -> PathBuf {
        self.paths.read().video.clone()
    }

    pub fn set_image_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::info!("Image selection updated: {}", path.display());
        self.paths.write().image = path;
    }

    pub fn set_video_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::info!("Video selection updated: {}", path.display());
        self.paths.write().video = path;
    }

    pub fn snapshot(&self) -> MediaPaths {
        self.paths.read().clone()
    }
}
