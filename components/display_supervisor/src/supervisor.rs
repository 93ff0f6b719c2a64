use crate::error::{Result, SupervisorError};
use crate::launcher::{ProcessLauncher, SystemLauncher};
use crate::process::{ProcessExit, ProcessHandle};
use crate::programs::DisplayPrograms;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owner of the display's foreground process.
///
/// Callers must not invoke these concurrently; the playback controller
/// serializes them behind its state transition.
#[async_trait]
pub trait DisplaySupervisor: Send + Sync {
    /// Replace whatever image viewer is running with one showing `path`.
    async fn show_idle_image(&self, path: &Path) -> Result<()>;

    /// Take the display from the image viewer and play `path` until the player exits.
    async fn play_video(&self, path: &Path) -> Result<ProcessExit>;

    /// Kill every tracked and stray display process. Nothing is spawned afterwards.
    async fn shutdown(&self);
}

pub const DEFAULT_GRACE: Duration = Duration::from_millis(750);

/// Tracks at most one image viewer and one video player
pub struct ProcessSupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    programs: DisplayPrograms,
    grace: Duration,
    image: Mutex<Option<ProcessHandle>>,
    video: Mutex<Option<ProcessHandle>>,
    stopped: CancellationToken,
}

impl ProcessSupervisor {
    pub fn new(programs: DisplayPrograms, grace: Duration) -> Self {
        Self::with_launcher(Arc::new(SystemLauncher), programs, grace)
    }

    pub fn with_launcher(
        launcher: Arc<dyn ProcessLauncher>,
        programs: DisplayPrograms,
        grace: Duration,
    ) -> Self {
        Self {
            launcher,
            programs,
            grace,
            image: Mutex::new(None),
            video: Mutex::new(None),
            stopped: CancellationToken::new(),
        }
    }

    fn refuse_after_shutdown(&self) -> Result<()> {
        if self.stopped.is_cancelled() {
            debug!("Not starting display programs, shutting down");
            return Err(SupervisorError::ShuttingDown);
        }
        Ok(())
    }

    /// Put a freshly spawned process in its slot. If shutdown began while it
    /// was starting, the slot may already have been emptied, so kill it here.
    async fn track(
        &self,
        slot: &Mutex<Option<ProcessHandle>>,
        handle: &ProcessHandle,
    ) -> Result<()> {
        *slot.lock() = Some(handle.clone());

        if self.stopped.is_cancelled() {
            warn!("{} started during shutdown, killing it", handle);
            slot.lock().take();
            handle.force_kill();
            if !exited_within(handle, self.grace).await {
                error!("{} still alive after force kill", handle);
            }
            return Err(SupervisorError::ShuttingDown);
        }

        Ok(())
    }

    /// Escalating termination: SIGTERM, then SIGKILL after the grace window,
    /// then a kill-by-name sweep for instances we lost track of (e.g. left
    /// behind by a crashed previous run).
    async fn terminate(&self, tracked: Option<ProcessHandle>, process_name: &str) {
        if let Some(handle) = tracked {
            if handle.is_alive() {
                debug!("Terminating {}", handle);

                if let Err(e) = self.launcher.request_stop(&handle).await {
                    debug!("Terminate request for {} failed: {}", handle, e);
                }

                if !exited_within(&handle, self.grace).await {
                    warn!("{} ignored terminate request, force killing", handle);
                    handle.force_kill();

                    if !exited_within(&handle, self.grace).await {
                        error!("{} still alive after force kill", handle);
                    }
                }
            }
        }

        if let Err(e) = self.launcher.kill_by_name(process_name).await {
            warn!("Sweep for stray {} processes failed: {}", process_name, e);
        }
    }
}

async fn exited_within(handle: &ProcessHandle, grace: Duration) -> bool {
    let mut waiter = handle.clone();
    timeout(grace, waiter.wait()).await.is_ok()
}

#[async_trait]
impl DisplaySupervisor for ProcessSupervisor {
    async fn show_idle_image(&self, path: &Path) -> Result<()> {
        info!("Showing idle image: {}", path.display());

        let previous = self.image.lock().take();
        self.terminate(previous, &self.programs.image_viewer.process_name)
            .await;
        if let Err(e) = self
            .launcher
            .kill_by_name(&self.programs.video_player.process_name)
            .await
        {
            warn!("Sweep for stray video players failed: {}", e);
        }

        if !path.exists() {
            error!("Image file not found: {}", path.display());
            return Err(SupervisorError::MediaMissing(path.to_path_buf()));
        }

        self.refuse_after_shutdown()?;
        let command = self.programs.image_viewer.command_for(path);
        let handle = self.launcher.spawn(&command).await.inspect_err(|e| {
            error!("Error showing image {}: {}", path.display(), e);
        })?;

        self.track(&self.image, &handle).await?;
        info!("Image viewer started: {}", handle);

        Ok(())
    }

    async fn play_video(&self, path: &Path) -> Result<ProcessExit> {
        info!("Playing video: {}", path.display());

        // Image and video share the framebuffer; the viewer must be gone first
        let viewer = self.image.lock().take();
        self.terminate(viewer, &self.programs.image_viewer.process_name)
            .await;

        let stale = self.video.lock().take();
        if stale.is_some() {
            self.terminate(stale, &self.programs.video_player.process_name)
                .await;
        }

        if !path.exists() {
            error!("Video file not found: {}", path.display());
            return Err(SupervisorError::MediaMissing(path.to_path_buf()));
        }

        self.refuse_after_shutdown()?;
        let command = self.programs.video_player.command_for(path);
        let mut handle = self.launcher.spawn(&command).await.inspect_err(|e| {
            error!("Error playing video {}: {}", path.display(), e);
        })?;

        self.track(&self.video, &handle).await?;
        info!("Video player started: {}", handle);

        let exit = handle.wait().await;
        self.video.lock().take();

        info!("Video player finished with {}", exit);
        Ok(exit)
    }

    async fn shutdown(&self) {
        info!("Stopping all display processes");
        self.stopped.cancel();

        let video = self.video.lock().take();
        self.terminate(video, &self.programs.video_player.process_name)
            .await;

        let image = self.image.lock().take();
        self.terminate(image, &self.programs.image_viewer.process_name)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeLauncher, LaunchEvent};
    use assert_matches::assert_matches;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        image: PathBuf,
        video: PathBuf,
        launcher: Arc<FakeLauncher>,
        supervisor: Arc<ProcessSupervisor>,
    }

    fn fixture(launcher: FakeLauncher) -> Fixture {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("idle.png");
        let video = dir.path().join("clip.mp4");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&video, b"mp4").unwrap();

        let launcher = Arc::new(launcher);
        let supervisor = Arc::new(ProcessSupervisor::with_launcher(
            launcher.clone(),
            DisplayPrograms::default(),
            Duration::from_millis(100),
        ));

        Fixture {
            _dir: dir,
            image,
            video,
            launcher,
            supervisor,
        }
    }

    fn spawned(events: &[LaunchEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                LaunchEvent::Spawned { program, .. } => Some(program.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn show_idle_image_spawns_viewer_for_path() {
        let f = fixture(FakeLauncher::new());

        f.supervisor.show_idle_image(&f.image).await.unwrap();

        let events = f.launcher.events();
        assert_matches!(
            events.last(),
            Some(LaunchEvent::Spawned { program, args }) if program == "fbi"
                && args.last() == Some(&f.image.display().to_string())
        );
        assert_eq!(f.launcher.running("fbi"), 1);
    }

    #[tokio::test]
    async fn show_idle_image_replaces_previous_viewer() {
        let f = fixture(FakeLauncher::new());

        f.supervisor.show_idle_image(&f.image).await.unwrap();
        f.supervisor.show_idle_image(&f.image).await.unwrap();

        let events = f.launcher.events();
        assert_eq!(spawned(&events), vec!["fbi", "fbi"]);
        assert!(events.contains(&LaunchEvent::StopRequested {
            program: "fbi".to_string()
        }));
        assert_eq!(f.launcher.running("fbi"), 1);
    }

    #[tokio::test]
    async fn missing_image_is_reported_without_spawning() {
        let f = fixture(FakeLauncher::new());

        let result = f.supervisor.show_idle_image(Path::new("/nope.png")).await;

        assert_matches!(result, Err(SupervisorError::MediaMissing(_)));
        assert!(spawned(&f.launcher.events()).is_empty());
    }

    #[tokio::test]
    async fn missing_viewer_program_is_a_spawn_error() {
        let f = fixture(FakeLauncher::new().failing("fbi"));

        let result = f.supervisor.show_idle_image(&f.image).await;

        assert_matches!(result, Err(e) if e.is_program_missing());
    }

    #[tokio::test]
    async fn play_video_stops_viewer_before_spawning_player() {
        let f = fixture(FakeLauncher::new());
        f.supervisor.show_idle_image(&f.image).await.unwrap();

        let supervisor = f.supervisor.clone();
        let video = f.video.clone();
        let session = tokio::spawn(async move { supervisor.play_video(&video).await });

        f.launcher.wait_for_spawn("mpv").await;
        let events = f.launcher.events();

        let stop_viewer = events
            .iter()
            .position(|e| matches!(e, LaunchEvent::StopRequested { program } if program == "fbi"))
            .expect("viewer was asked to stop");
        let sweep_viewer = events
            .iter()
            .position(|e| matches!(e, LaunchEvent::Swept { name } if name == "fbi"))
            .expect("viewer name was swept");
        let start_player = events
            .iter()
            .position(|e| matches!(e, LaunchEvent::Spawned { program, .. } if program == "mpv"))
            .unwrap();

        assert!(stop_viewer < start_player);
        assert!(sweep_viewer < start_player);
        assert_eq!(f.launcher.running("fbi"), 0);

        f.launcher.finish("mpv", Some(0));
        let exit = session.await.unwrap().unwrap();
        assert!(exit.success());
    }

    #[tokio::test]
    async fn play_video_reports_player_exit_code() {
        let f = fixture(FakeLauncher::new());

        let supervisor = f.supervisor.clone();
        let video = f.video.clone();
        let session = tokio::spawn(async move { supervisor.play_video(&video).await });

        f.launcher.wait_for_spawn("mpv").await;
        f.launcher.finish("mpv", Some(2));

        let exit = session.await.unwrap().unwrap();
        assert_eq!(exit.code(), Some(2));
    }

    #[tokio::test]
    async fn play_video_with_missing_file_spawns_nothing() {
        let f = fixture(FakeLauncher::new());

        let result = f.supervisor.play_video(Path::new("/media/missing.mp4")).await;

        assert_matches!(result, Err(SupervisorError::MediaMissing(path)) if path == Path::new("/media/missing.mp4"));
        assert!(spawned(&f.launcher.events()).is_empty());
    }

    #[tokio::test]
    async fn stubborn_process_is_force_killed() {
        let f = fixture(FakeLauncher::new().ignoring_stop());

        f.supervisor.show_idle_image(&f.image).await.unwrap();
        f.supervisor.show_idle_image(&f.image).await.unwrap();

        assert!(f.launcher.events().contains(&LaunchEvent::Killed {
            program: "fbi".to_string()
        }));
        assert_eq!(f.launcher.running("fbi"), 1);
    }

    #[tokio::test]
    async fn shutdown_ends_running_video_session() {
        let f = fixture(FakeLauncher::new());

        let supervisor = f.supervisor.clone();
        let video = f.video.clone();
        let session = tokio::spawn(async move { supervisor.play_video(&video).await });
        f.launcher.wait_for_spawn("mpv").await;

        f.supervisor.shutdown().await;

        let exit = session.await.unwrap().unwrap();
        assert!(!exit.success());
        assert_eq!(f.launcher.running("mpv"), 0);

        let events = f.launcher.events();
        assert!(events.contains(&LaunchEvent::Swept {
            name: "mpv".to_string()
        }));
        assert!(events.contains(&LaunchEvent::Swept {
            name: "fbi".to_string()
        }));
    }

    #[tokio::test]
    async fn nothing_is_spawned_after_shutdown() {
        let f = fixture(FakeLauncher::new());

        f.supervisor.shutdown().await;

        assert_matches!(
            f.supervisor.show_idle_image(&f.image).await,
            Err(SupervisorError::ShuttingDown)
        );
        assert_matches!(
            f.supervisor.play_video(&f.video).await,
            Err(SupervisorError::ShuttingDown)
        );
        assert!(spawned(&f.launcher.events()).is_empty());
    }

    #[tokio::test]
    async fn shutdown_during_viewer_teardown_keeps_player_from_starting() {
        let f = fixture(FakeLauncher::new().with_slow_sweep("fbi", Duration::from_millis(200)));
        f.supervisor.show_idle_image(&f.image).await.unwrap();

        let supervisor = f.supervisor.clone();
        let video = f.video.clone();
        let session = tokio::spawn(async move { supervisor.play_video(&video).await });

        // the session is still sweeping fbi when shutdown starts
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.supervisor.shutdown().await;

        let result = timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert_matches!(result, Err(SupervisorError::ShuttingDown));
        assert_eq!(spawned(&f.launcher.events()), vec!["fbi"]);
        assert_eq!(f.launcher.running("mpv"), 0);
        assert_eq!(f.launcher.running("fbi"), 0);
    }

    #[tokio::test]
    async fn process_started_while_shutting_down_is_killed() {
        let f = fixture(FakeLauncher::new());
        let command = DisplayPrograms::default().video_player.command_for(&f.video);
        let handle = f.launcher.spawn(&command).await.unwrap();

        f.supervisor.stopped.cancel();
        let result = f.supervisor.track(&f.supervisor.video, &handle).await;

        assert_matches!(result, Err(SupervisorError::ShuttingDown));
        assert!(f.supervisor.video.lock().is_none());
        assert!(!handle.is_alive());
        assert_eq!(f.launcher.running("mpv"), 0);
    }
}
