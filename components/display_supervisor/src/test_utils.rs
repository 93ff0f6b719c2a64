//! Fakes for exercising supervision without touching real processes
//!
//! [`FakeLauncher`] stands in for the OS below a [`ProcessSupervisor`];
//! [`RecordingSupervisor`] stands in for the whole supervisor when testing
//! the playback controller.
//!
//! [`ProcessSupervisor`]: crate::ProcessSupervisor

use crate::error::{Result, SupervisorError};
use crate::launcher::{CommandSpec, ProcessLauncher};
use crate::process::{ProcessExit, ProcessHandle};
use crate::supervisor::DisplaySupervisor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(5);
const PATIENCE: usize = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Spawned { program: String, args: Vec<String> },
    StopRequested { program: String },
    Killed { program: String },
    Swept { name: String },
}

struct FakeProcess {
    pid: u32,
    handle: ProcessHandle,
    finish: Option<oneshot::Sender<ProcessExit>>,
}

/// Launcher that records every request and simulates process lifetimes
pub struct FakeLauncher {
    events: Arc<Mutex<Vec<LaunchEvent>>>,
    running: Arc<Mutex<Vec<FakeProcess>>>,
    next_pid: AtomicU32,
    missing_programs: Vec<String>,
    obey_stop: bool,
    slow_sweeps: Vec<(String, Duration)>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(Mutex::new(Vec::new())),
            next_pid: AtomicU32::new(1000),
            missing_programs: Vec::new(),
            obey_stop: true,
            slow_sweeps: Vec::new(),
        }
    }

    /// Pretend `program` is not installed.
    pub fn failing(mut self, program: &str) -> Self {
        self.missing_programs.push(program.to_string());
        self
    }

    /// Processes ignore SIGTERM and only die when force-killed.
    pub fn ignoring_stop(mut self) -> Self {
        self.obey_stop = false;
        self
    }

    /// Sweeps for `name` take `delay` before they kill anything.
    pub fn with_slow_sweep(mut self, name: &str, delay: Duration) -> Self {
        self.slow_sweeps.push((name.to_string(), delay));
        self
    }

    pub fn events(&self) -> Vec<LaunchEvent> {
        self.events.lock().clone()
    }

    /// Number of live fake processes for `program`
    pub fn running(&self, program: &str) -> usize {
        self.running
            .lock()
            .iter()
            .filter(|p| p.handle.program() == program)
            .count()
    }

    /// Make the newest live `program` exit on its own.
    pub fn finish(&self, program: &str, code: Option<i32>) {
        let sender = self
            .running
            .lock()
            .iter_mut()
            .rev()
            .find(|p| p.handle.program() == program)
            .and_then(|p| p.finish.take());

        if let Some(sender) = sender {
            let _ = sender.send(ProcessExit::new(code));
        }
    }

    pub async fn wait_for_spawn(&self, program: &str) {
        for _ in 0..PATIENCE {
            let spawned = self.events.lock().iter().any(
                |e| matches!(e, LaunchEvent::Spawned { program: p, .. } if p == program),
            );
            if spawned {
                return;
            }
            tokio::time::sleep(POLL).await;
        }
        panic!("{} was never spawned", program);
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle> {
        if self.missing_programs.contains(&command.program) {
            return Err(SupervisorError::spawn(
                &command.program,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (handle, control) = ProcessHandle::pair(&command.program, Some(pid));
        let (finish_tx, finish_rx) = oneshot::channel();

        self.events.lock().push(LaunchEvent::Spawned {
            program: command.program.clone(),
            args: command.args.clone(),
        });
        self.running.lock().push(FakeProcess {
            pid,
            handle: handle.clone(),
            finish: Some(finish_tx),
        });

        let events = Arc::clone(&self.events);
        let running = Arc::clone(&self.running);
        let program = command.program.clone();
        tokio::spawn(async move {
            let exit = tokio::select! {
                _ = control.killed() => {
                    events.lock().push(LaunchEvent::Killed { program });
                    ProcessExit::unknown()
                }
                result = finish_rx => result.unwrap_or_else(|_| ProcessExit::unknown()),
            };
            running.lock().retain(|p| p.pid != pid);
            control.exit(exit);
        });

        Ok(handle)
    }

    async fn request_stop(&self, handle: &ProcessHandle) -> Result<()> {
        self.events.lock().push(LaunchEvent::StopRequested {
            program: handle.program().to_string(),
        });

        if self.obey_stop {
            let sender = self
                .running
                .lock()
                .iter_mut()
                .find(|p| Some(p.pid) == handle.pid())
                .and_then(|p| p.finish.take());
            if let Some(sender) = sender {
                let _ = sender.send(ProcessExit::unknown());
            }
        }

        Ok(())
    }

    async fn kill_by_name(&self, process_name: &str) -> Result<()> {
        self.events.lock().push(LaunchEvent::Swept {
            name: process_name.to_string(),
        });

        let delay = self
            .slow_sweeps
            .iter()
            .find(|(name, _)| name == process_name)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        for process in self.running.lock().iter() {
            if process.handle.program() == process_name {
                process.handle.force_kill();
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCall {
    ShowIdleImage(PathBuf),
    PlayVideo(PathBuf),
    Shutdown,
}

/// Supervisor that records calls; videos run until [`RecordingSupervisor::finish_video`]
#[derive(Default)]
pub struct RecordingSupervisor {
    calls: Mutex<Vec<SupervisorCall>>,
    video_done: Notify,
    stopped: CancellationToken,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail_videos: bool,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `play_video` fails as if the player were not installed.
    pub fn failing_videos() -> Self {
        Self {
            fail_videos: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.calls.lock().clone()
    }

    /// End the running (or next) video session.
    pub fn finish_video(&self) {
        self.video_done.notify_one();
    }

    /// Highest number of supervisor calls that were ever in flight at once
    pub fn max_overlap(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, count: usize) -> Vec<SupervisorCall> {
        for _ in 0..PATIENCE {
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(POLL).await;
        }
        self.calls()
    }

    fn enter(&self, call: SupervisorCall) {
        self.calls.lock().push(call);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DisplaySupervisor for RecordingSupervisor {
    async fn show_idle_image(&self, path: &Path) -> Result<()> {
        self.enter(SupervisorCall::ShowIdleImage(path.to_path_buf()));
        tokio::task::yield_now().await;
        self.leave();
        Ok(())
    }

    async fn play_video(&self, path: &Path) -> Result<ProcessExit> {
        self.enter(SupervisorCall::PlayVideo(path.to_path_buf()));

        if self.fail_videos {
            self.leave();
            return Err(SupervisorError::spawn(
                "mpv",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        let exit = tokio::select! {
            _ = self.video_done.notified() => ProcessExit::new(Some(0)),
            _ = self.stopped.cancelled() => ProcessExit::unknown(),
        };
        self.leave();
        Ok(exit)
    }

    async fn shutdown(&self) {
        self.calls.lock().push(SupervisorCall::Shutdown);
        self.stopped.cancel();
    }
}
