//! Handles to spawned display programs
//!
//! The `Child` is moved into a dedicated wait task as soon as it is spawned.
//! Everything else talks to the process through a cloneable [`ProcessHandle`]:
//! a kill token asks the wait task to force-kill, and a watch channel publishes
//! the exit once the OS has reaped the child. This lets one task block on
//! [`ProcessHandle::wait`] while another terminates the same process.

use std::fmt;
use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How a display program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Exit without a code: killed by a signal, or lost track of
    pub fn unknown() -> Self {
        Self { code: None }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self::new(status.code())
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Opaque reference to a running (or finished) display program
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    program: String,
    pid: Option<u32>,
    kill: CancellationToken,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

/// The owning side of a [`ProcessHandle`], held by whoever reaps the process
#[derive(Debug)]
pub struct ProcessControl {
    kill: CancellationToken,
    exit_tx: watch::Sender<Option<ProcessExit>>,
}

impl ProcessHandle {
    /// Create a handle together with the control used to report its exit.
    pub fn pair(program: impl Into<String>, pid: Option<u32>) -> (Self, ProcessControl) {
        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(None);

        let handle = Self {
            program: program.into(),
            pid,
            kill: kill.clone(),
            exit_rx,
        };

        (handle, ProcessControl { kill, exit_tx })
    }

    /// Take ownership of a spawned child and reap it in the background.
    pub fn from_child(program: impl Into<String>, child: Child) -> Self {
        let (handle, control) = Self::pair(program, child.id());
        tokio::spawn(reap(handle.program.clone(), child, control));
        handle
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// True until the process has been reaped.
    pub fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none() && self.exit_rx.has_changed().is_ok()
    }

    /// The exit, if the process has already been reaped
    pub fn exit(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    /// Block until the process exits.
    pub async fn wait(&mut self) -> ProcessExit {
        match self.exit_rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or_else(ProcessExit::unknown),
            // Reaper went away without reporting
            Err(_) => ProcessExit::unknown(),
        }
    }

    /// Ask the reaper to SIGKILL the process. Idempotent.
    pub fn force_kill(&self) {
        self.kill.cancel();
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{} (pid {})", self.program, pid),
            None => write!(f, "{}", self.program),
        }
    }
}

impl ProcessControl {
    pub fn kill_requested(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Resolves once someone called [`ProcessHandle::force_kill`].
    pub async fn killed(&self) {
        self.kill.cancelled().await
    }

    /// Publish the exit to every handle.
    pub fn exit(self, exit: ProcessExit) {
        let _ = self.exit_tx.send(Some(exit));
    }
}

async fn reap(program: String, mut child: Child, control: ProcessControl) {
    let exit = tokio::select! {
        result = child.wait() => match result {
            Ok(status) => {
                debug!("{} exited with status: {:?}", program, status);
                ProcessExit::from(status)
            }
            Err(e) => {
                error!("Error waiting for {}: {}", program, e);
                ProcessExit::unknown()
            }
        },
        _ = control.killed() => {
            info!("Force-killing {}", program);
            if let Err(e) = child.kill().await {
                error!("Failed to kill {}: {}", program, e);
            }
            match child.wait().await {
                Ok(status) => ProcessExit::from(status),
                Err(e) => {
                    error!("Error waiting for {} after kill: {}", program, e);
                    ProcessExit::unknown()
                }
            }
        }
    };

    control.exit(exit);
}
