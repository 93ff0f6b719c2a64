use crate::error::{Result, SupervisorError};
use crate::process::ProcessHandle;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A fully resolved external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Capability to start, stop and sweep external display programs
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start the program with its output discarded.
    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle>;

    /// Send a graceful termination request (SIGTERM) to the process.
    async fn request_stop(&self, handle: &ProcessHandle) -> Result<()>;

    /// Force-kill every process with this exact name. No match is not an error.
    async fn kill_by_name(&self, process_name: &str) -> Result<()>;
}

/// Launches real programs through `tokio::process`
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle> {
        debug!("Spawning: {}", command);

        let child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::spawn(&command.program, e))?;

        Ok(ProcessHandle::from_child(&command.program, child))
    }

    async fn request_stop(&self, handle: &ProcessHandle) -> Result<()> {
        let Some(pid) = handle.pid() else {
            return Ok(());
        };

        let output = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .output()
            .await
            .map_err(|e| SupervisorError::io("kill -TERM", e))?;

        // Non-zero here means the pid is already gone
        if !output.status.success() {
            debug!(
                "kill -TERM {} returned {}: {}",
                pid,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }

    async fn kill_by_name(&self, process_name: &str) -> Result<()> {
        let output = Command::new("pkill")
            .args(["-9", "-x", process_name])
            .output()
            .await
            .map_err(|e| SupervisorError::io("pkill", e))?;

        // pkill: 0 = killed something, 1 = nothing matched
        match output.status.code() {
            Some(0) => {
                debug!("Swept stray {} processes", process_name);
                Ok(())
            }
            Some(1) => Ok(()),
            _ => Err(SupervisorError::Sweep {
                name: process_name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}
