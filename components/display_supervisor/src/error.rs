use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to launch {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("media file not found: {0}")]
    MediaMissing(PathBuf),

    #[error("process sweep for {name} failed: {reason}")]
    Sweep { name: String, reason: String },

    #[error("display supervisor is shutting down")]
    ShuttingDown,

    #[error("io error during {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl SupervisorError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        SupervisorError::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        SupervisorError::Io {
            operation: operation.into(),
            source,
        }
    }

    /// True when the external program itself is not installed
    pub fn is_program_missing(&self) -> bool {
        matches!(
            self,
            SupervisorError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
