//! Supervision of the external programs that drive the display
//!
//! Only one image viewer and one video player are ever tracked. Starting
//! either first drives the previous occupant of the framebuffer through an
//! escalating termination (see [`ProcessSupervisor`]).

mod error;
mod launcher;
mod process;
mod programs;
mod supervisor;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use error::{Result, SupervisorError};
pub use launcher::{CommandSpec, ProcessLauncher, SystemLauncher};
pub use process::{ProcessControl, ProcessExit, ProcessHandle};
pub use programs::{DisplayPrograms, ProgramSpec, DEFAULT_AUDIO_DEVICE, DEFAULT_DRM_CONNECTOR};
pub use supervisor::{DisplaySupervisor, ProcessSupervisor, DEFAULT_GRACE};
