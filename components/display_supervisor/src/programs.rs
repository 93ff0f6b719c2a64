// components/display_supervisor/src/programs.rs
use crate::launcher::CommandSpec;
use std::path::Path;

pub const DEFAULT_DRM_CONNECTOR: &str = "HDMI-A-1";
pub const DEFAULT_AUDIO_DEVICE: &str = "alsa/hdmi:CARD=vc4hdmi0,DEV=0";

/// How to invoke one external display program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Name matched by the kill-by-name sweep
    pub process_name: String,
}

impl ProgramSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let process_name = Path::new(&program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());

        Self {
            program,
            args,
            env: Vec::new(),
            process_name,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Full invocation with the media file as the last argument
    pub fn command_for(&self, media: &Path) -> CommandSpec {
        let mut args = self.args.clone();
        args.push(media.to_string_lossy().into_owned());

        CommandSpec {
            program: self.program.clone(),
            args,
            env: self.env.clone(),
        }
    }
}

/// The image viewer and video player driving the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPrograms {
    pub image_viewer: ProgramSpec,
    pub video_player: ProgramSpec,
}

impl DisplayPrograms {
    /// Framebuffer image viewer: quiet, on virtual terminal 1, autozoomed
    pub fn fbi(program: impl Into<String>) -> ProgramSpec {
        ProgramSpec::new(
            program,
            vec![
                "--noverbose".to_string(),
                "-T".to_string(),
                "1".to_string(),
                "-a".to_string(),
            ],
        )
    }

    /// DRM fullscreen video player without controls, looping or terminal output
    pub fn mpv(program: impl Into<String>, connector: &str, audio_device: &str) -> ProgramSpec {
        let args = vec![
            "--vo=gpu".to_string(),
            "--gpu-context=drm".to_string(),
            "--gpu-api=opengl".to_string(),
            format!("--drm-connector={}", connector),
            "--fullscreen".to_string(),
            "--no-osc".to_string(),
            "--loop=no".to_string(),
            "--no-osd-bar".to_string(),
            "--no-terminal".to_string(),
            "--really-quiet".to_string(),
            "--msg-level=all=no".to_string(),
            format!("--audio-device={}", audio_device),
            "--volume=100".to_string(),
        ];

        ProgramSpec::new(program, args)
            .with_env("SDL_VIDEODRIVER", "drm")
            .with_env("DISPLAY", "")
    }

    pub fn new(image_viewer: ProgramSpec, video_player: ProgramSpec) -> Self {
        Self {
            image_viewer,
            video_player,
        }
    }
}

impl Default for DisplayPrograms {
    fn default() -> Self {
        Self::new(
            Self::fbi("fbi"),
            Self::mpv("mpv", DEFAULT_DRM_CONNECTOR, DEFAULT_AUDIO_DEVICE),
        )
    }
}
