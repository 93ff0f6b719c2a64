// bases/video_button/src/environment.rs
//! Startup sanity check of the display programs and media files
//!
//! Nothing here is fatal: a missing program or file shows up in the log and
//! again as a spawn or media error when it is actually needed.

use crate::config::Config;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub installed: Vec<(String, PathBuf)>,
    pub missing_programs: Vec<String>,
    pub image_exists: bool,
    pub video_exists: bool,
}

pub fn check_environment(config: &Config) -> EnvironmentReport {
    info!("Checking environment setup...");

    let mut installed = Vec::new();
    let mut missing_programs = Vec::new();
    for program in [
        &config.programs.image_viewer.program,
        &config.programs.video_player.program,
    ] {
        match which::which(program) {
            Ok(path) => {
                info!("{} is installed at {}", program, path.display());
                installed.push((program.clone(), path));
            }
            Err(_) => {
                error!("{} is NOT installed or not in PATH", program);
                missing_programs.push(program.clone());
            }
        }
    }

    let image_exists = config.media.image.exists();
    let video_exists = config.media.video.exists();
    if !image_exists {
        warn!("Default image not found: {}", config.media.image.display());
    }
    if !video_exists {
        warn!("Default video not found: {}", config.media.video.display());
    }

    EnvironmentReport {
        installed,
        missing_programs,
        image_exists,
        video_exists,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliArgs;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn reports_missing_programs_and_media() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("idle.png");
        std::fs::write(&image, b"png").unwrap();

        let args = CliArgs::parse_from([
            "video-button",
            "--image-viewer",
            "sh",
            "--video-player",
            "definitely-not-an-installed-player",
            "--image",
            image.to_str().unwrap(),
            "--video",
            "/nonexistent/clip.mp4",
        ]);
        let report = check_environment(&Config::from_args(args));

        assert_eq!(report.installed.len(), 1);
        assert_eq!(report.installed[0].0, "sh");
        assert_eq!(
            report.missing_programs,
            vec!["definitely-not-an-installed-player".to_string()]
        );
        assert!(report.image_exists);
        assert!(!report.video_exists);
    }
}
