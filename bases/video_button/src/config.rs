// bases/video_button/src/config.rs
use button_monitor::DEFAULT_GPIO_ROOT;
use clap::Parser;
use display_primitives::MediaPaths;
use display_supervisor::{
    DisplayPrograms, DEFAULT_AUDIO_DEVICE, DEFAULT_DRM_CONNECTOR, DEFAULT_GRACE,
};
use std::path::PathBuf;
use std::time::Duration;

const MIN_GRACE_MS: u64 = 100;
const MAX_GRACE_MS: u64 = 5000;

/// Where the physical play button is wired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonConfig {
    pub pin: u32,
    pub gpio_root: PathBuf,
}

/// Video button configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the remote trigger
    pub port: u16,

    /// Initial image and video selection
    pub media: MediaPaths,

    /// `None` when running without a physical button
    pub button: Option<ButtonConfig>,

    pub programs: DisplayPrograms,

    /// How long a display program gets to exit after SIGTERM
    pub grace: Duration,
}

/// Video Button - plays a video on the attached display at the push of a button
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Port to listen on for remote triggers
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    /// Idle image shown whenever no video plays
    #[arg(long, default_value = "/home/tech/default_image.png")]
    pub image: PathBuf,

    /// Video played when triggered
    #[arg(long, default_value = "/home/tech/default_video.mp4")]
    pub video: PathBuf,

    /// BCM number of the GPIO pin the button pulls low
    #[arg(long, default_value_t = 17)]
    pub button_pin: u32,

    /// Root of the sysfs GPIO interface
    #[arg(long, default_value = DEFAULT_GPIO_ROOT)]
    pub gpio_root: PathBuf,

    /// Run without a physical button (remote trigger only)
    #[arg(long)]
    pub no_button: bool,

    /// Framebuffer image viewer program
    #[arg(long, default_value = "fbi")]
    pub image_viewer: String,

    /// DRM capable video player program
    #[arg(long, default_value = "mpv")]
    pub video_player: String,

    /// DRM connector the video player outputs to
    #[arg(long, default_value = DEFAULT_DRM_CONNECTOR)]
    pub drm_connector: String,

    /// Audio device the video player routes sound to
    #[arg(long, default_value = DEFAULT_AUDIO_DEVICE)]
    pub audio_device: String,

    /// Milliseconds a display program gets to exit before it is killed
    #[arg(long, default_value_t = DEFAULT_GRACE.as_millis() as u64)]
    pub grace_ms: u64,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Self {
        let button = (!args.no_button).then(|| ButtonConfig {
            pin: args.button_pin,
            gpio_root: args.gpio_root,
        });

        let programs = DisplayPrograms::new(
            DisplayPrograms::fbi(args.image_viewer),
            DisplayPrograms::mpv(args.video_player, &args.drm_connector, &args.audio_device),
        );

        let grace = Duration::from_millis(args.grace_ms.clamp(MIN_GRACE_MS, MAX_GRACE_MS));

        Self {
            port: args.port,
            media: MediaPaths::new(args.image, args.video),
            button,
            programs,
            grace,
        }
    }
}
