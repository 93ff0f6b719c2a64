// bases/video_button/src/main.rs
use button_monitor::{ButtonMonitor, SysfsGpio, SystemTimeSource};
use clap::Parser;
use color_eyre::Result;
use display_supervisor::ProcessSupervisor;
use playback_coordinator::{MediaSelection, PlaybackController};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod config;
mod environment;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "video_button=info,playback_coordinator=info,display_supervisor=info,button_monitor=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let args = config::CliArgs::parse();
    let config = config::Config::from_args(args);

    environment::check_environment(&config);

    // A button that cannot be set up is the one fatal startup error
    let gpio = match &config.button {
        Some(button) => Some(SysfsGpio::open(&button.gpio_root, button.pin).await?),
        None => {
            tracing::warn!("Running without a physical button, remote trigger only");
            None
        }
    };

    let shutdown = CancellationToken::new();
    let supervisor = Arc::new(ProcessSupervisor::new(config.programs.clone(), config.grace));
    let controller = PlaybackController::new(
        supervisor,
        MediaSelection::new(config.media.clone()),
        shutdown.clone(),
    );

    controller.refresh_idle_image().await;

    let monitor = gpio.map(|gpio| {
        tracing::info!("Watching button on GPIO pin {}", gpio.pin());
        let monitor = ButtonMonitor::new(gpio, controller.clone(), SystemTimeSource);
        tokio::spawn(monitor.run(shutdown.clone()))
    });

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, shutting down");
                signal.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for interrupt: {}", e),
        }
    });

    let served = server::run(controller.clone(), config.port, shutdown.clone()).await;

    // the server may also stop on its own (e.g. port in use)
    shutdown.cancel();
    controller.shutdown().await;
    if let Some(monitor) = monitor {
        if let Err(e) = monitor.await {
            tracing::error!("Button monitor task failed: {}", e);
        }
    }

    tracing::info!("Video button stopped");
    served
}
