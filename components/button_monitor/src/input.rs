// components/button_monitor/src/input.rs
use display_primitives::Level;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Attempts at configuring a freshly exported pin; udev may still be
/// fixing up permissions on the new directory
const SETUP_ATTEMPTS: u32 = 10;
const SETUP_RETRY: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to set up GPIO pin {pin} at {path}")]
    Setup {
        pin: u32,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read GPIO pin {pin}")]
    Read {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("unexpected value {value:?} on GPIO pin {pin}")]
    InvalidValue { pin: u32, value: String },
}

/// A polled boolean input
///
/// `read` is synchronous and is called straight from the async poll loop, so
/// implementations must return quickly.
pub trait DigitalInput: Send {
    fn read(&mut self) -> Result<Level, InputError>;
}

/// GPIO input pin through the sysfs interface
#[derive(Debug)]
pub struct SysfsGpio {
    pin: u32,
    root: PathBuf,
    value_path: PathBuf,
    exported_by_us: bool,
}

impl SysfsGpio {
    /// Export `pin` (if needed), configure it as an input and check it reads.
    ///
    /// Pull-up/pull-down must be configured outside (device tree or `raspi-gpio`).
    pub async fn open(root: impl Into<PathBuf>, pin: u32) -> Result<Self, InputError> {
        let root = root.into();
        let pin_dir = root.join(format!("gpio{}", pin));
        let setup_err = |path: &Path, source: io::Error| InputError::Setup {
            pin,
            path: path.to_path_buf(),
            source,
        };

        let mut exported_by_us = false;
        if !pin_dir.exists() {
            let export = root.join("export");
            debug!("Exporting GPIO pin {} via {}", pin, export.display());
            tokio::fs::write(&export, pin.to_string())
                .await
                .map_err(|e| setup_err(&export, e))?;
            exported_by_us = true;
        }

        let direction = pin_dir.join("direction");
        let mut attempt = 1;
        loop {
            match tokio::fs::write(&direction, "in").await {
                Ok(()) => break,
                Err(e) if attempt >= SETUP_ATTEMPTS => return Err(setup_err(&direction, e)),
                Err(e) => {
                    debug!("GPIO pin {} not ready yet ({}), retrying", pin, e);
                    attempt += 1;
                    tokio::time::sleep(SETUP_RETRY).await;
                }
            }
        }

        let mut gpio = Self {
            pin,
            root,
            value_path: pin_dir.join("value"),
            exported_by_us,
        };

        let level = gpio.read().map_err(|e| match e {
            InputError::Read { source, .. } => setup_err(&gpio.value_path, source),
            other => other,
        })?;
        info!("GPIO pin {} ready, currently {:?}", pin, level);

        Ok(gpio)
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

impl DigitalInput for SysfsGpio {
    fn read(&mut self) -> Result<Level, InputError> {
        let raw = std::fs::read_to_string(&self.value_path).map_err(|source| InputError::Read {
            pin: self.pin,
            source,
        })?;

        Level::from_sysfs(&raw).ok_or_else(|| InputError::InvalidValue {
            pin: self.pin,
            value: raw.trim().to_string(),
        })
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if self.exported_by_us {
            debug!("Releasing GPIO pin {}", self.pin);
            let _ = std::fs::write(self.root.join("unexport"), self.pin.to_string());
        }
    }
}
