//! The physical play button: a polled digital input with time-based debounce

mod input;
mod monitor;
mod time;

pub use input::{DigitalInput, InputError, SysfsGpio, DEFAULT_GPIO_ROOT};
pub use monitor::{ButtonMonitor, PlayTrigger, TickOutcome, DEBOUNCE, POLL_INTERVAL, READ_BACKOFF};
pub use time::{SystemTimeSource, TimeSource};
