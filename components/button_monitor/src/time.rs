use std::time::Instant;

pub trait TimeSource {
    fn now(&self) -> Instant;
}

#[derive(Clone)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
