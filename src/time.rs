//! Ambient time is always injected, never read from a wall-clock inline
//! (spec §9's "implicit ambient time" redesign flag).

use chrono::{DateTime, Utc};

pub trait TimeSource: Send + Sync {
    fn utc_now(&self) -> DateTime<Utc>;
}

/// The production clock, backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
