/// Fixed-timestep frame clock.
///
/// Every timer in the simulation advances by `delta_seconds()` per tick,
/// so the world behaves the same whatever the real frame pacing was.

use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    period: Duration,
}

impl FrameClock {
    pub fn from_millis(ms: u64) -> Self {
        FrameClock { period: Duration::from_millis(ms.max(1)) }
    }

    pub fn delta_seconds(&self) -> f32 {
        self.period.as_secs_f32()
    }

    pub fn period_ms(&self) -> u64 {
        self.period.as_millis() as u64
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
