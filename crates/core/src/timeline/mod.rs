use std::time::Duration;

/// Monotonic frame clock driven by explicit deltas.
///
/// The loop driver feeds it the wall-clock gap between frames; tests feed it
/// fixed steps. Nothing else in the core reads the system clock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    ticks: u64,
    elapsed: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Counts one frame and returns the new elapsed time.
    pub fn advance(&mut self, delta: Duration) -> Duration {
        self.ticks = self.ticks.saturating_add(1);
        self.elapsed = self.elapsed.saturating_add(delta);
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
