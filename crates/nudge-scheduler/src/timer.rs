use std::time::Duration;

use crate::clock::Clock;

/// Longest single sleep. Larger delays are slept in slices and re-checked.
pub const MAX_TIMER_DELAY_MS: i64 = i32::MAX as i64;

/// The loop's single wake-up timer.
///
/// Holds at most one deadline; [`WakeTimer::arm`] replaces whatever was set
/// before, so there is never more than one outstanding wake.
#[derive(Debug, Default)]
pub struct WakeTimer {
    deadline_ms: Option<i64>,
}

impl WakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next wake. `None` disarms.
    pub fn arm(&mut self, deadline_ms: Option<i64>) {
        self.deadline_ms = deadline_ms;
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn deadline(&self) -> Option<i64> {
        self.deadline_ms
    }

    /// How long to sleep from `now_ms`; zero when the deadline has passed.
    pub fn next_sleep(&self, now_ms: i64) -> Option<Duration> {
        self.deadline_ms.map(|deadline| {
            let delay = deadline.saturating_sub(now_ms).clamp(0, MAX_TIMER_DELAY_MS);
            Duration::from_millis(delay as u64)
        })
    }

    /// Resolve once the deadline is reached; never resolves while disarmed.
    pub async fn wait(&self, clock: &dyn Clock) {
        loop {
            let Some(delay) = self.next_sleep(clock.now_ms()) else {
                std::future::pending::<()>().await;
                return;
            };
            if delay.is_zero() {
                return;
            }
            tokio::time::sleep(delay).await;
        }
    }
}
