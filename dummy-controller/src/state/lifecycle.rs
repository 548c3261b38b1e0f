use std::{fmt, num::NonZeroU64, time::Duration};

use serde::Serialize;

/// Simulated lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    Starting,
    Ready,
    Failing,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Ready => "Ready",
            Self::Failing => "Failing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window, counted from the moment the controller became [`Phase::Ready`],
/// after which it enters [`Phase::Failing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureWindow {
    pub fail_after: Duration,
    /// When set the controller recovers to [`Phase::Ready`] after failing
    /// for this long, and the window repeats (cyclic failure mode).
    pub recover_after: Option<Duration>,
}

/// Time driven lifecycle: `Starting -> Ready [-> Failing [-> Ready -> ...]]`.
///
/// The phase is a pure function of the time elapsed since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    pub ready_delay: Duration,
    pub failure_window: Option<FailureWindow>,
}

impl Lifecycle {
    pub fn new(
        ready_delay_ms: u64,
        fail_after_ms: Option<u64>,
        recover_after_ms: Option<NonZeroU64>,
    ) -> Self {
        Self {
            ready_delay: Duration::from_millis(ready_delay_ms),
            failure_window: fail_after_ms.map(|fail_after_ms| FailureWindow {
                fail_after: Duration::from_millis(fail_after_ms),
                recover_after: recover_after_ms.map(|ms| Duration::from_millis(ms.get())),
            }),
        }
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        self.failure_window
            .is_some_and(|window| window.recover_after.is_some())
    }

    pub fn phase_at(&self, elapsed: Duration) -> Phase {
        let Some(since_ready) = elapsed.checked_sub(self.ready_delay) else {
            return Phase::Starting;
        };

        let Some(window) = self.failure_window else {
            return Phase::Ready;
        };

        match window.recover_after {
            None if since_ready < window.fail_after => Phase::Ready,
            None => Phase::Failing,
            Some(recover_after) => {
                let period = window.fail_after + recover_after;
                if position_in_period(since_ready, period) < window.fail_after {
                    Phase::Ready
                } else {
                    Phase::Failing
                }
            }
        }
    }

    /// Time left, counted from `elapsed`, until the next phase transition.
    ///
    /// Returns `None` once the lifecycle reached its terminal phase.
    pub fn next_transition_in(&self, elapsed: Duration) -> Option<Duration> {
        let Some(since_ready) = elapsed.checked_sub(self.ready_delay) else {
            return Some(self.ready_delay - elapsed);
        };

        let window = self.failure_window?;

        match window.recover_after {
            None => window.fail_after.checked_sub(since_ready).filter(|d| !d.is_zero()),
            // never ready within a period, so failing for good
            Some(_) if window.fail_after.is_zero() => None,
            Some(recover_after) => {
                let period = window.fail_after + recover_after;
                let position = position_in_period(since_ready, period);
                if position < window.fail_after {
                    Some(window.fail_after - position)
                } else {
                    Some(period - position)
                }
            }
        }
    }
}

fn position_in_period(since: Duration, period: Duration) -> Duration {
    let period_nanos = period.as_nanos();
    if period_nanos == 0 {
        return Duration::ZERO;
    }
    let position = since.as_nanos() % period_nanos;
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    // position < period, which itself fits in a Duration
    Duration::new(
        (position / NANOS_PER_SEC) as u64,
        (position % NANOS_PER_SEC) as u32,
    )
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
