//! In-memory, process-lifetime state of the dummy controller.

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use rama::{graceful::WeakShutdownGuard, telemetry::tracing};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::ControllerConfig;

mod counters;
mod dice;
mod lifecycle;

pub use self::{
    counters::{Endpoint, EndpointCounters},
    lifecycle::{Lifecycle, Phase},
};

use self::dice::FailureDice;

/// Why an action call was failed on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// The sequence number reached `FAIL_AFTER_N`.
    FailAfterN,
    /// The controller is in its [`Phase::Failing`] window.
    FailureWindow,
    /// Lost the `FAIL_RATE` roll.
    FailRate,
}

impl FailureCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailAfterN => "fail_after_n",
            Self::FailureWindow => "failure_window",
            Self::FailRate => "fail_rate",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared controller state, cheap to clone.
///
/// The configuration is immutable, the counters are the only
/// state mutated after startup.
#[derive(Debug, Clone)]
pub struct ControllerState {
    config: Arc<ControllerConfig>,
    started: Instant,
    counters: Arc<EndpointCounters>,
    dice: Arc<FailureDice>,
    shutdown: Option<WeakShutdownGuard>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub service: &'static str,
    pub phase: Phase,
    pub uptime_ms: u64,
    pub live: bool,
    pub ready: bool,
    pub requests: BTreeMap<&'static str, u64>,
    pub injected_failures: u64,
    pub config: serde_json::Value,
}

impl ControllerState {
    pub fn new(config: ControllerConfig) -> Self {
        let dice = FailureDice::new(config.fail_seed);
        Self {
            config: Arc::new(config),
            started: Instant::now(),
            counters: Default::default(),
            dice: Arc::new(dice),
            shutdown: None,
        }
    }

    /// Cut injected delays short once the given shutdown is initiated.
    pub fn with_shutdown(mut self, guard: WeakShutdownGuard) -> Self {
        self.shutdown = Some(guard);
        self
    }

    #[inline(always)]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[inline(always)]
    pub fn counters(&self) -> &EndpointCounters {
        &self.counters
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn phase(&self) -> Phase {
        self.config.lifecycle.phase_at(self.uptime())
    }

    /// Time until the next phase transition, `None` if the current phase is final.
    pub fn next_transition_in(&self) -> Option<Duration> {
        self.config.lifecycle.next_transition_in(self.uptime())
    }

    /// Liveness as reported while in the given phase.
    pub fn is_live_in(&self, phase: Phase) -> bool {
        !(self.config.fail_liveness && phase == Phase::Failing)
    }

    /// Sleeps for `delay`, or less if the process is shutting down.
    pub async fn delay(&self, delay: Duration) {
        let Some(guard) = self.shutdown.clone() else {
            tokio::time::sleep(delay).await;
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {},
            _ = guard.into_cancelled() => {
                tracing::debug!("shutdown initiated: cut injected delay of {delay:?} short");
            }
        }
    }

    /// Records a request and returns its sequence number for that endpoint.
    #[inline]
    pub fn record(&self, endpoint: Endpoint) -> u64 {
        self.counters.record(endpoint)
    }

    /// Decides whether the action call with the given sequence number
    /// has to fail, and records it as an injected failure if so.
    pub fn injected_failure(&self, seq: u64) -> Option<FailureCause> {
        let cause = if let Some(n) = self.config.fail_after_n
            && seq >= n.get()
        {
            FailureCause::FailAfterN
        } else if self.phase() == Phase::Failing {
            FailureCause::FailureWindow
        } else if self.dice.hits(self.config.fail_rate) {
            FailureCause::FailRate
        } else {
            return None;
        };

        self.counters.record_injected_failure();
        Some(cause)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let phase = self.phase();
        StateSnapshot {
            service: crate::utils::env::project_name(),
            phase,
            uptime_ms: u64::try_from(self.uptime().as_millis()).unwrap_or(u64::MAX),
            live: self.is_live_in(phase),
            ready: phase == Phase::Ready,
            requests: self.counters.snapshot(),
            injected_failures: self.counters.injected_failures(),
            config: self.config.to_json(),
        }
    }
}
