use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

/// Every endpoint the controller counts requests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Healthz,
    Readyz,
    State,
    Metrics,
    Reconcile,
    Validate,
    SendConfig,
    RolloutStatus,
}

impl Endpoint {
    pub const ALL: [Self; 8] = [
        Self::Healthz,
        Self::Readyz,
        Self::State,
        Self::Metrics,
        Self::Reconcile,
        Self::Validate,
        Self::SendConfig,
        Self::RolloutStatus,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthz => "healthz",
            Self::Readyz => "readyz",
            Self::State => "state",
            Self::Metrics => "metrics",
            Self::Reconcile => "reconcile",
            Self::Validate => "validate",
            Self::SendConfig => "send_config",
            Self::RolloutStatus => "rollout_status",
        }
    }

    /// Action endpoints simulate units of work and go through fault injection.
    pub const fn is_action(self) -> bool {
        matches!(
            self,
            Self::Reconcile | Self::Validate | Self::SendConfig | Self::RolloutStatus
        )
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Per-endpoint request counters.
///
/// Every slot is only ever written through [`EndpointCounters::record`],
/// a single atomic increment, so concurrent requests each observe
/// a distinct sequence number.
#[derive(Debug, Default)]
pub struct EndpointCounters {
    requests: [AtomicU64; Endpoint::ALL.len()],
    injected_failures: AtomicU64,
}

impl EndpointCounters {
    /// Records a request and returns its 1-based sequence number
    /// for the given endpoint.
    pub fn record(&self, endpoint: Endpoint) -> u64 {
        self.requests[endpoint.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_injected_failure(&self) -> u64 {
        self.injected_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self, endpoint: Endpoint) -> u64 {
        self.requests[endpoint.index()].load(Ordering::Acquire)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        Endpoint::ALL.iter().map(|endpoint| self.get(*endpoint)).sum()
    }

    pub fn total_actions(&self) -> u64 {
        Endpoint::ALL
            .iter()
            .filter(|endpoint| endpoint.is_action())
            .map(|endpoint| self.get(*endpoint))
            .sum()
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        Endpoint::ALL
            .iter()
            .map(|endpoint| (endpoint.as_str(), self.get(*endpoint)))
            .collect()
    }
}
