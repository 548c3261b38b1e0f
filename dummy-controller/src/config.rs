//! Controller behaviour configuration.
//!
//! All options are read once at startup (see [`crate::Args`]) and resolved
//! into an immutable [`ControllerConfig`] which is shared by reference
//! with all request handlers.

use std::{num::NonZeroU64, time::Duration};

use rama::{
    error::{BoxError, ErrorContext as _},
    http::StatusCode,
    telemetry::tracing,
};

use crate::{Args, state::Lifecycle};

/// Upper bound for `RESPONSE_LATENCY_MS`,
/// stays well below the connection timeout of the http server.
pub const MAX_RESPONSE_LATENCY_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub lifecycle: Lifecycle,
    /// Probability in `[0, 1]` that an action call fails.
    pub fail_rate: f64,
    /// Action calls with a sequence number `>= n` fail.
    pub fail_after_n: Option<NonZeroU64>,
    pub fail_seed: Option<u64>,
    /// Let the liveness probe fail as well while [`crate::state::Phase::Failing`].
    pub fail_liveness: bool,
    pub response_latency: Duration,
    pub response_status: StatusCode,
    pub failure_status: StatusCode,
    /// Fixed payload embedded in every action acknowledgment.
    pub response_body: Option<serde_json::Value>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::default(),
            fail_rate: 0.,
            fail_after_n: None,
            fail_seed: None,
            fail_liveness: false,
            response_latency: Duration::ZERO,
            response_status: StatusCode::OK,
            failure_status: StatusCode::INTERNAL_SERVER_ERROR,
            response_body: None,
        }
    }
}

impl ControllerConfig {
    /// Resolve and validate the configuration.
    ///
    /// Single values are already validated by the argument parser,
    /// this checks the rules that span multiple options.
    pub fn try_from_args(args: &Args) -> Result<Self, BoxError> {
        if args.fail_recover_ms.is_some() {
            match args.fail_after_ms {
                None => {
                    return Err(BoxError::from(
                        "FAIL_RECOVER_MS (--fail-recover-ms) requires FAIL_AFTER_MS (--fail-after-ms)",
                    ));
                }
                Some(0) => {
                    return Err(BoxError::from(
                        "FAIL_AFTER_MS (--fail-after-ms) must be > 0 when FAIL_RECOVER_MS (--fail-recover-ms) is set",
                    ));
                }
                Some(_) => (),
            }
        }

        if args.fail_liveness && args.fail_after_ms.is_none() {
            tracing::warn!(
                "FAIL_LIVENESS is set without FAIL_AFTER_MS: the liveness probe will never fail"
            );
        }

        if args.fail_seed.is_some() && args.fail_rate <= 0. {
            tracing::debug!("FAIL_SEED is set while FAIL_RATE is 0: seed is unused");
        }

        let response_status = StatusCode::from_u16(args.response_status)
            .context("convert RESPONSE_STATUS into http status code")?;
        let failure_status = StatusCode::from_u16(args.failure_status)
            .context("convert FAILURE_STATUS into http status code")?;

        Ok(Self {
            lifecycle: Lifecycle::new(
                args.ready_delay_ms,
                args.fail_after_ms,
                args.fail_recover_ms,
            ),
            fail_rate: args.fail_rate,
            fail_after_n: args.fail_after_n,
            fail_seed: args.fail_seed,
            fail_liveness: args.fail_liveness,
            response_latency: Duration::from_millis(args.response_latency_ms),
            response_status,
            failure_status,
            response_body: args.response_body.clone(),
        })
    }

    /// Effective configuration as exposed by the introspection endpoint.
    pub fn to_json(&self) -> serde_json::Value {
        let window = self.lifecycle.failure_window;
        serde_json::json!({
            "readyDelayMs": duration_ms(self.lifecycle.ready_delay),
            "failAfterMs": window.map(|w| duration_ms(w.fail_after)),
            "failRecoverMs": window.and_then(|w| w.recover_after).map(duration_ms),
            "failRate": self.fail_rate,
            "failAfterN": self.fail_after_n.map(NonZeroU64::get),
            "failSeed": self.fail_seed,
            "failLiveness": self.fail_liveness,
            "responseLatencyMs": duration_ms(self.response_latency),
            "responseStatus": self.response_status.as_u16(),
            "failureStatus": self.failure_status.as_u16(),
            "responseBody": self.response_body,
        })
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Parse a probability in the `[0.0, 1.0]` range (`FAIL_RATE`).
pub fn parse_probability(s: &str) -> Result<f64, BoxError> {
    let value: f64 = s
        .trim()
        .parse()
        .context("parse probability as floating point number")?;
    if !(0.0..=1.0).contains(&value) {
        return Err(BoxError::from(format!(
            "probability must be within [0.0, 1.0], got {value}"
        )));
    }
    Ok(value)
}

/// Parse a JSON document (`RESPONSE_BODY`).
pub fn parse_json_document(s: &str) -> Result<serde_json::Value, BoxError> {
    serde_json::from_str(s).context("parse JSON document")
}
