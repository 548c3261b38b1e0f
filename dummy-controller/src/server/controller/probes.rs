use rama::http::{
    StatusCode,
    service::web::{
        extract::State,
        response::{IntoResponse, Json},
    },
};

use crate::{
    state::{ControllerState, Endpoint, Phase},
    utils::env::project_name,
};

/// Liveness probe.
///
/// Succeeds for as long as the process runs, unless liveness
/// failure injection is configured and the controller is failing.
pub(super) async fn healthz(State(state): State<ControllerState>) -> impl IntoResponse {
    state.record(Endpoint::Healthz);
    let phase = state.phase();

    if state.is_live_in(phase) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "service": project_name(),
                "phase": phase,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "service": project_name(),
                "phase": phase,
            })),
        )
    }
}

/// Readiness probe, only succeeds while in the ready phase.
pub(super) async fn readyz(State(state): State<ControllerState>) -> impl IntoResponse {
    state.record(Endpoint::Readyz);
    let phase = state.phase();

    let (status, label) = if phase == Phase::Ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(serde_json::json!({
            "status": label,
            "phase": phase,
        })),
    )
}

pub(super) async fn introspect(State(state): State<ControllerState>) -> impl IntoResponse {
    state.record(Endpoint::State);
    Json(state.snapshot())
}

pub(super) async fn metrics(State(state): State<ControllerState>) -> impl IntoResponse {
    state.record(Endpoint::Metrics);
    let counters = state.counters();

    Json(serde_json::json!({
        "uptimeMs": u64::try_from(state.uptime().as_millis()).unwrap_or(u64::MAX),
        "phase": state.phase(),
        "requestsTotal": counters.total(),
        "actionsTotal": counters.total_actions(),
        "injectedFailures": counters.injected_failures(),
    }))
}
