use rama::{
    http::{
        BodyExtractExt as _, HeaderValue, Request, Response, StatusCode,
        service::web::{
            extract::State,
            response::{IntoResponse, Json},
        },
    },
    telemetry::tracing,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::state::{ControllerState, Endpoint, Phase};

use super::error::{ActionError, HEADER_NAME_CONTROLLER_REQUEST_SEQ};

const UNKNOWN: &str = "unknown";

/// Minimal length of a config version accepted by `/validate`.
const MIN_CONFIG_VERSION_LEN: usize = 3;

const ROLLOUT_TOTAL_STEPS: u64 = 3;
const ROLLOUT_TOTAL_DEVICES: u64 = 10;

/// Payload of an action endpoint.
trait ActionPayload: DeserializeOwned {
    /// Checks beyond what the payload's shape already enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Runs the steps shared by all action endpoints:
/// count the call, apply the configured latency, refuse while starting,
/// decode the payload and finally decide on failure injection.
///
/// Returns the sequence number of the call together with the payload.
async fn simulate_action<T: ActionPayload>(
    state: &ControllerState,
    endpoint: Endpoint,
    req: Request,
) -> Result<(u64, T), ActionError> {
    let seq = state.record(endpoint);

    let latency = state.config().response_latency;
    if !latency.is_zero() {
        state.delay(latency).await;
    }

    if state.phase() == Phase::Starting {
        return Err(ActionError::NotReady { seq });
    }

    let payload: T = read_json_payload(req)
        .await
        .map_err(|message| ActionError::Request { seq, message })?;

    if let Some(cause) = state.injected_failure(seq) {
        return Err(ActionError::InjectedFailure {
            seq,
            status: state.config().failure_status,
            cause,
        });
    }

    Ok((seq, payload))
}

async fn read_json_payload<T: ActionPayload>(req: Request) -> Result<T, String> {
    let body = req
        .try_into_string()
        .await
        .map_err(|err| format!("read request body: {err}"))?;
    if body.trim().is_empty() {
        return Err("empty request body: expected a JSON document".to_owned());
    }
    let payload: T =
        serde_json::from_str(&body).map_err(|err| format!("decode JSON payload: {err}"))?;
    payload.validate()?;
    Ok(payload)
}

fn respond<T: Serialize>(status: StatusCode, seq: u64, body: T) -> Response {
    (
        status,
        [(HEADER_NAME_CONTROLLER_REQUEST_SEQ, HeaderValue::from(seq))],
        Json(body),
    )
        .into_response()
}

fn acknowledge<T: Serialize>(state: &ControllerState, endpoint: Endpoint, seq: u64, ack: T) -> Response {
    tracing::debug!(endpoint = endpoint.as_str(), seq, "action acknowledged");
    respond(state.config().response_status, seq, ack)
}

fn reject(endpoint: Endpoint, err: ActionError) -> Response {
    match &err {
        ActionError::InjectedFailure { cause, .. } => tracing::info!(
            endpoint = endpoint.as_str(),
            seq = err.seq(),
            %cause,
            "action failed on purpose"
        ),
        ActionError::Request { .. } | ActionError::NotReady { .. } => tracing::debug!(
            endpoint = endpoint.as_str(),
            seq = err.seq(),
            kind = err.kind(),
            "action rejected: {err}"
        ),
    }
    err.into_response()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileRequest {
    kind: String,
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    generation: Option<u64>,
}

impl ActionPayload for ReconcileRequest {
    fn validate(&self) -> Result<(), String> {
        if self.kind.trim().is_empty() {
            return Err("field `kind` cannot be empty".to_owned());
        }
        if self.name.trim().is_empty() {
            return Err("field `name` cannot be empty".to_owned());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconcileAck<'a> {
    status: &'static str,
    message: String,
    kind: String,
    name: String,
    namespace: Option<String>,
    observed_generation: Option<u64>,
    payload: Option<&'a serde_json::Value>,
}

pub(super) async fn reconcile(State(state): State<ControllerState>, req: Request) -> Response {
    const ENDPOINT: Endpoint = Endpoint::Reconcile;

    let (seq, resource) = match simulate_action::<ReconcileRequest>(&state, ENDPOINT, req).await {
        Ok(ok) => ok,
        Err(err) => return reject(ENDPOINT, err),
    };

    tracing::info!(
        seq,
        resource.kind = %resource.kind,
        resource.name = %resource.name,
        resource.namespace = ?resource.namespace,
        "reconcile resource"
    );

    let ack = ReconcileAck {
        status: "success",
        message: format!("reconciled {}/{}", resource.kind, resource.name),
        kind: resource.kind,
        name: resource.name,
        namespace: resource.namespace,
        observed_generation: resource.generation,
        payload: state.config().response_body.as_ref(),
    };
    acknowledge(&state, ENDPOINT, seq, ack)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    #[serde(default)]
    config_version: Option<String>,
}

impl ActionPayload for ValidateRequest {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateAck<'a> {
    status: &'static str,
    message: &'static str,
    config_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a serde_json::Value>,
}

pub(super) async fn validate(State(state): State<ControllerState>, req: Request) -> Response {
    const ENDPOINT: Endpoint = Endpoint::Validate;

    let (seq, request) = match simulate_action::<ValidateRequest>(&state, ENDPOINT, req).await {
        Ok(ok) => ok,
        Err(err) => return reject(ENDPOINT, err),
    };

    let config_version = request.config_version.as_deref().unwrap_or_default();
    tracing::info!(seq, config.version = config_version, "validate config");

    if config_version.chars().count() < MIN_CONFIG_VERSION_LEN {
        tracing::debug!(seq, "config version too short: validation failed");
        return respond(
            StatusCode::BAD_REQUEST,
            seq,
            ValidateAck {
                status: "failure",
                message: "Configuration validation failed",
                config_version: request.config_version.as_deref().unwrap_or(UNKNOWN),
                payload: None,
            },
        );
    }

    acknowledge(
        &state,
        ENDPOINT,
        seq,
        ValidateAck {
            status: "success",
            message: "Configuration validation passed",
            config_version,
            payload: state.config().response_body.as_ref(),
        },
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DeviceConfig {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendConfigRequest {
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    config: DeviceConfig,
}

impl ActionPayload for SendConfigRequest {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendConfigAck<'a> {
    status: &'static str,
    message: String,
    device_id: &'a str,
    config_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a serde_json::Value>,
}

pub(super) async fn send_config(State(state): State<ControllerState>, req: Request) -> Response {
    const ENDPOINT: Endpoint = Endpoint::SendConfig;

    let (seq, request) = match simulate_action::<SendConfigRequest>(&state, ENDPOINT, req).await {
        Ok(ok) => ok,
        Err(err) => return reject(ENDPOINT, err),
    };

    let device_id = request.device_id.as_deref().unwrap_or(UNKNOWN);
    let config_name = request.config.name.as_deref().unwrap_or(UNKNOWN);
    tracing::info!(seq, device.id = device_id, config.name = config_name, "send config to device");

    acknowledge(
        &state,
        ENDPOINT,
        seq,
        SendConfigAck {
            status: "success",
            message: format!("Configuration sent to device {device_id}"),
            device_id,
            config_name,
            payload: state.config().response_body.as_ref(),
        },
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RolloutStatusRequest {
    #[serde(default)]
    rollout_id: Option<String>,
}

impl ActionPayload for RolloutStatusRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum RolloutPhase {
    Progressing,
    Completed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RolloutStatus<'a> {
    rollout_id: &'a str,
    phase: RolloutPhase,
    current_step: u64,
    total_steps: u64,
    completed_devices: u64,
    total_devices: u64,
    message: String,
}

impl<'a> RolloutStatus<'a> {
    /// The simulated rollout advances one step per status query.
    fn for_query(rollout_id: &'a str, seq: u64) -> Self {
        let current_step = seq.clamp(1, ROLLOUT_TOTAL_STEPS);
        let completed_devices = current_step * ROLLOUT_TOTAL_DEVICES / ROLLOUT_TOTAL_STEPS;
        let (phase, message) = if current_step == ROLLOUT_TOTAL_STEPS {
            (RolloutPhase::Completed, format!("Rollout {rollout_id} is completed"))
        } else {
            (RolloutPhase::Progressing, format!("Rollout {rollout_id} is progressing"))
        };
        Self {
            rollout_id,
            phase,
            current_step,
            total_steps: ROLLOUT_TOTAL_STEPS,
            completed_devices,
            total_devices: ROLLOUT_TOTAL_DEVICES,
            message,
        }
    }
}

pub(super) async fn rollout_status(State(state): State<ControllerState>, req: Request) -> Response {
    const ENDPOINT: Endpoint = Endpoint::RolloutStatus;

    let (seq, request) = match simulate_action::<RolloutStatusRequest>(&state, ENDPOINT, req).await
    {
        Ok(ok) => ok,
        Err(err) => return reject(ENDPOINT, err),
    };

    let rollout_id = request.rollout_id.as_deref().unwrap_or(UNKNOWN);
    let status = RolloutStatus::for_query(rollout_id, seq);
    tracing::debug!(seq, rollout.id = rollout_id, rollout.phase = ?status.phase, "rollout status");

    acknowledge(&state, ENDPOINT, seq, status)
}
