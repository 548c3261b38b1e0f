use std::fmt;

use rama::{
    http::{
        HeaderName, HeaderValue, Request, Response, StatusCode,
        service::web::response::{IntoResponse, Json},
    },
    telemetry::tracing,
};
use serde::Serialize;

use crate::state::FailureCause;

/// Response header carrying the per-endpoint sequence number of an action call.
pub const HEADER_NAME_CONTROLLER_REQUEST_SEQ: HeaderName =
    HeaderName::from_static("x-controller-request-seq");

/// Per-request outcome of an action call that is not an acknowledgment.
///
/// None of these are fatal: each is rendered as a JSON error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The request body could not be read or decoded.
    Request { seq: u64, message: String },
    /// The simulated controller did not reach its ready phase yet.
    NotReady { seq: u64 },
    /// Deliberate failure, configured by the test harness.
    InjectedFailure {
        seq: u64,
        status: StatusCode,
        cause: FailureCause,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    kind: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<FailureCause>,
}

impl ActionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request_error",
            Self::NotReady { .. } => "not_ready",
            Self::InjectedFailure { .. } => "injected_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request { .. } => StatusCode::BAD_REQUEST,
            Self::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::InjectedFailure { status, .. } => *status,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::Request { seq, .. }
            | Self::NotReady { seq }
            | Self::InjectedFailure { seq, .. } => *seq,
        }
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request { message, .. } => write!(f, "invalid request: {message}"),
            Self::NotReady { .. } => f.write_str("controller is not ready yet"),
            Self::InjectedFailure { cause, .. } => write!(f, "injected failure ({cause})"),
        }
    }
}

impl std::error::Error for ActionError {}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let cause = match &self {
            Self::InjectedFailure { cause, .. } => Some(*cause),
            Self::Request { .. } | Self::NotReady { .. } => None,
        };
        (
            self.status(),
            [(HEADER_NAME_CONTROLLER_REQUEST_SEQ, HeaderValue::from(self.seq()))],
            Json(ErrorBody {
                status: "error",
                kind: self.kind(),
                message: &message,
                cause,
            }),
        )
            .into_response()
    }
}

/// Response for requests no route matches, unknown path or method.
pub(super) fn route_not_found(req: &Request) -> Response {
    tracing::debug!(method = %req.method(), path = req.uri().path(), "no route for request");
    let message = format!("no route for {} {}", req.method(), req.uri().path());
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            status: "error",
            kind: "request_error",
            message: &message,
            cause: None,
        }),
    )
        .into_response()
}
