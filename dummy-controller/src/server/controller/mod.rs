use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{BoxError, ErrorContext as _},
    http::{
        HeaderValue, Request, Response,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::Router,
    },
    layer::TimeoutLayer,
    net::{address::SocketAddress, socket::Interface},
    rt::Executor,
    service::service_fn,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use crate::{
    config::MAX_RESPONSE_LATENCY_MS, state::ControllerState, utils::env::server_identifier,
};

mod actions;
mod error;
mod probes;

pub use self::error::{ActionError, HEADER_NAME_CONTROLLER_REQUEST_SEQ};

/// Lifetime limit of a single connection, keep-alive included.
///
/// Must stay above the largest injected latency so a delayed action always completes.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

const _: () = assert!(MAX_RESPONSE_LATENCY_MS < CONNECTION_TIMEOUT.as_millis() as u64);

/// Router of the controller api, without any transport layers.
pub fn web_svc(
    state: ControllerState,
) -> impl Service<Request, Output = Response, Error = Infallible> + Clone {
    Arc::new(
        Router::new_with_state(state)
            .with_get("/healthz", probes::healthz)
            .with_get("/health", probes::healthz)
            .with_get("/readyz", probes::readyz)
            .with_get("/state", probes::introspect)
            .with_get("/metrics", probes::metrics)
            .with_post("/reconcile", actions::reconcile)
            .with_post("/validate", actions::validate)
            .with_post("/send-config", actions::send_config)
            .with_post("/rollout-status", actions::rollout_status)
            .with_not_found(service_fn(|req: Request| async move {
                Ok::<_, Infallible>(error::route_not_found(&req))
            })),
    )
}

/// Controller http server, bound but not yet serving.
pub struct ControllerHttpServer {
    tcp_listener: TcpListener,
    local_addr: SocketAddress,
    exec: Executor,
}

impl ControllerHttpServer {
    /// Binds the listener, failing early if the interface is unavailable.
    pub async fn bind(interface: Interface, exec: Executor) -> Result<Self, BoxError> {
        let tcp_listener = TcpListener::bind(interface, exec.clone())
            .await
            .context("bind controller http server")?;

        let local_addr: SocketAddress = tcp_listener
            .local_addr()
            .context("get bound address for controller http server")?
            .into();

        tracing::info!("controller http server bound to: {local_addr}");

        Ok(Self {
            tcp_listener,
            local_addr,
            exec,
        })
    }

    pub fn local_addr(&self) -> SocketAddress {
        self.local_addr
    }

    /// Serve until the graceful executor is shut down.
    pub async fn serve(self, state: ControllerState) {
        let Self {
            tcp_listener,
            local_addr,
            exec,
        } = self;

        let http_svc = (
            TraceLayer::new_for_http(),
            AddRequiredResponseHeadersLayer::new()
                .with_server_header_value(HeaderValue::from_static(server_identifier())),
        )
            .into_layer(web_svc(state));

        let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));
        let tcp_svc = TimeoutLayer::new(CONNECTION_TIMEOUT).into_layer(http_server);

        tcp_listener.serve(tcp_svc).await;

        tracing::debug!("controller http server at {local_addr} stopped serving");
    }
}
