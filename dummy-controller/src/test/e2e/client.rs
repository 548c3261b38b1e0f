use std::time::Duration;

use rama::{
    Layer as _, Service,
    error::BoxError,
    http::{
        Request, Response, client::EasyHttpWebClient,
        layer::map_request_body::MapRequestBodyLayer,
    },
    layer::TimeoutLayer,
    rt::Executor,
};

/// Plain http client without retries,
/// every request has to reach the controller exactly once.
pub(super) fn new_web_client() -> impl Service<Request, Output = Response, Error = BoxError> {
    let inner_http_client = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(None)
        .with_default_http_connector(Executor::default())
        .try_with_default_connection_pool()
        .expect("create connection pool for e2e web client")
        .build_client();

    (
        TimeoutLayer::new(Duration::from_secs(30)),
        MapRequestBodyLayer::new_boxed_streaming_body(),
    )
        .into_layer(inner_http_client)
}
