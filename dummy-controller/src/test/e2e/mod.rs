#![allow(unused)]

mod client;
mod runtime;

mod test_lifecycle;
mod test_probes;

use rama::{
    Service,
    http::{BodyExtractExt as _, StatusCode, service::client::HttpClientExt as _},
};

#[tokio::test]
#[tracing_test::traced_test]
async fn test_runtime_spawn() {
    // simple test to ensure that spawning a runtime and reaching it works,
    // outside out of any other things that might otherwise go wrong

    let runtime = self::runtime::spawn_with_args(&[]).await;
    let client = self::client::new_web_client();

    let resp = client.get(runtime.url("/healthz")).send().await.unwrap();
    assert_eq!(StatusCode::OK, resp.status());
    assert!(
        resp.headers()
            .get("server")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with(crate::utils::env::project_name())
    );

    runtime.shutdown().await.unwrap();
}
