use std::time::Duration;

use clap::Parser as _;
use rama::http::{StatusCode, service::client::HttpClientExt as _};

use crate::{Args, test::e2e};

#[tokio::test]
#[tracing_test::traced_test]
async fn test_graceful_shutdown() {
    let runtime = e2e::runtime::spawn_with_args(&["--ready-delay-ms", "60000"]).await;
    let client = e2e::client::new_web_client();

    let resp = client.get(runtime.url("/readyz")).send().await.unwrap();
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, resp.status());

    // the lifecycle task is still waiting for its first transition
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_graceful_shutdown_during_response_latency() {
    let runtime = e2e::runtime::spawn_with_args(&["--response-latency-ms", "5000"]).await;
    let client = e2e::client::new_web_client();

    let action = tokio::spawn({
        let url = runtime.url("/reconcile");
        async move {
            client
                .post(url)
                .json(&serde_json::json!({"kind": "Deployment", "name": "web"}))
                .send()
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!action.is_finished());

    let start = std::time::Instant::now();
    // the in-flight action must not hold up the shutdown beyond its limit
    runtime.shutdown().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    let _ = tokio::time::timeout(Duration::from_secs(5), action).await;
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_invalid_config_fails_before_binding() {
    let err = e2e::runtime::run_expect_startup_error(&["--fail-recover-ms", "100"]).await;
    let mut messages = vec![format!("{err:?}")];
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err.as_ref());
    while let Some(err) = source {
        messages.push(err.to_string());
        source = err.source();
    }
    assert!(
        messages.iter().any(|msg| msg.contains("FAIL_AFTER_MS")),
        "errors = {messages:?}"
    );
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_occupied_port_fails_startup() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let _err = e2e::runtime::run_expect_startup_error(&["--bind", addr.as_str()]).await;
}

#[test]
fn test_malformed_env_value_exits_with_usage_error() {
    for argv in [
        &["--fail-rate", "abc"][..],
        &["--ready-delay-ms", "-5"],
        &["--fail-after-n", "zero"],
    ] {
        let err = Args::try_parse_from(
            std::iter::once(crate::utils::env::project_name()).chain(argv.iter().copied()),
        )
        .unwrap_err();
        assert_eq!(2, err.exit_code(), "argv = {argv:?}");
    }
}
