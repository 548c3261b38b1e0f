use std::time::Duration;

use rama::{
    Service,
    error::BoxError,
    http::{
        BodyExtractExt as _, Request, Response, StatusCode, service::client::HttpClientExt as _,
    },
};

use crate::test::e2e;

async fn get_json(
    client: &impl Service<Request, Output = Response, Error = BoxError>,
    url: String,
) -> (StatusCode, serde_json::Value) {
    let resp = client.get(url).send().await.unwrap();
    let status = resp.status();
    let body = resp.try_into_json().await.unwrap();
    (status, body)
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_ready_immediately_without_delay() {
    let runtime = e2e::runtime::spawn_with_args(&["--ready-delay-ms", "0"]).await;
    let client = e2e::client::new_web_client();

    let (status, body) = get_json(&client, runtime.url("/readyz")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["phase"], "Ready");

    let (status, body) = get_json(&client, runtime.url("/healthz")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], crate::utils::env::project_name());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_ready_after_delay() {
    let runtime = e2e::runtime::spawn_with_args(&["--ready-delay-ms", "400"]).await;
    let client = e2e::client::new_web_client();

    let (status, body) = get_json(&client, runtime.url("/readyz")).await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["phase"], "Starting");

    // alive while starting
    let (status, _) = get_json(&client, runtime.url("/healthz")).await;
    assert_eq!(StatusCode::OK, status);

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let (status, _) = get_json(&client, runtime.url("/readyz")).await;
            if status == StatusCode::OK {
                return;
            }
            assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap();

    let (_, body) = get_json(&client, runtime.url("/state")).await;
    assert_eq!(body["phase"], "Ready");
    assert!(body["uptimeMs"].as_u64().unwrap() >= 400);
    assert_eq!(body["config"]["readyDelayMs"], 400);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_failure_window_fails_liveness() {
    let runtime = e2e::runtime::spawn_with_args(&[
        "--fail-after-ms",
        "200",
        "--fail-liveness",
    ])
    .await;
    let client = e2e::client::new_web_client();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let (status, body) = get_json(&client, runtime.url("/healthz")).await;
            if status == StatusCode::SERVICE_UNAVAILABLE {
                assert_eq!(body["status"], "unhealthy");
                assert_eq!(body["phase"], "Failing");
                return;
            }
            assert_eq!(StatusCode::OK, status);
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap();

    // no recovery configured: failing is final
    let (status, _) = get_json(&client, runtime.url("/readyz")).await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_state_and_metrics_count_requests() {
    let runtime = e2e::runtime::spawn_with_args(&[]).await;
    let client = e2e::client::new_web_client();

    for _ in 0..3 {
        let (status, _) = get_json(&client, runtime.url("/healthz")).await;
        assert_eq!(StatusCode::OK, status);
    }
    let (status, _) = get_json(&client, runtime.url("/health")).await;
    assert_eq!(StatusCode::OK, status);

    let (status, body) = get_json(&client, runtime.url("/state")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body["requests"]["healthz"], 4);
    assert_eq!(body["requests"]["state"], 1);
    assert_eq!(body["requests"]["reconcile"], 0);
    assert_eq!(body["live"], true);

    let (status, body) = get_json(&client, runtime.url("/metrics")).await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(body["requestsTotal"], 6);
    assert_eq!(body["actionsTotal"], 0);
}
