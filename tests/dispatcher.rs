use std::time::Duration;

use ags_client::client::{CreateInstanceOptions, ListInstancesOptions, SandboxClient};
use ags_client::config::{AgsConfig, E2bConfig};
use ags_client::AgsError;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> AgsConfig {
    AgsConfig {
        backend: "e2b".to_string(),
        e2b: E2bConfig {
            api_key: "test-key".to_string(),
            api_url: Some(server.uri()),
            execute_url: Some(server.uri()),
            ..E2bConfig::default()
        },
        ..AgsConfig::default()
    }
}

async fn slow_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sandboxes"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"type\":\"stdout\",\"text\":\"late\"}\n")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn deadline_aborts_slow_call() {
    let server = slow_server().await;
    let client = SandboxClient::from_config(&config(&server))
        .unwrap()
        .with_call_timeout(Duration::from_millis(100));

    let err = client
        .list_instances(ListInstancesOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(
        err,
        AgsError::DeadlineExceeded {
            operation: "ListInstances",
            ..
        }
    ));
}

#[tokio::test]
async fn cancellation_discards_execution_output() {
    let server = slow_server().await;
    let token = CancellationToken::new();
    let client = SandboxClient::from_config(&config(&server))
        .unwrap()
        .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = client
        .execute("sbx-1", "print('late')", "python")
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, AgsError::Cancelled { operation: "Execute" }));
}

#[tokio::test]
async fn call_timeout_from_config() {
    let server = slow_server().await;
    let mut config = config(&server);
    config.http.call_timeout_seconds = Some(1);
    let client = SandboxClient::from_config(&config).unwrap();

    let err = client.get_instance("sbx-1").await.unwrap_err();
    assert!(matches!(
        err,
        AgsError::DeadlineExceeded {
            operation: "GetInstance",
            seconds: 1
        }
    ));
}

#[tokio::test]
async fn management_calls_honor_request_timeout() {
    let server = slow_server().await;
    let mut config = config(&server);
    config.http.timeout_seconds = 1;
    let client = SandboxClient::from_config(&config).unwrap();

    let err = client
        .list_instances(ListInstancesOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to list instances: "));
    assert!(matches!(err.root(), AgsError::Http(e) if e.is_timeout()));
}

#[tokio::test]
async fn browser_endpoints_require_token() {
    let server = MockServer::start().await;
    let client = SandboxClient::from_config(&config(&server)).unwrap();

    // The REST backend only knows tokens for instances it created
    let err = client.browser_endpoints("sbx-1", None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn browser_endpoints_use_created_instance_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sandboxID": "sbx-1",
            "envdAccessToken": "tok-1"
        })))
        .mount(&server)
        .await;

    let client = SandboxClient::from_config(&config(&server)).unwrap();
    client
        .create_instance(CreateInstanceOptions {
            tool_name: Some("browser-v1".to_string()),
            ..CreateInstanceOptions::default()
        })
        .await
        .unwrap();

    let endpoints = client.browser_endpoints("sbx-1", None).await.unwrap();
    assert_eq!(
        endpoints.cdp_url,
        "https://9000-sbx-1.ap-guangzhou.tencentags.com/cdp?access_token=tok-1"
    );
    assert!(endpoints
        .vnc_url
        .ends_with("/novnc/vnc_lite.html?&path=websockify?access_token=tok-1"));
}
