use std::sync::Arc;

use ags_client::client::backends::E2bClient;
use ags_client::client::{
    CreateInstanceOptions, ListInstancesOptions, SandboxApi, SandboxClient, StreamCallbacks,
    TokenCache,
};
use ags_client::config::{AgsConfig, E2bConfig};
use ags_client::AgsError;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn e2b_config(server: &MockServer) -> E2bConfig {
    E2bConfig {
        api_key: "test-key".to_string(),
        api_url: Some(server.uri()),
        execute_url: Some(server.uri()),
        ..E2bConfig::default()
    }
}

fn e2b_client(server: &MockServer, tokens: Arc<TokenCache>) -> E2bClient {
    E2bClient::new(&e2b_config(server), reqwest::Client::new(), tokens)
}

async fn mount_create(server: &MockServer, template: &str, sandbox_id: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .and(header("X-API-Key", "test-key"))
        .and(body_partial_json(json!({"templateID": template})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sandboxID": sandbox_id,
            "envdAccessToken": token
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_instance_caches_token_and_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .and(body_partial_json(json!({"templateID": "code-interpreter-v1", "timeout": 300})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sandboxID": "sbx-1",
            "envdAccessToken": "tok-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenCache::new());
    let client = e2b_client(&server, Arc::clone(&tokens));

    let instance = client
        .create_instance(CreateInstanceOptions {
            timeout_seconds: Some(0),
            ..CreateInstanceOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(instance.id, "sbx-1");
    assert_eq!(instance.tool_name, "code-interpreter-v1");
    assert_eq!(instance.status, "running");
    assert_eq!(instance.access_token.as_deref(), Some("tok-1"));
    assert_eq!(tokens.get("sbx-1").as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn create_without_sandbox_id_fails_and_caches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sandboxID": "",
            "envdAccessToken": "tok-orphan"
        })))
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenCache::new());
    let client = e2b_client(&server, Arc::clone(&tokens));

    let err = client
        .create_instance(CreateInstanceOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        AgsError::IncompleteResponse { field: "sandboxID", .. }
    ));
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn delete_instance_encodes_id_as_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sandboxes/sbx%2F1%3Fx"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = e2b_client(&server, Arc::new(TokenCache::new()));
    client.delete_instance("sbx/1?x").await.unwrap();
}

#[tokio::test]
async fn concurrent_create_and_execute_keep_tokens_per_instance() {
    let server = MockServer::start().await;
    for i in 0..8 {
        mount_create(
            &server,
            &format!("tpl-{}", i),
            &format!("sbx-{}", i),
            &format!("tok-{}", i),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(header("X-Access-Token", format!("tok-{}", i).as_str()))
            .and(body_partial_json(json!({"code": format!("print({})", i)})))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "{{\"type\":\"stdout\",\"text\":\"{}\"}}\n",
                i
            )))
            .mount(&server)
            .await;
    }

    let client = Arc::new(e2b_client(&server, Arc::new(TokenCache::new())));
    let mut handles = Vec::new();
    for i in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            let instance = client
                .create_instance(CreateInstanceOptions {
                    tool_name: Some(format!("tpl-{}", i)),
                    ..CreateInstanceOptions::default()
                })
                .await
                .unwrap();
            let result = client
                .execute(&instance.id, &format!("print({})", i), "python")
                .await
                .unwrap();
            assert_eq!(result.stdout, vec![i.to_string()]);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn delete_instance_evicts_token() {
    let server = MockServer::start().await;
    mount_create(&server, "code-interpreter-v1", "sbx-1", "tok-1").await;
    Mock::given(method("DELETE"))
        .and(path("/sandboxes/sbx-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sandboxes/sbx-unknown"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenCache::new());
    let client = e2b_client(&server, Arc::clone(&tokens));

    client
        .create_instance(CreateInstanceOptions::default())
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);

    client.delete_instance("sbx-1").await.unwrap();
    assert!(tokens.get("sbx-1").is_none());

    // No token was ever cached for this one; still a success
    client.delete_instance("sbx-unknown").await.unwrap();
    assert!(tokens.is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sandboxes/sbx-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("sandbox not found"))
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenCache::new());
    tokens.insert("sbx-1", "tok-1".to_string());
    let client = e2b_client(&server, Arc::clone(&tokens));

    let err = client.delete_instance("sbx-1").await.unwrap_err();
    assert!(err.to_string().contains("sandbox not found"));
    assert_eq!(tokens.get("sbx-1").as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn non_success_status_surfaces_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("template unavailable"))
        .mount(&server)
        .await;

    let client = e2b_client(&server, Arc::new(TokenCache::new()));
    let err = client
        .create_instance(CreateInstanceOptions::default())
        .await
        .unwrap_err();

    match err.root() {
        AgsError::Api { status, body, .. } => {
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "template unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn list_and_get_synthesize_running_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sandboxes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"sandboxID": "sbx-1", "templateID": "tpl-a", "alias": "code-interpreter-v1", "startedAt": "2025-01-01T00:00:00Z"},
            {"sandboxID": "sbx-2", "templateID": "tpl-b", "alias": null, "startedAt": null},
            {"sandboxID": "sbx-3", "templateID": "tpl-a"}
        ])))
        .mount(&server)
        .await;

    let client = e2b_client(&server, Arc::new(TokenCache::new()));

    let all = client
        .list_instances(ListInstancesOptions::default())
        .await
        .unwrap();
    assert_eq!(all.total_count, 3);
    assert!(all.instances.iter().all(|i| i.status == "running"));
    assert_eq!(all.instances[1].tool_name, "tpl-b");
    assert_eq!(all.instances[1].created_at, "");

    let filtered = client
        .list_instances(ListInstancesOptions {
            tool_id: Some("tpl-a".to_string()),
            limit: Some(1),
            ..ListInstancesOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.total_count, 2);
    assert_eq!(filtered.instances.len(), 1);
    assert_eq!(filtered.instances[0].id, "sbx-1");

    let instance = client.get_instance("sbx-3").await.unwrap();
    assert_eq!(instance.tool_id, "tpl-a");

    let err = client.get_instance("sbx-404").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn execute_without_cached_token_sends_no_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .and(body_partial_json(json!({"code": "1/0", "language": "python"})))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"type\":\"stdout\",\"text\":\"before\"}\n",
            "not json\n",
            "{\"type\":\"error\",\"name\":\"ZeroDivisionError\",\"value\":\"division by zero\",\"traceback\":\"tb\"}\n",
            "{\"type\":\"stderr\",\"text\":\"after\"}\n",
        )))
        .mount(&server)
        .await;

    let client = e2b_client(&server, Arc::new(TokenCache::new()));

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callbacks = StreamCallbacks::new().on_stdout(move |text| {
        sink.lock().unwrap().push(text.to_string());
    });

    let result = client
        .execute_stream("sbx-1", "1/0", "", callbacks)
        .await
        .unwrap();

    assert_eq!(result.stdout, vec!["before"]);
    assert_eq!(result.stderr, vec!["after"]);
    let error = result.error.unwrap();
    assert_eq!(error.name, "ZeroDivisionError");
    assert_eq!(*seen.lock().unwrap(), vec!["before".to_string()]);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Access-Token").is_none());
}

#[tokio::test]
async fn execute_non_200_is_call_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid access token"))
        .mount(&server)
        .await;

    let client = e2b_client(&server, Arc::new(TokenCache::new()));
    let err = client.execute("sbx-1", "print(1)", "python").await.unwrap_err();
    assert!(err.to_string().contains("invalid access token"));
}

#[tokio::test]
async fn dispatcher_reports_tool_operations_unsupported() {
    let server = MockServer::start().await;
    let config = AgsConfig {
        backend: "e2b".to_string(),
        e2b: e2b_config(&server),
        ..AgsConfig::default()
    };
    let client = SandboxClient::from_config(&config).unwrap();

    let err = client.get_tool("sdt-1").await.unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(
        err.to_string(),
        "GetTool is not supported by the e2b backend, please use the cloud backend"
    );
    assert!(client.list_api_keys().await.unwrap_err().is_unsupported());

    // Nothing reached the server
    assert!(server.received_requests().await.unwrap().is_empty());
}
