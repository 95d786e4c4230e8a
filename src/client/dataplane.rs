use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::client::stream::decode_stream;
use crate::client::types::{ExecuteResult, StreamCallbacks};
use crate::error::{AgsError, Result};

const DEFAULT_LANGUAGE: &str = "python";

/// Where and how to reach one instance's execution service.
#[derive(Debug, Clone)]
pub struct ExecutionTarget {
    /// Base URL without trailing slash, e.g. `https://49999-{id}.{region}.{domain}`
    pub base_url: String,
    /// Sent as `X-Access-Token` when present and non-empty
    pub access_token: Option<String>,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    language: &'a str,
}

/// Client for the data plane code execution endpoint.
#[derive(Debug, Clone)]
pub struct DataPlaneClient {
    http: Client,
}

impl DataPlaneClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// POST `{base_url}/execute` and decode the JSON Lines response.
    ///
    /// The body is read for as long as the service keeps it open; the only
    /// bound on a running execution is the caller's deadline.
    pub async fn execute_code(
        &self,
        target: &ExecutionTarget,
        code: &str,
        language: &str,
        mut callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult> {
        let url = format!("{}/execute", target.base_url.trim_end_matches('/'));
        let language = if language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            language
        };

        let body = serde_json::to_vec(&ExecuteRequest { code, language })?;
        let mut request = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body);
        if let Some(token) = target.access_token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header("X-Access-Token", token);
        }

        debug!(url = %url, language = %language, "Executing code");

        let response = request
            .send()
            .await
            .map_err(|e| AgsError::from(e).context("failed to execute code"))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AgsError::Api {
                context: "failed to execute code".to_string(),
                status,
                body,
            });
        }

        decode_stream(response.bytes_stream(), &mut callbacks)
            .await
            .map_err(|e| e.context("failed to execute code"))
    }
}
