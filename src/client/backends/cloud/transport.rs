use std::time::Duration;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::signer::{self, Credentials};
use crate::client::backends::http::{decode_json, ensure_status};
use crate::config::types::CloudConfig;
use crate::error::{AgsError, Result};

pub const API_VERSION: &str = "2025-09-20";

/// Signed JSON RPC transport shared by the Cloud sub-clients.
///
/// One transport exists per credential and region pair. Every call is a
/// `POST /` whose action is named in the `X-TC-Action` header.
#[derive(Debug)]
pub struct CloudTransport {
    http: Client,
    credentials: Credentials,
    region: String,
    url: Url,
    host: String,
    request_timeout: Option<Duration>,
}

impl CloudTransport {
    pub fn new(config: &CloudConfig, http: Client) -> Result<Self> {
        let url = Url::parse(&config.control_plane_url()).map_err(|e| {
            AgsError::Config(format!(
                "invalid control plane URL '{}': {}",
                config.control_plane_url(),
                e
            ))
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(AgsError::Config(format!(
                    "control plane URL has no host: {}",
                    url
                )))
            }
        };

        Ok(Self {
            http,
            credentials: Credentials {
                secret_id: config.secret_id.clone(),
                secret_key: config.secret_key.clone(),
            },
            region: config.region.clone(),
            url,
            host,
            request_timeout: None,
        })
    }

    /// Bound every control plane call, response body included.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Invoke `action` with `request` as its JSON payload.
    ///
    /// A structured `Response.Error` becomes [`AgsError::CloudApi`];
    /// anything else under `Response` is decoded into `Resp`.
    pub async fn call<Req, Resp>(&self, action: &'static str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;
        let now = Utc::now();
        let authorization =
            signer::authorization(&self.credentials, &self.host, action, &payload, now)?;

        debug!(action = %action, region = %self.region, "Calling cloud API");

        let mut builder = self.http.post(self.url.clone());
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, signer::CONTENT_TYPE)
            .header(HOST, &self.host)
            .header("X-TC-Action", action)
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", &self.region)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .body(payload)
            .send()
            .await?;
        let response = ensure_status(response, &[StatusCode::OK], action).await?;
        let envelope: Envelope = decode_json(response, action).await?;

        unwrap_response(action, envelope.response)
    }
}

#[derive(serde::Deserialize)]
struct Envelope {
    #[serde(rename = "Response", default)]
    response: Value,
}

#[derive(serde::Deserialize, Default)]
#[serde(default)]
struct ApiErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
}

fn unwrap_response<Resp: DeserializeOwned>(action: &str, mut response: Value) -> Result<Resp> {
    if let Some(error) = response.get("Error") {
        let error: ApiErrorBody = serde_json::from_value(error.clone()).unwrap_or_default();
        let request_id = response
            .get("RequestId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(AgsError::CloudApi {
            action: action.to_string(),
            code: error.code,
            message: error.message,
            request_id,
        });
    }

    if response.is_null() {
        response = Value::Object(Default::default());
    }
    serde_json::from_value(response).map_err(|source| AgsError::Decode {
        context: action.to_string(),
        source,
    })
}
