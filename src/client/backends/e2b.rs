use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::backends::http::{decode_json, ensure_status};
use crate::client::dataplane::{DataPlaneClient, ExecutionTarget};
use crate::client::endpoint::{execution_base_url, execution_domain, EXECUTION_PORT};
use crate::client::token_cache::TokenCache;
use crate::client::traits::{BackendCapabilities, SandboxApi};
use crate::client::types::{
    ApiKey, CreateApiKeyResult, CreateInstanceOptions, CreateToolOptions, ExecuteResult,
    Instance, ListInstancesOptions, ListInstancesResult, ListToolsOptions, ListToolsResult,
    StreamCallbacks, Tool, UpdateToolOptions,
};
use crate::config::types::E2bConfig;
use crate::error::{AgsError, Result};

/// Template used when neither a tool name nor a tool ID is given
pub const DEFAULT_TEMPLATE: &str = "code-interpreter-v1";

/// Instance lifetime used when none (or zero) is requested
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// The sandbox directory endpoint does not report state; every listed
/// sandbox is reported with this status.
pub const SYNTHESIZED_STATUS: &str = "running";

const BACKEND: &str = "e2b";

/// E2B-compatible REST backend.
///
/// Manages instances through `/sandboxes` with an `X-API-Key` header. Tool
/// and API key management are not offered by this API. Execution access
/// tokens are only issued in the create response, so they are kept in the
/// injected [`TokenCache`] for later execute calls.
pub struct E2bClient {
    http: Client,
    api_key: String,
    api_base_url: String,
    domain: String,
    region: String,
    execute_url: Option<String>,
    /// Applied to management calls only, never to execution streams
    request_timeout: Option<Duration>,
    tokens: Arc<TokenCache>,
    data_plane: DataPlaneClient,
}

impl E2bClient {
    pub fn new(config: &E2bConfig, http: Client, tokens: Arc<TokenCache>) -> Self {
        Self {
            data_plane: DataPlaneClient::new(http.clone()),
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url(),
            domain: config.domain.clone(),
            region: config.region.clone(),
            execute_url: config.execute_url.clone(),
            request_timeout: None,
            tokens,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// The token cache this client reads and writes.
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// `{api_base_url}/sandboxes[/{id}]`, with the ID percent-encoded as a
    /// single path segment.
    fn sandboxes_url(&self, id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.api_base_url).map_err(|e| {
            AgsError::Config(format!("invalid API URL '{}': {}", self.api_base_url, e))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AgsError::Config(format!("API URL cannot be a base: {}", self.api_base_url))
            })?;
            segments.pop_if_empty().push("sandboxes");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .http
            .request(method, url)
            .header("X-API-Key", &self.api_key)
            .header(CONTENT_TYPE, "application/json; charset=utf-8");
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn unsupported(operation: &'static str) -> AgsError {
        AgsError::Unsupported {
            operation,
            backend: BACKEND,
            alternative: "cloud",
        }
    }

    async fn fetch_sandboxes(&self) -> Result<Vec<Instance>> {
        let response = self
            .request(Method::GET, self.sandboxes_url(None)?)
            .send()
            .await
            .map_err(|e| AgsError::from(e).context("failed to list instances"))?;
        let response = ensure_status(response, &[StatusCode::OK], "failed to list instances").await?;
        let sandboxes: Vec<SandboxEntry> = decode_json(response, "list instances").await?;

        Ok(sandboxes.into_iter().map(Instance::from).collect())
    }
}

/// Template identity by priority: tool name, then tool ID, then the default.
fn resolve_template(opts: &CreateInstanceOptions) -> &str {
    [opts.tool_name.as_deref(), opts.tool_id.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TEMPLATE)
}

fn resolve_timeout(opts: &CreateInstanceOptions) -> u64 {
    match opts.timeout_seconds {
        Some(seconds) if seconds > 0 => seconds,
        _ => DEFAULT_TIMEOUT_SECONDS,
    }
}

#[async_trait]
impl SandboxApi for E2bClient {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            tools: false,
            api_keys: false,
            instance_status: false,
        }
    }

    async fn create_tool(&self, _opts: CreateToolOptions) -> Result<Tool> {
        Err(Self::unsupported("CreateTool"))
    }

    async fn update_tool(&self, _opts: UpdateToolOptions) -> Result<()> {
        Err(Self::unsupported("UpdateTool"))
    }

    async fn list_tools(&self, _opts: ListToolsOptions) -> Result<ListToolsResult> {
        Err(Self::unsupported("ListTools"))
    }

    async fn get_tool(&self, _id: &str) -> Result<Tool> {
        Err(Self::unsupported("GetTool"))
    }

    async fn delete_tool(&self, _id: &str) -> Result<()> {
        Err(Self::unsupported("DeleteTool"))
    }

    async fn create_instance(&self, opts: CreateInstanceOptions) -> Result<Instance> {
        let template_id = resolve_template(&opts).to_string();
        let timeout = resolve_timeout(&opts);
        if !opts.mount_options.is_empty() {
            warn!(
                count = opts.mount_options.len(),
                "Mount options are not supported by the e2b backend and are ignored"
            );
        }

        let response = self
            .request(Method::POST, self.sandboxes_url(None)?)
            .json(&CreateSandboxRequest {
                template_id: &template_id,
                timeout,
            })
            .send()
            .await
            .map_err(|e| AgsError::from(e).context("failed to create instance"))?;
        let response = ensure_status(
            response,
            &[StatusCode::OK, StatusCode::CREATED],
            "failed to create instance",
        )
        .await?;
        let created: CreatedSandbox = decode_json(response, "create instance").await?;

        let sandbox_id = created
            .sandbox_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AgsError::IncompleteResponse {
                context: "create instance".to_string(),
                field: "sandboxID",
            })?;
        let access_token = created.envd_access_token.filter(|t| !t.is_empty());
        if let Some(token) = &access_token {
            self.tokens.insert(&sandbox_id, token.clone());
        }

        info!(instance_id = %sandbox_id, template = %template_id, "Created instance");

        Ok(Instance {
            id: sandbox_id,
            tool_id: template_id.clone(),
            tool_name: template_id,
            status: SYNTHESIZED_STATUS.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            access_token,
            domain: Some(format!("{}.{}", self.region, self.domain)),
        })
    }

    /// Filters are applied locally; the directory endpoint has no query
    /// parameters. Status is always [`SYNTHESIZED_STATUS`].
    async fn list_instances(&self, opts: ListInstancesOptions) -> Result<ListInstancesResult> {
        let instances: Vec<Instance> = self
            .fetch_sandboxes()
            .await?
            .into_iter()
            .filter(|inst| {
                if !opts.instance_ids.is_empty() {
                    return opts.instance_ids.contains(&inst.id);
                }
                opts.tool_id.as_ref().map_or(true, |id| &inst.tool_id == id)
                    && opts.status.as_ref().map_or(true, |s| &inst.status == s)
            })
            .collect();

        let total_count = instances.len() as u64;
        let instances = if opts.instance_ids.is_empty() {
            let offset = opts.offset.unwrap_or(0) as usize;
            let limit = opts.limit.map_or(usize::MAX, |l| l as usize);
            instances.into_iter().skip(offset).take(limit).collect()
        } else {
            instances
        };

        Ok(ListInstancesResult {
            instances,
            total_count,
        })
    }

    async fn get_instance(&self, id: &str) -> Result<Instance> {
        self.fetch_sandboxes()
            .await?
            .into_iter()
            .find(|inst| inst.id == id)
            .ok_or_else(|| AgsError::NotFound {
                kind: "instance",
                id: id.to_string(),
            })
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, self.sandboxes_url(Some(id))?)
            .send()
            .await
            .map_err(|e| AgsError::from(e).context("failed to delete instance"))?;
        ensure_status(
            response,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
            "failed to delete instance",
        )
        .await?;

        self.tokens.evict(id);
        info!(instance_id = %id, "Deleted instance");
        Ok(())
    }

    async fn execute_stream(
        &self,
        instance_id: &str,
        code: &str,
        language: &str,
        callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult> {
        let access_token = self.tokens.get(instance_id);
        if access_token.is_none() {
            debug!(instance_id = %instance_id, "No cached access token, executing without one");
        }

        let base_url = match &self.execute_url {
            Some(url) => url.clone(),
            None => execution_base_url(EXECUTION_PORT, instance_id, &self.region, &self.domain),
        };

        self.data_plane
            .execute_code(
                &ExecutionTarget {
                    base_url,
                    access_token,
                },
                code,
                language,
                callbacks,
            )
            .await
    }

    async fn access_token(&self, instance_id: &str) -> Result<Option<String>> {
        Ok(self.tokens.get(instance_id))
    }

    fn instance_host(&self, port: u16, instance_id: &str) -> String {
        execution_domain(port, instance_id, &self.region, &self.domain)
    }

    async fn create_api_key(&self, _name: &str) -> Result<CreateApiKeyResult> {
        Err(Self::unsupported("CreateAPIKey"))
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        Err(Self::unsupported("ListAPIKeys"))
    }

    async fn delete_api_key(&self, _key_id: &str) -> Result<()> {
        Err(Self::unsupported("DeleteAPIKey"))
    }
}

// E2B API types

#[derive(Serialize)]
struct CreateSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
    timeout: u64,
}

#[derive(Deserialize)]
struct CreatedSandbox {
    #[serde(rename = "sandboxID", default)]
    sandbox_id: Option<String>,
    #[serde(rename = "envdAccessToken", default)]
    envd_access_token: Option<String>,
}

#[derive(Deserialize)]
struct SandboxEntry {
    #[serde(rename = "sandboxID", default)]
    sandbox_id: Option<String>,
    #[serde(rename = "templateID", default)]
    template_id: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(rename = "startedAt", default)]
    started_at: Option<String>,
}

// Conversions

impl From<SandboxEntry> for Instance {
    fn from(entry: SandboxEntry) -> Self {
        let template_id = entry.template_id.unwrap_or_default();
        let tool_name = entry
            .alias
            .filter(|alias| !alias.is_empty())
            .unwrap_or_else(|| template_id.clone());

        Instance {
            id: entry.sandbox_id.unwrap_or_default(),
            tool_id: template_id,
            tool_name,
            status: SYNTHESIZED_STATUS.to_string(),
            created_at: entry.started_at.unwrap_or_default(),
            access_token: None,
            domain: None,
        }
    }
}
