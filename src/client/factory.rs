use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::backends::{cloud::CloudTransport, CloudClient, E2bClient};
use crate::client::endpoint::{BrowserEndpoints, DEFAULT_BROWSER_PORT};
use crate::client::token_cache::TokenCache;
use crate::client::traits::{BackendCapabilities, SandboxApi};
use crate::client::types::{
    ApiKey, CreateApiKeyResult, CreateInstanceOptions, CreateToolOptions, ExecuteResult,
    Instance, ListInstancesOptions, ListInstancesResult, ListToolsOptions, ListToolsResult,
    StreamCallbacks, Tool, UpdateToolOptions,
};
use crate::config::types::AgsConfig;
use crate::error::{AgsError, Result};

/// Backend discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// E2B-compatible REST API
    #[default]
    E2b,
    /// Cloud control plane API
    Cloud,
}

impl BackendKind {
    /// Resolve a backend name. Unknown names fall back to the default
    /// backend with a warning instead of failing.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "e2b" => Self::E2b,
            "cloud" => Self::Cloud,
            other => {
                let fallback = Self::default();
                warn!(
                    backend = %other,
                    fallback = %fallback.name(),
                    "Unknown backend name, using default"
                );
                fallback
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::E2b => "e2b",
            Self::Cloud => "cloud",
        }
    }
}

/// Static description of a selectable backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub description: &'static str,
    pub capabilities: BackendCapabilities,
}

/// List the backends this crate can talk to.
pub fn available_backends() -> Vec<BackendInfo> {
    vec![
        BackendInfo {
            kind: BackendKind::E2b,
            description: "E2B-compatible REST API (instances and execution only)",
            capabilities: BackendCapabilities {
                tools: false,
                api_keys: false,
                instance_status: false,
            },
        },
        BackendInfo {
            kind: BackendKind::Cloud,
            description: "Cloud control plane API (tools, instances, API keys)",
            capabilities: BackendCapabilities {
                tools: true,
                api_keys: true,
                instance_status: true,
            },
        },
    ]
}

/// Create a backend from configuration.
///
/// The REST backend gets `tokens` injected, so clients built with separate
/// caches never share tokens. `http.timeout_seconds` bounds management calls
/// only; execution streams run until the service closes them.
pub fn create_backend(
    config: &AgsConfig,
    http: Client,
    tokens: Arc<TokenCache>,
) -> Result<Arc<dyn SandboxApi>> {
    let request_timeout = Duration::from_secs(config.http.timeout_seconds);
    match config.backend_kind() {
        BackendKind::E2b => Ok(Arc::new(
            E2bClient::new(&config.e2b, http, tokens).with_request_timeout(request_timeout),
        )),
        BackendKind::Cloud => {
            let transport = CloudTransport::new(&config.cloud, http.clone())?
                .with_request_timeout(request_timeout);
            Ok(Arc::new(CloudClient::from_transport(
                transport,
                &config.cloud,
                http,
            )))
        }
    }
}

/// Single entry point over every backend operation.
///
/// Each call races the wrapped operation against the client's
/// [`CancellationToken`] and an optional per-call deadline. A cancelled or
/// expired call returns an error and drops any partial output; stream
/// callbacks may already have fired for lines read before that point.
#[derive(Clone)]
pub struct SandboxClient {
    backend: Arc<dyn SandboxApi>,
    cancel: CancellationToken,
    call_timeout: Option<Duration>,
}

impl SandboxClient {
    pub fn new(backend: Arc<dyn SandboxApi>) -> Self {
        Self {
            backend,
            cancel: CancellationToken::new(),
            call_timeout: None,
        }
    }

    /// Build the configured backend with a fresh HTTP client and token cache.
    pub fn from_config(config: &AgsConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.http.timeout_seconds))
            .build()?;
        let backend = create_backend(config, http, Arc::new(TokenCache::new()))?;

        info!(backend = %backend.name(), "Created sandbox client");

        let client = Self::new(backend);
        Ok(match config.http.call_timeout_seconds {
            Some(seconds) if seconds > 0 => client.with_call_timeout(Duration::from_secs(seconds)),
            _ => client,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Token that cancels every in-flight and future call on this client.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    async fn guard<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let call = async {
            match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(AgsError::DeadlineExceeded {
                        operation,
                        seconds: limit.as_secs(),
                    }),
                },
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(operation = %operation, "Call cancelled");
                Err(AgsError::Cancelled { operation })
            }
            result = call => result,
        }
    }

    // Tools

    pub async fn create_tool(&self, opts: CreateToolOptions) -> Result<Tool> {
        self.guard("CreateTool", self.backend.create_tool(opts)).await
    }

    pub async fn update_tool(&self, opts: UpdateToolOptions) -> Result<()> {
        self.guard("UpdateTool", self.backend.update_tool(opts)).await
    }

    pub async fn list_tools(&self, opts: ListToolsOptions) -> Result<ListToolsResult> {
        self.guard("ListTools", self.backend.list_tools(opts)).await
    }

    pub async fn get_tool(&self, id: &str) -> Result<Tool> {
        self.guard("GetTool", self.backend.get_tool(id)).await
    }

    pub async fn delete_tool(&self, id: &str) -> Result<()> {
        self.guard("DeleteTool", self.backend.delete_tool(id)).await
    }

    // Instances

    pub async fn create_instance(&self, opts: CreateInstanceOptions) -> Result<Instance> {
        self.guard("CreateInstance", self.backend.create_instance(opts))
            .await
    }

    pub async fn list_instances(&self, opts: ListInstancesOptions) -> Result<ListInstancesResult> {
        self.guard("ListInstances", self.backend.list_instances(opts))
            .await
    }

    pub async fn get_instance(&self, id: &str) -> Result<Instance> {
        self.guard("GetInstance", self.backend.get_instance(id)).await
    }

    pub async fn delete_instance(&self, id: &str) -> Result<()> {
        self.guard("DeleteInstance", self.backend.delete_instance(id))
            .await
    }

    // Execution

    pub async fn execute(&self, instance_id: &str, code: &str, language: &str) -> Result<ExecuteResult> {
        self.guard("Execute", self.backend.execute(instance_id, code, language))
            .await
    }

    pub async fn execute_stream(
        &self,
        instance_id: &str,
        code: &str,
        language: &str,
        callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult> {
        self.guard(
            "ExecuteStream",
            self.backend
                .execute_stream(instance_id, code, language, callbacks),
        )
        .await
    }

    /// VNC and CDP URLs for a browser instance. `port` defaults to
    /// [`DEFAULT_BROWSER_PORT`].
    pub async fn browser_endpoints(
        &self,
        instance_id: &str,
        port: Option<u16>,
    ) -> Result<BrowserEndpoints> {
        let token = self
            .guard("AccessToken", self.backend.access_token(instance_id))
            .await?
            .ok_or_else(|| AgsError::NotFound {
                kind: "access token for instance",
                id: instance_id.to_string(),
            })?;
        let host = self
            .backend
            .instance_host(port.unwrap_or(DEFAULT_BROWSER_PORT), instance_id);

        Ok(BrowserEndpoints::new(&host, &token))
    }

    // API keys

    pub async fn create_api_key(&self, name: &str) -> Result<CreateApiKeyResult> {
        self.guard("CreateAPIKey", self.backend.create_api_key(name))
            .await
    }

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        self.guard("ListAPIKeys", self.backend.list_api_keys()).await
    }

    pub async fn delete_api_key(&self, key_id: &str) -> Result<()> {
        self.guard("DeleteAPIKey", self.backend.delete_api_key(key_id))
            .await
    }
}

impl std::fmt::Debug for SandboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxClient")
            .field("backend", &self.backend.name())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
