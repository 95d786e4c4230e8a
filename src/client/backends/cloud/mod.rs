//! Cloud control plane backend.
//!
//! Three sub-clients (tools, instances, API keys) share one signed
//! [`CloudTransport`]. [`CloudClient`] only delegates.

pub mod apikey;
pub mod instance;
pub mod signer;
pub mod tool;
pub mod transport;
mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

pub use apikey::CloudApiKeyClient;
pub use instance::CloudInstanceClient;
pub use tool::CloudToolClient;
pub use transport::CloudTransport;

use crate::client::traits::{BackendCapabilities, SandboxApi};
use crate::client::types::{
    ApiKey, CreateApiKeyResult, CreateInstanceOptions, CreateToolOptions, ExecuteResult,
    Instance, ListInstancesOptions, ListInstancesResult, ListToolsOptions, ListToolsResult,
    StreamCallbacks, Tool, UpdateToolOptions,
};
use crate::config::types::CloudConfig;
use crate::error::Result;

/// Cloud backend: full tool, instance and API key surface.
#[derive(Debug, Clone)]
pub struct CloudClient {
    tool: CloudToolClient,
    instance: CloudInstanceClient,
    apikey: CloudApiKeyClient,
}

impl CloudClient {
    pub fn new(config: &CloudConfig, http: Client) -> Result<Self> {
        let transport = CloudTransport::new(config, http.clone())?;
        Ok(Self::from_transport(transport, config, http))
    }

    /// Build on a prepared transport; execution streams still use `http`
    /// directly.
    pub fn from_transport(transport: CloudTransport, config: &CloudConfig, http: Client) -> Self {
        let transport = Arc::new(transport);

        info!(
            region = %config.region,
            internal = config.internal,
            "Initialized cloud backend"
        );

        Self {
            tool: CloudToolClient::new(Arc::clone(&transport)),
            instance: CloudInstanceClient::new(Arc::clone(&transport), config, http),
            apikey: CloudApiKeyClient::new(transport),
        }
    }

    pub fn tools(&self) -> &CloudToolClient {
        &self.tool
    }

    pub fn instances(&self) -> &CloudInstanceClient {
        &self.instance
    }

    pub fn api_keys(&self) -> &CloudApiKeyClient {
        &self.apikey
    }
}

#[async_trait]
impl SandboxApi for CloudClient {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            tools: true,
            api_keys: true,
            instance_status: true,
        }
    }

    async fn create_tool(&self, opts: CreateToolOptions) -> Result<Tool> {
        self.tool.create_tool(&opts).await
    }

    async fn update_tool(&self, opts: UpdateToolOptions) -> Result<()> {
        self.tool.update_tool(&opts).await
    }

    async fn list_tools(&self, opts: ListToolsOptions) -> Result<ListToolsResult> {
        self.tool.list_tools(&opts).await
    }

    async fn get_tool(&self, id: &str) -> Result<Tool> {
        self.tool.get_tool(id).await
    }

    async fn delete_tool(&self, id: &str) -> Result<()> {
        self.tool.delete_tool(id).await
    }

    async fn create_instance(&self, opts: CreateInstanceOptions) -> Result<Instance> {
        self.instance.create_instance(&opts).await
    }

    async fn list_instances(&self, opts: ListInstancesOptions) -> Result<ListInstancesResult> {
        self.instance.list_instances(&opts).await
    }

    async fn get_instance(&self, id: &str) -> Result<Instance> {
        self.instance.get_instance(id).await
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.instance.delete_instance(id).await
    }

    async fn execute_stream(
        &self,
        instance_id: &str,
        code: &str,
        language: &str,
        callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult> {
        self.instance
            .execute_stream(instance_id, code, language, callbacks)
            .await
    }

    async fn access_token(&self, instance_id: &str) -> Result<Option<String>> {
        Ok(Some(self.instance.acquire_token(instance_id).await?))
    }

    fn instance_host(&self, port: u16, instance_id: &str) -> String {
        self.instance.instance_host(port, instance_id)
    }

    async fn create_api_key(&self, name: &str) -> Result<CreateApiKeyResult> {
        self.apikey.create_api_key(name).await
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        self.apikey.list_api_keys().await
    }

    async fn delete_api_key(&self, key_id: &str) -> Result<()> {
        self.apikey.delete_api_key(key_id).await
    }
}
