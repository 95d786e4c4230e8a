use async_trait::async_trait;

use crate::client::types::{
    ApiKey, CreateApiKeyResult, CreateInstanceOptions, CreateToolOptions, ExecuteResult,
    Instance, ListInstancesOptions, ListInstancesResult, ListToolsOptions, ListToolsResult,
    StreamCallbacks, Tool, UpdateToolOptions,
};
use crate::error::Result;

/// Capability flags indicating what the backend supports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Supports tool (template) management
    pub tools: bool,
    /// Supports API key management
    pub api_keys: bool,
    /// Reports real instance status (otherwise status is synthesized)
    pub instance_status: bool,
}

/// Trait for sandbox service backends.
///
/// This trait abstracts the remote provider, allowing the Cloud API and the
/// E2B-compatible REST API to be used interchangeably. Operations a backend
/// does not offer fail with [`AgsError::Unsupported`](crate::error::AgsError::Unsupported).
#[async_trait]
pub trait SandboxApi: Send + Sync {
    /// Returns the backend name (e.g., "cloud", "e2b")
    fn name(&self) -> &'static str;

    /// Returns the capabilities of this backend
    fn capabilities(&self) -> BackendCapabilities;

    // Tool operations
    async fn create_tool(&self, opts: CreateToolOptions) -> Result<Tool>;
    async fn update_tool(&self, opts: UpdateToolOptions) -> Result<()>;
    async fn list_tools(&self, opts: ListToolsOptions) -> Result<ListToolsResult>;
    async fn get_tool(&self, id: &str) -> Result<Tool>;
    async fn delete_tool(&self, id: &str) -> Result<()>;

    // Instance operations
    async fn create_instance(&self, opts: CreateInstanceOptions) -> Result<Instance>;
    async fn list_instances(&self, opts: ListInstancesOptions) -> Result<ListInstancesResult>;
    async fn get_instance(&self, id: &str) -> Result<Instance>;
    async fn delete_instance(&self, id: &str) -> Result<()>;

    /// Run code in an instance and collect its output.
    async fn execute(&self, instance_id: &str, code: &str, language: &str) -> Result<ExecuteResult> {
        self.execute_stream(instance_id, code, language, StreamCallbacks::default())
            .await
    }

    /// Run code, reporting output through `callbacks` as it arrives.
    async fn execute_stream(
        &self,
        instance_id: &str,
        code: &str,
        language: &str,
        callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult>;

    /// Access token for the instance's data plane services, if any.
    async fn access_token(&self, instance_id: &str) -> Result<Option<String>>;

    /// Host serving `port` inside the instance.
    fn instance_host(&self, port: u16, instance_id: &str) -> String;

    // API key operations
    async fn create_api_key(&self, name: &str) -> Result<CreateApiKeyResult>;
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>>;
    async fn delete_api_key(&self, key_id: &str) -> Result<()>;
}
