use std::sync::Arc;

use tracing::info;

use super::transport::CloudTransport;
use super::wire::{
    CreateApiKeyRequest, CreateApiKeyResponse, DeleteApiKeyRequest, DescribeApiKeyListRequest,
    DescribeApiKeyListResponse, Empty,
};
use crate::client::types::{ApiKey, CreateApiKeyResult};
use crate::error::Result;

/// API key management on the Cloud control plane.
#[derive(Debug, Clone)]
pub struct CloudApiKeyClient {
    transport: Arc<CloudTransport>,
}

impl CloudApiKeyClient {
    pub fn new(transport: Arc<CloudTransport>) -> Self {
        Self { transport }
    }

    /// The returned secret is only ever available here.
    pub async fn create_api_key(&self, name: &str) -> Result<CreateApiKeyResult> {
        let response: CreateApiKeyResponse = self
            .transport
            .call("CreateAPIKey", &CreateApiKeyRequest { name })
            .await
            .map_err(|e| e.context("failed to create API key"))?;

        let created = CreateApiKeyResult::from(response);
        info!(key_id = %created.key_id, name = %created.name, "Created API key");
        Ok(created)
    }

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let response: DescribeApiKeyListResponse = self
            .transport
            .call("DescribeAPIKeyList", &DescribeApiKeyListRequest::default())
            .await
            .map_err(|e| e.context("failed to list API keys"))?;

        Ok(response
            .api_key_set
            .unwrap_or_default()
            .into_iter()
            .map(ApiKey::from)
            .collect())
    }

    pub async fn delete_api_key(&self, key_id: &str) -> Result<()> {
        let _: Empty = self
            .transport
            .call("DeleteAPIKey", &DeleteApiKeyRequest { key_id })
            .await
            .map_err(|e| e.context("failed to delete API key"))?;

        info!(key_id = %key_id, "Deleted API key");
        Ok(())
    }
}
