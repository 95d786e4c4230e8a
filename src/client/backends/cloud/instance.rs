use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info};

use super::transport::CloudTransport;
use super::wire::{
    AcquireSandboxInstanceTokenResponse, DescribeSandboxInstanceListRequest,
    DescribeSandboxInstanceListResponse, Empty, InstanceIdRequest, StartSandboxInstanceRequest,
    StartSandboxInstanceResponse,
};
use crate::client::dataplane::{DataPlaneClient, ExecutionTarget};
use crate::client::endpoint::{execution_base_url, execution_domain, EXECUTION_PORT};
use crate::client::types::{
    CreateInstanceOptions, ExecuteResult, Instance, ListInstancesOptions, ListInstancesResult,
    StreamCallbacks,
};
use crate::config::types::CloudConfig;
use crate::error::{AgsError, Result};

/// Instance lifecycle and code execution for the Cloud backend.
///
/// Access tokens are never cached here; one is acquired from the control
/// plane for each execute or browser call.
#[derive(Debug, Clone)]
pub struct CloudInstanceClient {
    transport: Arc<CloudTransport>,
    data_plane: DataPlaneClient,
    domain: String,
    execute_url: Option<String>,
}

impl CloudInstanceClient {
    pub fn new(transport: Arc<CloudTransport>, config: &CloudConfig, http: Client) -> Self {
        Self {
            transport,
            data_plane: DataPlaneClient::new(http),
            domain: config.data_plane_domain().to_string(),
            execute_url: config.execute_url.clone(),
        }
    }

    fn instance_domain(&self) -> String {
        format!("{}.{}", self.transport.region(), self.domain)
    }

    pub fn instance_host(&self, port: u16, instance_id: &str) -> String {
        execution_domain(port, instance_id, self.transport.region(), &self.domain)
    }

    pub async fn create_instance(&self, opts: &CreateInstanceOptions) -> Result<Instance> {
        let request = StartSandboxInstanceRequest::from(opts);
        let response: StartSandboxInstanceResponse = self
            .transport
            .call("StartSandboxInstance", &request)
            .await
            .map_err(|e| e.context("failed to create instance"))?;

        let mut instance = response.instance.map(Instance::from).unwrap_or_default();
        instance.domain = Some(self.instance_domain());
        info!(instance_id = %instance.id, tool = %instance.tool_name, "Created instance");
        Ok(instance)
    }

    pub async fn list_instances(&self, opts: &ListInstancesOptions) -> Result<ListInstancesResult> {
        let request = DescribeSandboxInstanceListRequest::from(opts);
        let response: DescribeSandboxInstanceListResponse = self
            .transport
            .call("DescribeSandboxInstanceList", &request)
            .await
            .map_err(|e| e.context("failed to list instances"))?;

        Ok(ListInstancesResult {
            instances: response
                .instance_set
                .unwrap_or_default()
                .into_iter()
                .map(Instance::from)
                .collect(),
            total_count: response.total_count.unwrap_or_default(),
        })
    }

    pub async fn get_instance(&self, id: &str) -> Result<Instance> {
        let result = self
            .list_instances(&ListInstancesOptions {
                instance_ids: vec![id.to_string()],
                ..ListInstancesOptions::default()
            })
            .await?;

        let mut instance = result
            .instances
            .into_iter()
            .next()
            .ok_or_else(|| AgsError::NotFound {
                kind: "instance",
                id: id.to_string(),
            })?;
        instance.domain = Some(self.instance_domain());
        Ok(instance)
    }

    pub async fn delete_instance(&self, id: &str) -> Result<()> {
        let _: Empty = self
            .transport
            .call("StopSandboxInstance", &InstanceIdRequest { instance_id: id })
            .await
            .map_err(|e| e.context("failed to delete instance"))?;

        info!(instance_id = %id, "Deleted instance");
        Ok(())
    }

    pub async fn acquire_token(&self, instance_id: &str) -> Result<String> {
        let response: AcquireSandboxInstanceTokenResponse = self
            .transport
            .call(
                "AcquireSandboxInstanceToken",
                &InstanceIdRequest { instance_id },
            )
            .await
            .map_err(|e| e.context("failed to acquire instance token"))?;

        let token = response.token.filter(|t| !t.is_empty()).ok_or_else(|| {
            AgsError::IncompleteResponse {
                context: "AcquireSandboxInstanceToken".to_string(),
                field: "Token",
            }
            .context("failed to acquire instance token")
        })?;

        debug!(instance_id = %instance_id, "Acquired instance token");
        Ok(token)
    }

    pub async fn execute_stream(
        &self,
        instance_id: &str,
        code: &str,
        language: &str,
        callbacks: StreamCallbacks,
    ) -> Result<ExecuteResult> {
        let token = self.acquire_token(instance_id).await?;
        let base_url = match &self.execute_url {
            Some(url) => url.clone(),
            None => execution_base_url(
                EXECUTION_PORT,
                instance_id,
                self.transport.region(),
                &self.domain,
            ),
        };

        self.data_plane
            .execute_code(
                &ExecutionTarget {
                    base_url,
                    access_token: Some(token),
                },
                code,
                language,
                callbacks,
            )
            .await
    }
}
