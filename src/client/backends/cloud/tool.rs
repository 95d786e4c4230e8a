use std::sync::Arc;

use tracing::info;

use super::transport::CloudTransport;
use super::wire::{
    CreateSandboxToolRequest, CreateSandboxToolResponse, DeleteSandboxToolRequest,
    DescribeSandboxToolListRequest, DescribeSandboxToolListResponse, Empty,
    UpdateSandboxToolRequest,
};
use crate::client::types::{
    CreateToolOptions, ListToolsOptions, ListToolsResult, Tool, UpdateToolOptions,
};
use crate::error::{AgsError, Result};

/// Tool (template) management on the Cloud control plane.
#[derive(Debug, Clone)]
pub struct CloudToolClient {
    transport: Arc<CloudTransport>,
}

impl CloudToolClient {
    pub fn new(transport: Arc<CloudTransport>) -> Self {
        Self { transport }
    }

    pub async fn list_tools(&self, opts: &ListToolsOptions) -> Result<ListToolsResult> {
        let request = DescribeSandboxToolListRequest::from(opts);
        let response: DescribeSandboxToolListResponse = self
            .transport
            .call("DescribeSandboxToolList", &request)
            .await
            .map_err(|e| e.context("failed to list tools"))?;

        Ok(ListToolsResult {
            tools: response
                .sandbox_tool_set
                .unwrap_or_default()
                .into_iter()
                .map(Tool::from)
                .collect(),
            total_count: response.total_count.unwrap_or_default(),
        })
    }

    /// A singleton ID query; an empty result set is [`AgsError::NotFound`].
    pub async fn get_tool(&self, id: &str) -> Result<Tool> {
        let result = self
            .list_tools(&ListToolsOptions {
                tool_ids: vec![id.to_string()],
                ..ListToolsOptions::default()
            })
            .await?;

        result
            .tools
            .into_iter()
            .next()
            .ok_or_else(|| AgsError::NotFound {
                kind: "tool",
                id: id.to_string(),
            })
    }

    /// Returns the requested fields echoed back with the new tool ID.
    pub async fn create_tool(&self, opts: &CreateToolOptions) -> Result<Tool> {
        if opts.name.is_empty() {
            return Err(AgsError::InvalidArgument {
                field: "name",
                reason: "tool name is required".to_string(),
            });
        }
        if opts.tool_type.is_empty() {
            return Err(AgsError::InvalidArgument {
                field: "type",
                reason: "tool type is required".to_string(),
            });
        }

        let request = CreateSandboxToolRequest::from(opts);
        let response: CreateSandboxToolResponse = self
            .transport
            .call("CreateSandboxTool", &request)
            .await
            .map_err(|e| e.context("failed to create tool"))?;

        let tool = Tool {
            id: response.tool_id.unwrap_or_default(),
            name: opts.name.clone(),
            tool_type: opts.tool_type.clone(),
            description: opts.description.clone().unwrap_or_default(),
            network_mode: opts.network_mode.clone().unwrap_or_default(),
            vpc_config: opts.vpc_config.clone(),
            tags: opts.tags.clone(),
            role_arn: opts.role_arn.clone(),
            storage_mounts: opts.storage_mounts.clone(),
            created_at: String::new(),
        };
        info!(tool_id = %tool.id, name = %tool.name, "Created tool");
        Ok(tool)
    }

    pub async fn update_tool(&self, opts: &UpdateToolOptions) -> Result<()> {
        let request = UpdateSandboxToolRequest::from(opts);
        let _: Empty = self
            .transport
            .call("UpdateSandboxTool", &request)
            .await
            .map_err(|e| e.context("failed to update tool"))?;

        info!(tool_id = %opts.tool_id, "Updated tool");
        Ok(())
    }

    pub async fn delete_tool(&self, id: &str) -> Result<()> {
        let _: Empty = self
            .transport
            .call("DeleteSandboxTool", &DeleteSandboxToolRequest { tool_id: id })
            .await
            .map_err(|e| e.context("failed to delete tool"))?;

        info!(tool_id = %id, "Deleted tool");
        Ok(())
    }
}
