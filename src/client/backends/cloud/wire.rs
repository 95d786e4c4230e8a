//! Cloud control plane request and response shapes.
//!
//! Every response field is optional on the wire. The conversions at the
//! bottom of this file are the only place those options are collapsed, and
//! they always collapse a missing value to the type's zero value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::types::{
    ApiKey, CreateApiKeyResult, CreateInstanceOptions, CreateToolOptions, Instance,
    ListInstancesOptions, ListToolsOptions, MountOption, NetworkMode, ReadOnlyOverride,
    StorageMount, StorageSource, Tool, UpdateToolOptions, VpcConfig,
};

// Shared

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Tag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct NetworkConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_config: Option<WireVpcConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireVpcConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireStorageMount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_source: Option<WireStorageSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireStorageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cos: Option<CosStorageSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct CosStorageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Response body of actions that return nothing but a request ID.
#[derive(Debug, Deserialize)]
pub(crate) struct Empty {}

// Tools

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeSandboxToolListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct DescribeSandboxToolListResponse {
    pub sandbox_tool_set: Option<Vec<WireTool>>,
    pub total_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireTool {
    pub tool_id: Option<String>,
    pub tool_name: Option<String>,
    pub tool_type: Option<String>,
    pub description: Option<String>,
    pub network_configuration: Option<NetworkConfiguration>,
    pub tags: Option<Vec<Tag>>,
    pub role_arn: Option<String>,
    pub storage_mounts: Option<Vec<WireStorageMount>>,
    pub create_time: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateSandboxToolRequest {
    pub tool_name: String,
    pub tool_type: String,
    pub network_configuration: NetworkConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_mounts: Option<Vec<WireStorageMount>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct CreateSandboxToolResponse {
    pub tool_id: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UpdateSandboxToolRequest {
    pub tool_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_configuration: Option<NetworkConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeleteSandboxToolRequest<'a> {
    pub tool_id: &'a str,
}

// Instances

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StartSandboxInstanceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_options: Option<Vec<WireMountOption>>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WireMountOption {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct StartSandboxInstanceResponse {
    pub instance: Option<WireInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireInstance {
    pub instance_id: Option<String>,
    pub tool_id: Option<String>,
    pub tool_name: Option<String>,
    pub status: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DescribeSandboxInstanceListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct DescribeSandboxInstanceListResponse {
    pub instance_set: Option<Vec<WireInstance>>,
    pub total_count: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstanceIdRequest<'a> {
    pub instance_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct AcquireSandboxInstanceTokenResponse {
    pub token: Option<String>,
}

// API keys

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateApiKeyRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CreateApiKeyResponse {
    #[serde(rename = "KeyId")]
    pub key_id: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "APIKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct DescribeApiKeyListRequest {}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DescribeApiKeyListResponse {
    #[serde(rename = "APIKeySet")]
    pub api_key_set: Option<Vec<WireApiKey>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct WireApiKey {
    pub key_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub masked_key: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeleteApiKeyRequest<'a> {
    pub key_id: &'a str,
}

// Conversions

fn some_if_non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn network_mode_from_wire(mode: Option<String>) -> NetworkMode {
    match mode.filter(|m| !m.is_empty()) {
        None => NetworkMode::default(),
        Some(mode) => {
            let mode = NetworkMode::from(mode);
            if let NetworkMode::Other(raw) = &mode {
                debug!(network_mode = %raw, "Unrecognized network mode, keeping it verbatim");
            }
            mode
        }
    }
}

fn tags_to_wire(tags: &BTreeMap<String, String>) -> Vec<Tag> {
    tags.iter()
        .map(|(k, v)| Tag {
            key: Some(k.clone()),
            value: Some(v.clone()),
        })
        .collect()
}

fn tags_from_wire(tags: Option<Vec<Tag>>) -> BTreeMap<String, String> {
    tags.unwrap_or_default()
        .into_iter()
        .filter_map(|tag| Some((tag.key?, tag.value?)))
        .collect()
}

impl From<&ListToolsOptions> for DescribeSandboxToolListRequest {
    fn from(opts: &ListToolsOptions) -> Self {
        if !opts.tool_ids.is_empty() {
            return Self {
                tool_ids: Some(opts.tool_ids.clone()),
                ..Self::default()
            };
        }

        let mut filters = Vec::new();
        if let Some(status) = opts.status.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("Status", status));
        }
        if let Some(tool_type) = opts.tool_type.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("ToolType", tool_type));
        }
        if let Some(since) = opts.created_since.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("created-since", since));
        }
        if let Some(since) = opts.created_since_time.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("created-since-time", since));
        }
        for (key, value) in &opts.tags {
            filters.push(Filter::new(format!("tag:{}", key), value.as_str()));
        }

        Self {
            tool_ids: None,
            offset: opts.offset.filter(|&o| o > 0),
            limit: opts.limit.filter(|&l| l > 0),
            filters: (!filters.is_empty()).then_some(filters),
        }
    }
}

impl From<&CreateToolOptions> for CreateSandboxToolRequest {
    fn from(opts: &CreateToolOptions) -> Self {
        let network_mode = opts.network_mode.clone().unwrap_or_default();
        let vpc_config = match network_mode {
            NetworkMode::Vpc => opts.vpc_config.as_ref().map(WireVpcConfig::from),
            _ => None,
        };

        Self {
            tool_name: opts.name.clone(),
            tool_type: opts.tool_type.clone(),
            network_configuration: NetworkConfiguration {
                network_mode: Some(network_mode.as_str().to_string()),
                vpc_config,
            },
            description: opts.description.as_deref().and_then(some_if_non_empty),
            default_timeout: opts.default_timeout.as_deref().and_then(some_if_non_empty),
            tags: (!opts.tags.is_empty()).then(|| tags_to_wire(&opts.tags)),
            role_arn: opts.role_arn.as_deref().and_then(some_if_non_empty),
            storage_mounts: (!opts.storage_mounts.is_empty())
                .then(|| opts.storage_mounts.iter().map(WireStorageMount::from).collect()),
        }
    }
}

impl From<&UpdateToolOptions> for UpdateSandboxToolRequest {
    fn from(opts: &UpdateToolOptions) -> Self {
        Self {
            tool_id: opts.tool_id.clone(),
            description: opts.description.clone(),
            network_configuration: opts.network_mode.as_ref().map(|mode| NetworkConfiguration {
                network_mode: Some(mode.as_str().to_string()),
                vpc_config: None,
            }),
            tags: opts.tags.as_ref().map(tags_to_wire),
        }
    }
}

impl From<&VpcConfig> for WireVpcConfig {
    fn from(vpc: &VpcConfig) -> Self {
        Self {
            subnet_ids: (!vpc.subnet_ids.is_empty()).then(|| vpc.subnet_ids.clone()),
            security_group_ids: (!vpc.security_group_ids.is_empty())
                .then(|| vpc.security_group_ids.clone()),
        }
    }
}

impl From<WireVpcConfig> for VpcConfig {
    fn from(vpc: WireVpcConfig) -> Self {
        Self {
            subnet_ids: vpc.subnet_ids.unwrap_or_default(),
            security_group_ids: vpc.security_group_ids.unwrap_or_default(),
        }
    }
}

impl From<&StorageMount> for WireStorageMount {
    fn from(mount: &StorageMount) -> Self {
        let storage_source = mount.source.as_ref().map(|source| match source {
            StorageSource::Cos {
                bucket_name,
                bucket_path,
                endpoint,
            } => WireStorageSource {
                cos: Some(CosStorageSource {
                    bucket_name: Some(bucket_name.clone()),
                    bucket_path: Some(bucket_path.clone()),
                    endpoint: endpoint.as_deref().and_then(some_if_non_empty),
                }),
            },
        });

        Self {
            name: Some(mount.name.clone()),
            mount_path: Some(mount.mount_path.clone()),
            read_only: Some(mount.read_only),
            storage_source,
        }
    }
}

impl From<WireStorageMount> for StorageMount {
    fn from(mount: WireStorageMount) -> Self {
        let source = mount
            .storage_source
            .and_then(|source| source.cos)
            .map(|cos| StorageSource::Cos {
                bucket_name: cos.bucket_name.unwrap_or_default(),
                bucket_path: cos.bucket_path.unwrap_or_default(),
                endpoint: cos.endpoint.filter(|e| !e.is_empty()),
            });

        Self {
            name: mount.name.unwrap_or_default(),
            mount_path: mount.mount_path.unwrap_or_default(),
            read_only: mount.read_only.unwrap_or(false),
            source,
        }
    }
}

impl From<WireTool> for Tool {
    fn from(tool: WireTool) -> Self {
        let network = tool.network_configuration.unwrap_or_default();

        Tool {
            id: tool.tool_id.unwrap_or_default(),
            name: tool.tool_name.unwrap_or_default(),
            tool_type: tool.tool_type.unwrap_or_default(),
            description: tool.description.unwrap_or_default(),
            network_mode: network_mode_from_wire(network.network_mode),
            vpc_config: network.vpc_config.map(VpcConfig::from),
            tags: tags_from_wire(tool.tags),
            role_arn: tool.role_arn.filter(|r| !r.is_empty()),
            storage_mounts: tool
                .storage_mounts
                .unwrap_or_default()
                .into_iter()
                .map(StorageMount::from)
                .collect(),
            created_at: tool.create_time.unwrap_or_default(),
        }
    }
}

impl From<&MountOption> for WireMountOption {
    fn from(option: &MountOption) -> Self {
        Self {
            name: option.name.clone(),
            mount_path: option.mount_path.clone(),
            sub_path: option.sub_path.clone(),
            read_only: match option.read_only {
                ReadOnlyOverride::Inherit => None,
                ReadOnlyOverride::Force => Some(true),
            },
        }
    }
}

impl From<&CreateInstanceOptions> for StartSandboxInstanceRequest {
    fn from(opts: &CreateInstanceOptions) -> Self {
        Self {
            tool_id: opts.tool_id.as_deref().and_then(some_if_non_empty),
            tool_name: opts.tool_name.as_deref().and_then(some_if_non_empty),
            timeout: opts
                .timeout_seconds
                .filter(|&s| s > 0)
                .map(|s| format!("{}s", s)),
            mount_options: (!opts.mount_options.is_empty())
                .then(|| opts.mount_options.iter().map(WireMountOption::from).collect()),
        }
    }
}

impl From<&ListInstancesOptions> for DescribeSandboxInstanceListRequest {
    fn from(opts: &ListInstancesOptions) -> Self {
        if !opts.instance_ids.is_empty() {
            return Self {
                instance_ids: Some(opts.instance_ids.clone()),
                ..Self::default()
            };
        }

        let mut filters = Vec::new();
        if let Some(tool_id) = opts.tool_id.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("ToolId", tool_id));
        }
        if let Some(status) = opts.status.as_deref().filter(|s| !s.is_empty()) {
            filters.push(Filter::new("Status", status));
        }

        Self {
            instance_ids: None,
            offset: opts.offset.filter(|&o| o > 0),
            limit: opts.limit.filter(|&l| l > 0),
            filters: (!filters.is_empty()).then_some(filters),
        }
    }
}

impl From<WireInstance> for Instance {
    fn from(instance: WireInstance) -> Self {
        Instance {
            id: instance.instance_id.unwrap_or_default(),
            tool_id: instance.tool_id.unwrap_or_default(),
            tool_name: instance.tool_name.unwrap_or_default(),
            status: instance.status.unwrap_or_default(),
            created_at: instance.create_time.unwrap_or_default(),
            access_token: None,
            domain: None,
        }
    }
}

impl From<CreateApiKeyResponse> for CreateApiKeyResult {
    fn from(response: CreateApiKeyResponse) -> Self {
        Self {
            key_id: response.key_id.unwrap_or_default(),
            name: response.name.unwrap_or_default(),
            api_key: response.api_key.unwrap_or_default(),
        }
    }
}

impl From<WireApiKey> for ApiKey {
    fn from(key: WireApiKey) -> Self {
        Self {
            key_id: key.key_id.unwrap_or_default(),
            name: key.name.unwrap_or_default(),
            status: key.status.unwrap_or_default(),
            masked_key: key.masked_key.unwrap_or_default(),
            created_at: key.created_at.unwrap_or_default(),
        }
    }
}
