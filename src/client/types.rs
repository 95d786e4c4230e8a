//! Provider-neutral domain model shared by every backend.
//!
//! These are plain value records. Backend wire representations are converted
//! into them at the backend boundary and never leak past it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgsError;

/// Network mode of a tool.
///
/// Modes the service reports that this crate does not know yet are kept
/// verbatim as [`NetworkMode::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkMode {
    #[default]
    Public,
    Vpc,
    Sandbox,
    InternalService,
    Other(String),
}

impl NetworkMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Public => "PUBLIC",
            Self::Vpc => "VPC",
            Self::Sandbox => "SANDBOX",
            Self::InternalService => "INTERNAL_SERVICE",
            Self::Other(mode) => mode,
        }
    }

    fn known(mode: &str) -> Option<Self> {
        match mode {
            "PUBLIC" => Some(Self::Public),
            "VPC" => Some(Self::Vpc),
            "SANDBOX" => Some(Self::Sandbox),
            "INTERNAL_SERVICE" => Some(Self::InternalService),
            _ => None,
        }
    }
}

impl From<String> for NetworkMode {
    fn from(mode: String) -> Self {
        Self::known(&mode).unwrap_or(Self::Other(mode))
    }
}

impl From<NetworkMode> for String {
    fn from(mode: NetworkMode) -> Self {
        match mode {
            NetworkMode::Other(mode) => mode,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = AgsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = s.trim().to_ascii_uppercase();
        Self::known(&mode).ok_or_else(|| AgsError::InvalidArgument {
            field: "network mode",
            reason: format!(
                "unknown value '{}' (expected PUBLIC, VPC, SANDBOX or INTERNAL_SERVICE)",
                mode
            ),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// Object storage source backing a mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageSource {
    Cos {
        bucket_name: String,
        /// Absolute path inside the bucket
        bucket_path: String,
        endpoint: Option<String>,
    },
}

impl StorageSource {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Cos { .. } => "cos",
        }
    }
}

/// A storage mount declared on a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMount {
    pub name: String,
    /// Absolute mount path inside the sandbox
    pub mount_path: String,
    pub read_only: bool,
    /// Absent only when the backend reported a mount without a source
    pub source: Option<StorageSource>,
}

/// Read-only override carried by a [`MountOption`].
///
/// Only tightening is representable: an override can never clear a
/// tool-declared read-only flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOnlyOverride {
    #[default]
    Inherit,
    Force,
}

/// Per-instance override of a tool-declared mount, matched by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOption {
    pub name: String,
    pub mount_path: Option<String>,
    /// Sub-directory appended under the mount for tenant isolation
    pub sub_path: Option<String>,
    pub read_only: ReadOnlyOverride,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub tool_type: String,
    pub description: String,
    pub network_mode: NetworkMode,
    pub vpc_config: Option<VpcConfig>,
    pub tags: BTreeMap<String, String>,
    /// Role assumed for cross-account storage access
    pub role_arn: Option<String>,
    pub storage_mounts: Vec<StorageMount>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub tool_id: String,
    pub tool_name: String,
    /// Free-text state as reported (or approximated) by the backend
    pub status: String,
    pub created_at: String,
    pub access_token: Option<String>,
    /// Execution domain suffix, `{region}.{domain}`
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub key_id: String,
    pub name: String,
    pub status: String,
    /// Display-safe partial secret
    pub masked_key: String,
    pub created_at: String,
}

/// Result of creating an API key. `api_key` is the only copy of the secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateApiKeyResult {
    pub key_id: String,
    pub name: String,
    pub api_key: String,
}

// ============================================================================
// Operation options
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CreateToolOptions {
    pub name: String,
    pub tool_type: String,
    pub description: Option<String>,
    /// Defaults to PUBLIC when unset
    pub network_mode: Option<NetworkMode>,
    /// Sent only when the effective network mode is VPC
    pub vpc_config: Option<VpcConfig>,
    pub default_timeout: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub role_arn: Option<String>,
    pub storage_mounts: Vec<StorageMount>,
}

/// Partial update: only `Some` fields are sent.
#[derive(Debug, Clone, Default)]
pub struct UpdateToolOptions {
    pub tool_id: String,
    pub description: Option<String>,
    pub network_mode: Option<NetworkMode>,
    pub tags: Option<BTreeMap<String, String>>,
}

/// Tool listing query.
///
/// A non-empty `tool_ids` selects those tools directly; every other field is
/// then ignored.
#[derive(Debug, Clone, Default)]
pub struct ListToolsOptions {
    pub tool_ids: Vec<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
    pub tool_type: Option<String>,
    /// Relative age token such as "1h" or "7d"
    pub created_since: Option<String>,
    /// Absolute timestamp
    pub created_since_time: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateInstanceOptions {
    pub tool_id: Option<String>,
    pub tool_name: Option<String>,
    /// Instance lifetime in seconds; backend default when unset or zero
    pub timeout_seconds: Option<u64>,
    pub mount_options: Vec<MountOption>,
}

/// Instance listing query; a non-empty `instance_ids` ignores the rest.
#[derive(Debug, Clone, Default)]
pub struct ListInstancesOptions {
    pub instance_ids: Vec<String>,
    pub tool_id: Option<String>,
    pub status: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListInstancesResult {
    pub instances: Vec<Instance>,
    pub total_count: u64,
}

// ============================================================================
// Execution
// ============================================================================

/// Runtime error reported by the sandbox. This is data, not a call failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub traceback: String,
}

/// Aggregated output of one code execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecuteResult {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

type OutputCallback = Box<dyn FnMut(&str) + Send>;

/// Live output callbacks, invoked synchronously while the stream is read.
#[derive(Default)]
pub struct StreamCallbacks {
    on_stdout: Option<OutputCallback>,
    on_stderr: Option<OutputCallback>,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stdout(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(callback));
        self
    }

    pub fn on_stderr(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(callback));
        self
    }

    pub(crate) fn stdout(&mut self, text: &str) {
        if let Some(callback) = self.on_stdout.as_mut() {
            callback(text);
        }
    }

    pub(crate) fn stderr(&mut self, text: &str) {
        if let Some(callback) = self.on_stderr.as_mut() {
            callback(text);
        }
    }
}

impl fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .finish()
    }
}
