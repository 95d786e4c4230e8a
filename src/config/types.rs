use serde::{Deserialize, Serialize};

use crate::client::BackendKind;
use crate::error::{AgsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgsConfig {
    /// Backend name ("e2b" or "cloud"); unknown names fall back to e2b
    pub backend: String,
    /// HTTP transport settings shared by all backends
    pub http: HttpConfig,
    /// REST backend configuration
    pub e2b: E2bConfig,
    /// Cloud backend configuration
    pub cloud: CloudConfig,
}

impl Default for AgsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default().name().to_string(),
            http: HttpConfig::default(),
            e2b: E2bConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

impl AgsConfig {
    /// The backend selected by `backend`, after default fallback.
    pub fn backend_kind(&self) -> BackendKind {
        BackendKind::from_name(&self.backend)
    }

    /// Check that the selected backend has the credentials it needs.
    pub fn validate(&self) -> Result<()> {
        match self.backend_kind() {
            BackendKind::E2b => {
                if self.e2b.api_key.is_empty() {
                    return Err(AgsError::Config(
                        "E2B API key is required (set AGS_E2B_API_KEY or e2b.api_key in config)"
                            .to_string(),
                    ));
                }
            }
            BackendKind::Cloud => {
                if self.cloud.secret_id.is_empty() || self.cloud.secret_key.is_empty() {
                    return Err(AgsError::Config(
                        "Cloud API credentials are required (set AGS_CLOUD_SECRET_ID/AGS_CLOUD_SECRET_KEY or cloud.secret_id/cloud.secret_key in config)"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect timeout for every request, and whole-request timeout for
    /// management calls, in seconds. Execution streams are not bounded by it.
    pub timeout_seconds: u64,
    /// Optional deadline applied by the dispatcher to every operation
    pub call_timeout_seconds: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            call_timeout_seconds: None,
        }
    }
}

/// REST backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct E2bConfig {
    pub api_key: String,
    /// Base domain for control plane and execution hosts
    pub domain: String,
    pub region: String,
    /// Control plane base URL override (default: https://api.{region}.{domain})
    pub api_url: Option<String>,
    /// Execution base URL override (default: https://{port}-{id}.{region}.{domain})
    pub execute_url: Option<String>,
}

impl Default for E2bConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            domain: "tencentags.com".to_string(),
            region: "ap-guangzhou".to_string(),
            api_url: None,
            execute_url: None,
        }
    }
}

impl E2bConfig {
    pub fn api_base_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}.{}", self.region, self.domain),
        }
    }
}

/// Cloud backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub secret_id: String,
    pub secret_key: String,
    pub region: String,
    /// Use internal endpoints for both control plane and data plane
    pub internal: bool,
    /// Control plane base URL override (default: https://{control_plane_endpoint})
    pub endpoint_url: Option<String>,
    /// Execution base URL override
    pub execute_url: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            region: "ap-guangzhou".to_string(),
            internal: false,
            endpoint_url: None,
            execute_url: None,
        }
    }
}

impl CloudConfig {
    pub fn control_plane_endpoint(&self) -> &'static str {
        if self.internal {
            "ags.internal.tencentcloudapi.com"
        } else {
            "ags.tencentcloudapi.com"
        }
    }

    pub fn data_plane_domain(&self) -> &'static str {
        if self.internal {
            "internal.tencentags.com"
        } else {
            "tencentags.com"
        }
    }

    pub fn control_plane_url(&self) -> String {
        match &self.endpoint_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.control_plane_endpoint()),
        }
    }
}
