//! Host naming for per-instance data plane endpoints.
//!
//! Every instance service is reachable at `{port}-{instance_id}.{region}.{domain}`.

use serde::Serialize;

/// Port of the code execution service inside an instance.
pub const EXECUTION_PORT: u16 = 49999;

/// Default port of the browser (VNC/CDP) service inside an instance.
pub const DEFAULT_BROWSER_PORT: u16 = 9000;

pub fn execution_domain(port: u16, instance_id: &str, region: &str, domain: &str) -> String {
    format!("{}-{}.{}.{}", port, instance_id, region, domain)
}

pub fn execution_base_url(port: u16, instance_id: &str, region: &str, domain: &str) -> String {
    format!("https://{}", execution_domain(port, instance_id, region, domain))
}

/// Browser access URLs for a browser sandbox instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserEndpoints {
    pub vnc_url: String,
    pub cdp_url: String,
}

impl BrowserEndpoints {
    pub fn new(host: &str, access_token: &str) -> Self {
        Self {
            vnc_url: format!(
                "https://{}/novnc/vnc_lite.html?&path=websockify?access_token={}",
                host, access_token
            ),
            cdp_url: format!("https://{}/cdp?access_token={}", host, access_token),
        }
    }
}
