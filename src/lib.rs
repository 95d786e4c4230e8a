pub mod client;
pub mod config;
pub mod error;

pub use client::{BackendKind, SandboxApi, SandboxClient};
pub use config::{load_config, AgsConfig};
pub use error::{AgsError, Result};
