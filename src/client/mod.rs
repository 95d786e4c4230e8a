//! Sandbox service client.
//!
//! [`SandboxClient`] dispatches every operation to one [`SandboxApi`]
//! backend chosen by name at construction time.

pub mod backends;
pub mod dataplane;
pub mod endpoint;
pub mod factory;
pub mod storage;
pub mod stream;
pub mod token_cache;
pub mod traits;
pub mod types;

pub use endpoint::BrowserEndpoints;
pub use factory::{available_backends, create_backend, BackendInfo, BackendKind, SandboxClient};
pub use storage::{
    mount_option_help, parse_mount_option, parse_storage_mount, storage_mount_help,
    MountSpecError,
};
pub use stream::{decode_reader, decode_stream, ExecutionEvent, JsonLines};
pub use token_cache::TokenCache;
pub use traits::{BackendCapabilities, SandboxApi};
pub use types::*;
