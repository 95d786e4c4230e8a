pub mod cloud;
pub mod e2b;
mod http;

pub use cloud::CloudClient;
pub use e2b::E2bClient;
