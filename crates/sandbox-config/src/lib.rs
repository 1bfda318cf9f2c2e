//! The service's configuration surface (§6): a single hierarchical
//! document with environment-variable overrides, held behind a
//! read-copy-update handle so a reload never disturbs in-flight requests.

mod handle;
mod loader;
mod model;

pub use handle::ConfigHandle;
pub use model::{
    AuthenticationConfig, Config, ConnectionDescriptorConfig, DataSharingConfig, Environment,
    ExecutionMode, PlatformConfig, ResourceLimitsConfig, SecurityConfig, ServerConfig, SslMode,
    VendorTag,
};
