//! ---
//! airlift_section: "01-core-functionality"
//! airlift_subsection: "module"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Shared primitives for the lifecycle orchestrator."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
//! Shared primitives for the airlift workspace.
//! This crate exposes stack configuration loading and tracing setup
//! consumed by the lifecycle library and the control CLI.

pub mod config;
pub mod logging;

pub use config::{
    AdminCredential, BootstrapConfig, ComposeConfig, ConfigError, ConfigSource, DatabaseConfig,
    DirectoriesConfig, InspectConfig, LoadedStackConfig, LoggingConfig, ReadinessConfig,
    ServicesConfig, StackConfig, StartConfig,
};
pub use logging::{init_tracing, LogFormat};
