//! Provisioning configuration for containedenv.
//!
//! This crate defines the schema layer: TOML config parsing (`ConfigV1`),
//! the validated, typed configuration tree (`ProvisioningConfig`), the package
//! catalog, and the deterministic image/container names derived from the app
//! identity (`AppIdentity`).

pub mod catalog;
pub mod config;
pub mod identity;
pub mod normalize;
pub mod types;

pub use catalog::{PackageCatalog, PackageEntry};
pub use config::{
    load_config, parse_config_file, parse_config_str, AppSection, ConfigError, ConfigV1,
    PackageSection, ProjectSection, RuntimeSection, ScmProfileSection, CONFIG_FILE_NAME,
};
pub use identity::{AppIdentity, DEFAULT_NAMESPACE};
pub use normalize::{PortMapping, Project, ProvisioningConfig, ScmProfile};
pub use types::{ContainerName, ImageName};
