//! Provisioning engine for containedenv.
//!
//! This crate turns a validated `ProvisioningConfig` into a running container:
//! the resolver expands package requests into an install plan, the script
//! builder renders the plan as a provisioning script, and the lifecycle
//! manager reuses, builds or replaces the image and container through a
//! `ContainerRuntime`. `Engine` bundles these into `plan`, `up`, `down` and
//! `status`.

pub mod engine;
pub mod lifecycle;
pub mod pkgmgr;
pub mod resolver;
pub mod script;
pub mod setup;
pub mod special;

pub use engine::{DownReport, Engine, StatusReport, UpOptions, UpReport};
pub use lifecycle::{decide, provisioning_script, Action, Ensured, LifecycleManager, Outcome};
pub use pkgmgr::PackageManager;
pub use resolver::{CatalogContribution, InstallPlan, ResolveError, Resolver};
pub use script::{Instruction, Script, ScriptBuilder, ScriptError, ScriptFile};
pub use setup::{run_setup, setup_steps, SetupStep};
pub use special::SpecialPackage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] containedenv_schema::ConfigError),
    #[error("configuration error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("runtime error: {0}")]
    Runtime(#[from] containedenv_runtime::RuntimeError),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("container {container} was created from {image}, not {expected}; remove it or rename the app")]
    ForeignContainer {
        container: String,
        image: String,
        expected: String,
    },
    #[error("setup of project '{project}' failed: `{command}` exited with status {status}: {stderr}")]
    SetupFailed {
        project: String,
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
