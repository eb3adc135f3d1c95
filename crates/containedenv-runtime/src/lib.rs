//! Container runtime adapters for containedenv.
//!
//! This crate implements the execution layer behind the `ContainerRuntime`
//! trait: name lookups, image build/remove, container run/remove and exec.
//! `DockerCli` drives the `docker` (or CLI-compatible `podman`) binary,
//! `MockRuntime` is an in-memory runtime that records every call.

pub mod backend;
pub mod docker;
pub mod mock;
pub mod prereq;

pub use backend::{
    select_runtime, BuildRequest, ContainerHandle, ContainerRuntime, ExecOutput, ExecRequest,
    ImageHandle, RunRequest,
};
pub use docker::DockerCli;
pub use mock::{MockCall, MockRuntime};
pub use prereq::{check_runtime_prereqs, format_missing, MissingPrereq};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("runtime '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("{op} '{target}' failed: {message}")]
    CommandFailed {
        op: &'static str,
        target: String,
        message: String,
    },
    #[error("unexpected output from {op}: {message}")]
    MalformedOutput { op: &'static str, message: String },
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("exec not supported by {0} runtime")]
    ExecUnsupported(String),
}
