use crate::RuntimeError;
use containedenv_schema::PortMapping;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque reference to an image owned by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageHandle {
    pub id: String,
    pub tags: Vec<String>,
}

impl ImageHandle {
    /// The tag exactly equal to `name`, if the image carries it.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.iter().map(String::as_str).find(|t| *t == name)
    }
}

/// Opaque reference to a container owned by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Directory sent to the runtime as build context.
    pub context: PathBuf,
    /// Provisioning script, normally inside `context`.
    pub script: PathBuf,
    pub tag: String,
    /// Remove intermediate containers even after failed builds.
    pub force_rm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub name: String,
    pub hostname: String,
    pub user: String,
    pub command: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub tty: bool,
    pub interactive: bool,
    pub detach: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    /// Shell line, run through `bash -lc`.
    pub command: String,
    pub workdir: Option<String>,
    pub user: Option<String>,
    /// Environment for the command. Adapters must not put values on a
    /// command line.
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Primitives consumed from a container runtime.
///
/// Lookups return `Ok(None)` when the runtime reports the object does not
/// exist. Every other failure is an error; a failed lookup must never be
/// mistaken for an absent object.
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn find_image(&self, name: &str) -> Result<Option<ImageHandle>, RuntimeError>;

    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>, RuntimeError>;

    fn build_image(&self, request: &BuildRequest) -> Result<ImageHandle, RuntimeError>;

    fn remove_image(&self, id: &str, force: bool) -> Result<(), RuntimeError>;

    fn run_container(&self, request: &RunRequest) -> Result<ContainerHandle, RuntimeError>;

    fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError>;

    fn exec(
        &self,
        _container: &ContainerHandle,
        _request: &ExecRequest,
    ) -> Result<ExecOutput, RuntimeError> {
        Err(RuntimeError::ExecUnsupported(self.name().to_owned()))
    }

    /// Human-facing command that opens a shell in `container`.
    fn enter_hint(&self, container: &str) -> String {
        format!("{} exec -it {container} bash", self.name())
    }
}

pub fn select_runtime(name: &str) -> Result<Box<dyn ContainerRuntime>, RuntimeError> {
    match name {
        "docker" => Ok(Box::new(crate::docker::DockerCli::new("docker"))),
        "podman" => Ok(Box::new(crate::docker::DockerCli::new("podman"))),
        "mock" => Ok(Box::new(crate::mock::MockRuntime::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_runtimes() {
        assert_eq!(select_runtime("docker").unwrap().name(), "docker");
        assert_eq!(select_runtime("podman").unwrap().name(), "podman");
        assert_eq!(select_runtime("mock").unwrap().name(), "mock");
    }

    #[test]
    fn select_invalid_runtime_fails() {
        assert!(matches!(
            select_runtime("lxc"),
            Err(RuntimeError::BackendUnavailable(name)) if name == "lxc"
        ));
    }

    #[test]
    fn tag_lookup_is_exact() {
        let image = ImageHandle {
            id: "sha256:1".to_owned(),
            tags: vec!["containedenv:web2".to_owned(), "containedenv:web".to_owned()],
        };
        assert_eq!(image.tag("containedenv:web"), Some("containedenv:web"));
        assert_eq!(image.tag("containedenv:we"), None);
    }

    #[test]
    fn enter_hint_uses_runtime_binary() {
        let rt = select_runtime("podman").unwrap();
        assert_eq!(rt.enter_hint("web_cnt"), "podman exec -it web_cnt bash");
    }
}
