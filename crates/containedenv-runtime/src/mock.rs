use crate::backend::{
    BuildRequest, ContainerHandle, ContainerRuntime, ExecOutput, ExecRequest, ImageHandle,
    RunRequest,
};
use crate::RuntimeError;
use std::sync::{Mutex, MutexGuard};

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FindImage(String),
    FindContainer(String),
    BuildImage { tag: String, force_rm: bool },
    RemoveImage { id: String, force: bool },
    RunContainer(RunRequest),
    RemoveContainer { id: String, force: bool },
    Exec { container: String, command: String },
}

impl MockCall {
    /// Whether the call mutates runtime state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::FindImage(_) | Self::FindContainer(_) | Self::Exec { .. }
        )
    }
}

#[derive(Default)]
struct MockState {
    images: Vec<ImageHandle>,
    containers: Vec<ContainerHandle>,
    calls: Vec<MockCall>,
    scripts: Vec<String>,
    next_id: u32,
    build_failure: Option<String>,
    lookup_failure: Option<String>,
    exec_failures: Vec<(String, i32)>,
}

impl MockState {
    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:012}", self.next_id)
    }
}

/// In-memory runtime. Records every call, stores the content of each script
/// it was asked to build, and mimics the runtime's refusal to delete an image
/// that a container still uses.
#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, RuntimeError> {
        self.state.lock().map_err(|e| RuntimeError::CommandFailed {
            op: "mock",
            target: "state".to_owned(),
            message: format!("mutex poisoned: {e}"),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed an existing image carrying `tags`.
    pub fn with_image(self, tags: &[&str]) -> Self {
        {
            let mut state = self.state();
            let id = state.fresh_id("sha256:");
            state.images.push(ImageHandle {
                id,
                tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            });
        }
        self
    }

    /// Seed an existing container named `name` created from `image`.
    pub fn with_container(self, name: &str, image: &str) -> Self {
        {
            let mut state = self.state();
            let id = state.fresh_id("cnt");
            state.containers.push(ContainerHandle {
                id,
                name: name.to_owned(),
                image: image.to_owned(),
                running: true,
            });
        }
        self
    }

    /// Make every subsequent build fail with `message`.
    pub fn fail_builds(self, message: &str) -> Self {
        self.state().build_failure = Some(message.to_owned());
        self
    }

    /// Make every subsequent lookup fail as if the daemon were unreachable.
    pub fn fail_lookups(self, message: &str) -> Self {
        self.state().lookup_failure = Some(message.to_owned());
        self
    }

    /// Exec calls whose command contains `needle` exit with `status`.
    pub fn fail_exec_containing(self, needle: &str, status: i32) -> Self {
        self.state().exec_failures.push((needle.to_owned(), status));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls().into_iter().filter(MockCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Content of every script handed to `build_image`, in call order.
    pub fn built_scripts(&self) -> Vec<String> {
        self.state().scripts.clone()
    }

    pub fn images(&self) -> Vec<ImageHandle> {
        self.state().images.clone()
    }

    pub fn containers(&self) -> Vec<ContainerHandle> {
        self.state().containers.clone()
    }

    /// Replace the tags of every image, simulating an external retag.
    pub fn retag_all(&self, tags: &[&str]) {
        for image in &mut self.state().images {
            image.tags = tags.iter().map(|t| (*t).to_owned()).collect();
        }
    }
}

impl ContainerRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn find_image(&self, name: &str) -> Result<Option<ImageHandle>, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::FindImage(name.to_owned()));
        if let Some(message) = &state.lookup_failure {
            return Err(RuntimeError::CommandFailed {
                op: "image inspect",
                target: name.to_owned(),
                message: message.clone(),
            });
        }
        Ok(state
            .images
            .iter()
            .find(|i| i.id == name || i.tags.iter().any(|t| t == name))
            .cloned())
    }

    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::FindContainer(name.to_owned()));
        if let Some(message) = &state.lookup_failure {
            return Err(RuntimeError::CommandFailed {
                op: "container inspect",
                target: name.to_owned(),
                message: message.clone(),
            });
        }
        Ok(state
            .containers
            .iter()
            .find(|c| c.id == name || c.name == name)
            .cloned())
    }

    fn build_image(&self, request: &BuildRequest) -> Result<ImageHandle, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::BuildImage {
            tag: request.tag.clone(),
            force_rm: request.force_rm,
        });
        let script = std::fs::read_to_string(&request.script)?;
        state.scripts.push(script);

        if let Some(message) = &state.build_failure {
            return Err(RuntimeError::CommandFailed {
                op: "build",
                target: request.tag.clone(),
                message: message.clone(),
            });
        }

        // A tag moves to the newest image, like a real runtime.
        for image in &mut state.images {
            image.tags.retain(|t| *t != request.tag);
        }
        let id = state.fresh_id("sha256:");
        let image = ImageHandle {
            id,
            tags: vec![request.tag.clone()],
        };
        state.images.push(image.clone());
        Ok(image)
    }

    fn remove_image(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::RemoveImage {
            id: id.to_owned(),
            force,
        });
        let Some(pos) = state.images.iter().position(|i| i.id == id) else {
            return Err(RuntimeError::ImageNotFound(id.to_owned()));
        };
        let image = &state.images[pos];
        let in_use = state
            .containers
            .iter()
            .any(|c| c.image == image.id || image.tags.contains(&c.image));
        if in_use {
            return Err(RuntimeError::CommandFailed {
                op: "image rm",
                target: id.to_owned(),
                message: "image is being used by a container".to_owned(),
            });
        }
        state.images.remove(pos);
        Ok(())
    }

    fn run_container(&self, request: &RunRequest) -> Result<ContainerHandle, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::RunContainer(request.clone()));
        if state.containers.iter().any(|c| c.name == request.name) {
            return Err(RuntimeError::CommandFailed {
                op: "run",
                target: request.name.clone(),
                message: "container name already in use".to_owned(),
            });
        }
        let known = state
            .images
            .iter()
            .any(|i| i.id == request.image || i.tags.contains(&request.image));
        if !known {
            return Err(RuntimeError::ImageNotFound(request.image.clone()));
        }
        let id = state.fresh_id("cnt");
        let container = ContainerHandle {
            id,
            name: request.name.clone(),
            image: request.image.clone(),
            running: request.detach,
        };
        state.containers.push(container.clone());
        Ok(container)
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::RemoveContainer {
            id: id.to_owned(),
            force,
        });
        let Some(pos) = state.containers.iter().position(|c| c.id == id) else {
            return Err(RuntimeError::ContainerNotFound(id.to_owned()));
        };
        if state.containers[pos].running && !force {
            return Err(RuntimeError::CommandFailed {
                op: "container rm",
                target: id.to_owned(),
                message: "container is running".to_owned(),
            });
        }
        state.containers.remove(pos);
        Ok(())
    }

    fn exec(
        &self,
        container: &ContainerHandle,
        request: &ExecRequest,
    ) -> Result<ExecOutput, RuntimeError> {
        let mut state = self.lock()?;
        state.calls.push(MockCall::Exec {
            container: container.name.clone(),
            command: request.command.clone(),
        });
        let status = state
            .exec_failures
            .iter()
            .find(|(needle, _)| request.command.contains(needle.as_str()))
            .map_or(0, |(_, status)| *status);
        Ok(ExecOutput {
            status,
            stdout: format!("mock-exec: {}\n", request.command),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_request(dir: &std::path::Path, tag: &str) -> BuildRequest {
        let script = dir.join("Dockerfile.test");
        std::fs::write(&script, "FROM ubuntu:22.04\n").unwrap();
        BuildRequest {
            context: dir.to_path_buf(),
            script,
            tag: tag.to_owned(),
            force_rm: true,
        }
    }

    fn run_request(image: &str, name: &str) -> RunRequest {
        RunRequest {
            image: image.to_owned(),
            name: name.to_owned(),
            hostname: "web".to_owned(),
            user: "root".to_owned(),
            command: vec!["bash".to_owned()],
            ports: Vec::new(),
            tty: true,
            interactive: true,
            detach: true,
        }
    }

    #[test]
    fn mock_build_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new();
        assert!(rt.find_image("ns:web").unwrap().is_none());

        let built = rt.build_image(&build_request(dir.path(), "ns:web")).unwrap();
        let found = rt.find_image("ns:web").unwrap().unwrap();
        assert_eq!(built, found);
        assert_eq!(rt.built_scripts(), vec!["FROM ubuntu:22.04\n"]);
    }

    #[test]
    fn mock_refuses_removing_image_in_use() {
        let rt = MockRuntime::new()
            .with_image(&["ns:web"])
            .with_container("web_cnt", "ns:web");
        let image = rt.find_image("ns:web").unwrap().unwrap();
        assert!(rt.remove_image(&image.id, true).is_err());

        let cnt = rt.find_container("web_cnt").unwrap().unwrap();
        rt.remove_container(&cnt.id, true).unwrap();
        rt.remove_image(&image.id, true).unwrap();
        assert!(rt.images().is_empty());
    }

    #[test]
    fn mock_run_requires_known_image() {
        let rt = MockRuntime::new();
        assert!(matches!(
            rt.run_container(&run_request("ns:web", "web_cnt")),
            Err(RuntimeError::ImageNotFound(_))
        ));
    }

    #[test]
    fn mock_run_rejects_duplicate_name() {
        let rt = MockRuntime::new().with_image(&["ns:web"]);
        rt.run_container(&run_request("ns:web", "web_cnt")).unwrap();
        assert!(rt.run_container(&run_request("ns:web", "web_cnt")).is_err());
    }

    #[test]
    fn mock_injected_failures() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new().fail_builds("boom");
        assert!(rt.build_image(&build_request(dir.path(), "ns:web")).is_err());
        assert_eq!(rt.built_scripts().len(), 1);

        let rt = MockRuntime::new().fail_lookups("daemon down");
        assert!(rt.find_image("ns:web").is_err());
        assert!(rt.find_container("web_cnt").is_err());
    }

    #[test]
    fn mock_exec_status() {
        let rt = MockRuntime::new()
            .with_image(&["ns:web"])
            .fail_exec_containing("make", 2);
        let cnt = rt.run_container(&run_request("ns:web", "web_cnt")).unwrap();
        let ok = rt
            .exec(&cnt, &ExecRequest { command: "ls".to_owned(), ..ExecRequest::default() })
            .unwrap();
        assert!(ok.success());
        let failed = rt
            .exec(&cnt, &ExecRequest { command: "make setup".to_owned(), ..ExecRequest::default() })
            .unwrap();
        assert_eq!(failed.status, 2);
    }

    #[test]
    fn lookups_are_not_mutations() {
        let rt = MockRuntime::new();
        rt.find_image("a").unwrap();
        rt.find_container("b").unwrap();
        assert_eq!(rt.calls().len(), 2);
        assert!(rt.mutations().is_empty());
    }
}
