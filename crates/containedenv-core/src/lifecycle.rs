//! Image and container lifecycle.
//!
//! Both runtime objects follow the same state machine: a lookup by
//! deterministic name yields `Absent` or `Exists`; an existing object is
//! reused unless the caller explicitly asked for a rebuild, in which case it
//! is destroyed first and then created like an absent one.

use crate::pkgmgr::PackageManager;
use crate::resolver::Resolver;
use crate::script::{Script, ScriptBuilder, ScriptFile};
use crate::CoreError;
use containedenv_runtime::{
    BuildRequest, ContainerHandle, ContainerRuntime, ImageHandle, RunRequest,
};
use containedenv_schema::ProvisioningConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to a runtime object during `ensure_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Reused,
    Created,
    Rebuilt,
}

/// Decision taken for one runtime object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reuse,
    Create,
    Replace,
}

/// Pure transition function of the lifecycle state machine.
pub fn decide(exists: bool, rebuild: bool) -> Action {
    match (exists, rebuild) {
        (true, false) => Action::Reuse,
        (true, true) => Action::Replace,
        (false, _) => Action::Create,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ensured<H> {
    pub handle: H,
    pub outcome: Outcome,
}

/// Synthesize the full provisioning script for `config`: base image, user,
/// package index refresh, resolved installs, then each project's literal
/// image lines. A fresh resolver is used on every call.
pub fn provisioning_script(config: &ProvisioningConfig) -> Result<Script, CoreError> {
    let package_manager = PackageManager::detect(&config.base_image);
    let mut script = ScriptBuilder::new();
    script
        .from(&config.base_image)?
        .user(&config.user)?
        .run(package_manager.refresh_commands())?;

    let mut resolver = Resolver::new();
    resolver.request(config.requested_packages());
    resolver.install_plan(&config.catalog, package_manager, &mut script)?;

    for project in config.projects.iter().filter(|p| !p.image.is_empty()) {
        script.comment(&format!("project {}", project.name))?;
        for line in &project.image {
            script.line(line)?;
        }
    }
    Ok(script.seal()?)
}

pub struct LifecycleManager<'a> {
    runtime: &'a dyn ContainerRuntime,
    build_context: PathBuf,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, build_context: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            build_context: build_context.into(),
        }
    }

    pub fn build_context(&self) -> &Path {
        &self.build_context
    }

    /// Make sure the app image exists. With `rebuild`, an existing image and
    /// the container created from it are destroyed and the image is built
    /// again.
    pub fn ensure_image(
        &self,
        config: &ProvisioningConfig,
        rebuild: bool,
    ) -> Result<Ensured<ImageHandle>, CoreError> {
        let image_name = config.app.image_name();
        let existing = self.runtime.find_image(&image_name)?;

        match (decide(existing.is_some(), rebuild), existing) {
            (Action::Reuse, Some(image)) => {
                info!("reusing image {image_name} ({})", image.id);
                Ok(Ensured {
                    handle: image,
                    outcome: Outcome::Reused,
                })
            }
            (Action::Replace, Some(image)) => {
                info!("rebuilding image {image_name}");
                self.remove_dependent_container(config)?;
                self.runtime.remove_image(&image.id, true)?;
                Ok(Ensured {
                    handle: self.build(config)?,
                    outcome: Outcome::Rebuilt,
                })
            }
            _ => {
                info!("building image {image_name}");
                Ok(Ensured {
                    handle: self.build(config)?,
                    outcome: Outcome::Created,
                })
            }
        }
    }

    /// Make sure the app container exists. A new container is created from
    /// the image tagged exactly with the app image name; an existing one is
    /// only adopted or replaced when it was created from that image.
    pub fn ensure_container(
        &self,
        config: &ProvisioningConfig,
        image: &ImageHandle,
        rebuild: bool,
    ) -> Result<Ensured<ContainerHandle>, CoreError> {
        let container_name = config.app.container_name();
        let existing = self.runtime.find_container(&container_name)?;
        if let Some(container) = &existing {
            claim_container(config, container)?;
        }

        let action = decide(existing.is_some(), rebuild);
        if let (Action::Reuse, Some(container)) = (action, &existing) {
            info!("reusing container {container_name} ({})", container.id);
            return Ok(Ensured {
                handle: container.clone(),
                outcome: Outcome::Reused,
            });
        }

        let image_name = config.app.image_name();
        let Some(tag) = image.tag(&image_name) else {
            return Err(CoreError::ImageNotFound(image_name.into_inner()));
        };
        let outcome = match existing {
            Some(container) => {
                info!("recreating container {container_name}");
                self.runtime.remove_container(&container.id, true)?;
                Outcome::Rebuilt
            }
            None => Outcome::Created,
        };

        let request = RunRequest {
            image: tag.to_owned(),
            name: container_name.into_inner(),
            hostname: config.app.name().to_owned(),
            user: config.user.clone(),
            command: vec!["bash".to_owned()],
            ports: config.ports.clone(),
            tty: true,
            interactive: true,
            detach: true,
        };
        info!("starting container {} from {}", request.name, request.image);
        Ok(Ensured {
            handle: self.runtime.run_container(&request)?,
            outcome,
        })
    }

    fn remove_dependent_container(&self, config: &ProvisioningConfig) -> Result<(), CoreError> {
        let container_name = config.app.container_name();
        match self.runtime.find_container(&container_name)? {
            Some(container) => {
                claim_container(config, &container)?;
                debug!("removing container {container_name} before its image");
                self.runtime.remove_container(&container.id, true)?;
            }
            None => debug!("no container {container_name} depends on the image"),
        }
        Ok(())
    }

    fn build(&self, config: &ProvisioningConfig) -> Result<ImageHandle, CoreError> {
        let script = provisioning_script(config)?;
        std::fs::create_dir_all(&self.build_context)?;
        let file = ScriptFile::create(
            &self.build_context,
            &format!("Dockerfile.{}.", config.app.name()),
            &script,
        )?;
        debug!("provisioning script written to {}", file.path().display());

        let request = BuildRequest {
            context: self.build_context.clone(),
            script: file.path().to_path_buf(),
            tag: config.app.image_name().into_inner(),
            force_rm: true,
        };
        let built = self.runtime.build_image(&request);

        if let Err(e) = file.close() {
            warn!("failed to remove provisioning script: {e}");
        }
        Ok(built?)
    }
}

/// Fail unless `container` was created from this app's image. Apps in
/// different namespaces share a container name.
pub(crate) fn claim_container(
    config: &ProvisioningConfig,
    container: &ContainerHandle,
) -> Result<(), CoreError> {
    if config.app.owns_container_image(&container.image) {
        return Ok(());
    }
    Err(CoreError::ForeignContainer {
        container: container.name.clone(),
        image: container.image.clone(),
        expected: config.app.image_name().into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use containedenv_runtime::{MockCall, MockRuntime};
    use containedenv_schema::parse_config_str;

    fn config() -> ProvisioningConfig {
        parse_config_str(
            r#"
[app]
name = "web"
image = "ubuntu:22.04"
ports = ["8080:80"]

[[projects]]
name = "site"
requires = ["git", "python"]
image = ["WORKDIR /projects"]
"#,
        )
        .unwrap()
        .normalize(Path::new("."))
        .unwrap()
    }

    #[test]
    fn decision_table() {
        assert_eq!(decide(true, false), Action::Reuse);
        assert_eq!(decide(true, true), Action::Replace);
        assert_eq!(decide(false, false), Action::Create);
        assert_eq!(decide(false, true), Action::Create);
    }

    #[test]
    fn script_layout() {
        let text = provisioning_script(&config()).unwrap().render();
        assert!(text.starts_with("FROM ubuntu:22.04\nUSER root\nRUN DEBIAN_FRONTEND=noninteractive apt-get update -y"));
        let install = text.find("apt-get install").unwrap();
        let pip = text.find("# setting up pip").unwrap();
        let project = text.find("# project site\nWORKDIR /projects\n").unwrap();
        assert!(install < pip && pip < project);
    }

    #[test]
    fn ensure_image_builds_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new();
        let lm = LifecycleManager::new(&rt, dir.path());
        let ensured = lm.ensure_image(&config(), false).unwrap();
        assert_eq!(ensured.outcome, Outcome::Created);
        assert_eq!(ensured.handle.tag("containedenv:web"), Some("containedenv:web"));
        assert_eq!(
            rt.mutations(),
            vec![MockCall::BuildImage {
                tag: "containedenv:web".to_owned(),
                force_rm: true
            }]
        );
        assert!(rt.built_scripts()[0].starts_with("FROM ubuntu:22.04\n"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ensure_image_reuses_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new().with_image(&["containedenv:web"]);
        let existing = rt.find_image("containedenv:web").unwrap().unwrap();
        rt.clear_calls();

        let lm = LifecycleManager::new(&rt, dir.path());
        let ensured = lm.ensure_image(&config(), false).unwrap();
        assert_eq!(ensured.outcome, Outcome::Reused);
        assert_eq!(ensured.handle, existing);
        assert!(rt.mutations().is_empty());
    }

    #[test]
    fn ensure_container_runs_with_app_settings() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new().with_image(&["containedenv:web"]);
        let image = rt.find_image("containedenv:web").unwrap().unwrap();
        let lm = LifecycleManager::new(&rt, dir.path());

        let ensured = lm.ensure_container(&config(), &image, false).unwrap();
        assert_eq!(ensured.outcome, Outcome::Created);
        assert_eq!(ensured.handle.name, "web_cnt");
        let Some(MockCall::RunContainer(request)) = rt.mutations().pop() else {
            panic!("expected a run call");
        };
        assert_eq!(request.image, "containedenv:web");
        assert_eq!(request.hostname, "web");
        assert_eq!(request.command, vec!["bash"]);
        assert_eq!(request.ports.len(), 1);
        assert!(request.tty && request.interactive && request.detach);
    }

    #[test]
    fn ensure_container_requires_exact_tag() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new().with_container("web_cnt", "containedenv:web");
        let image = ImageHandle {
            id: "sha256:1".to_owned(),
            tags: vec!["containedenv:web2".to_owned()],
        };
        let lm = LifecycleManager::new(&rt, dir.path());
        let err = lm.ensure_container(&config(), &image, true).unwrap_err();
        assert!(matches!(err, CoreError::ImageNotFound(name) if name == "containedenv:web"));
        assert!(rt.mutations().is_empty());
    }

    #[test]
    fn ensure_container_replaces_on_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new()
            .with_image(&["containedenv:web"])
            .with_container("web_cnt", "containedenv:web");
        let image = rt.find_image("containedenv:web").unwrap().unwrap();
        let old = rt.find_container("web_cnt").unwrap().unwrap();
        let lm = LifecycleManager::new(&rt, dir.path());

        let ensured = lm.ensure_container(&config(), &image, true).unwrap();
        assert_eq!(ensured.outcome, Outcome::Rebuilt);
        assert_ne!(ensured.handle.id, old.id);
        let mutations = rt.mutations();
        assert_eq!(mutations.len(), 2);
        assert_eq!(
            mutations[0],
            MockCall::RemoveContainer {
                id: old.id,
                force: true
            }
        );
        assert!(matches!(mutations[1], MockCall::RunContainer(_)));
    }

    #[test]
    fn ensure_container_reuse_skips_tag_check() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new().with_container("web_cnt", "containedenv:web");
        let existing = rt.find_container("web_cnt").unwrap().unwrap();
        let untagged = ImageHandle {
            id: "sha256:1".to_owned(),
            tags: Vec::new(),
        };
        let lm = LifecycleManager::new(&rt, dir.path());
        let ensured = lm.ensure_container(&config(), &untagged, false).unwrap();
        assert_eq!(ensured.outcome, Outcome::Reused);
        assert_eq!(ensured.handle, existing);
        assert!(rt.mutations().is_empty());
    }

    #[test]
    fn ensure_container_leaves_other_apps_container_alone() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new()
            .with_image(&["containedenv:web"])
            .with_container("web_cnt", "teamb:web");
        let image = rt.find_image("containedenv:web").unwrap().unwrap();
        let lm = LifecycleManager::new(&rt, dir.path());

        for rebuild in [false, true] {
            let err = lm.ensure_container(&config(), &image, rebuild).unwrap_err();
            assert!(
                matches!(&err, CoreError::ForeignContainer { container, image, expected }
                    if container == "web_cnt" && image == "teamb:web" && expected == "containedenv:web"),
                "{err}"
            );
        }
        assert!(rt.mutations().is_empty());
    }

    #[test]
    fn image_rebuild_leaves_other_apps_container_alone() {
        let dir = tempfile::tempdir().unwrap();
        let rt = MockRuntime::new()
            .with_image(&["containedenv:web"])
            .with_container("web_cnt", "teamb:web");
        let lm = LifecycleManager::new(&rt, dir.path());
        let err = lm.ensure_image(&config(), true).unwrap_err();
        assert!(matches!(err, CoreError::ForeignContainer { .. }), "{err}");
        assert!(rt.mutations().is_empty());
        assert_eq!(rt.containers().len(), 1);
    }
}
