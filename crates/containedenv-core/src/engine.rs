use crate::lifecycle::{claim_container, provisioning_script, LifecycleManager, Outcome};
use crate::script::Script;
use crate::setup::run_setup;
use crate::CoreError;
use containedenv_runtime::{ContainerHandle, ContainerRuntime, ImageHandle};
use containedenv_schema::{ContainerName, ImageName, ProvisioningConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Entry point for provisioning runs against one container runtime.
///
/// Every operation is synchronous and sequential; the engine holds no state
/// between calls beyond the runtime reference and the build context.
pub struct Engine<'a> {
    runtime: &'a dyn ContainerRuntime,
    build_context: PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpOptions {
    /// Destroy and recreate an existing image and container.
    pub rebuild: bool,
    /// Run project setup in the container afterwards.
    pub setup: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpReport {
    pub image: ImageHandle,
    pub image_outcome: Outcome,
    pub container: ContainerHandle,
    pub container_outcome: Outcome,
    pub enter_hint: String,
    pub setup_commands: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownReport {
    pub container_removed: bool,
    pub image_removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub image_name: ImageName,
    pub container_name: ContainerName,
    pub image: Option<ImageHandle>,
    pub container: Option<ContainerHandle>,
}

impl<'a> Engine<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, build_context: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            build_context: build_context.into(),
        }
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime
    }

    /// The provisioning script `up` would build, without touching the runtime.
    pub fn plan(&self, config: &ProvisioningConfig) -> Result<Script, CoreError> {
        provisioning_script(config)
    }

    pub fn up(&self, config: &ProvisioningConfig, options: UpOptions) -> Result<UpReport, CoreError> {
        info!(
            "provisioning {} (rebuild: {}, setup: {})",
            config.app.name(),
            options.rebuild,
            options.setup
        );
        let lifecycle = LifecycleManager::new(self.runtime, self.build_context.clone());
        let image = lifecycle.ensure_image(config, options.rebuild)?;
        let container = lifecycle.ensure_container(config, &image.handle, options.rebuild)?;

        let setup_commands = if options.setup {
            run_setup(self.runtime, &container.handle, config)?
        } else {
            debug!("project setup skipped");
            0
        };

        Ok(UpReport {
            enter_hint: self.runtime.enter_hint(&container.handle.name),
            image: image.handle,
            image_outcome: image.outcome,
            container: container.handle,
            container_outcome: container.outcome,
            setup_commands,
        })
    }

    /// Run project setup in the existing app container.
    pub fn setup(&self, config: &ProvisioningConfig) -> Result<usize, CoreError> {
        let container_name = config.app.container_name();
        let container = self
            .runtime
            .find_container(&container_name)?
            .ok_or_else(|| CoreError::ContainerNotFound(container_name.into_inner()))?;
        claim_container(config, &container)?;
        run_setup(self.runtime, &container, config)
    }

    /// Remove the app container, then its image. Objects that are already
    /// gone are skipped; a container of another app is left alone.
    pub fn down(&self, config: &ProvisioningConfig) -> Result<DownReport, CoreError> {
        let mut report = DownReport::default();

        let container_name = config.app.container_name();
        if let Some(container) = self.runtime.find_container(&container_name)? {
            claim_container(config, &container)?;
            info!("removing container {container_name}");
            self.runtime.remove_container(&container.id, true)?;
            report.container_removed = true;
        }

        let image_name = config.app.image_name();
        if let Some(image) = self.runtime.find_image(&image_name)? {
            info!("removing image {image_name}");
            self.runtime.remove_image(&image.id, true)?;
            report.image_removed = true;
        }
        Ok(report)
    }

    pub fn status(&self, config: &ProvisioningConfig) -> Result<StatusReport, CoreError> {
        let image_name = config.app.image_name();
        let container_name = config.app.container_name();
        Ok(StatusReport {
            image: self.runtime.find_image(&image_name)?,
            container: self.runtime.find_container(&container_name)?,
            image_name,
            container_name,
        })
    }
}
