//! Project setup inside a running container.
//!
//! For each project, in config order: create the workspace, configure git
//! for the project's scm profile, clone every source that is not already
//! checked out, then run the project's container lines from the workspace.

use crate::CoreError;
use containedenv_runtime::{ContainerHandle, ContainerRuntime, ExecRequest};
use containedenv_schema::{Project, ProvisioningConfig, ScmProfile};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Env var carrying the credential URL into the container.
const CREDENTIALS_ENV: &str = "CONTAINEDENV_GIT_CREDENTIALS";

/// One command of a project's setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStep {
    pub project: String,
    pub request: ExecRequest,
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Checkout directory git picks for `url`.
fn checkout_dir(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last)
}

fn git_identity_steps(profile: &ScmProfile) -> Vec<ExecRequest> {
    let mut steps = vec![ExecRequest {
        command: format!(
            "git config --global user.name {} && git config --global user.email {}",
            shell_quote(&profile.user),
            shell_quote(&profile.mail)
        ),
        ..ExecRequest::default()
    }];
    if let Some(token) = &profile.token {
        steps.push(ExecRequest {
            command: format!(
                "printf '%s\\n' \"${CREDENTIALS_ENV}\" >> ~/.git-credentials && \
                 git config --global credential.helper 'store --file ~/.git-credentials'"
            ),
            env: vec![(
                CREDENTIALS_ENV.to_owned(),
                format!("https://{}:{token}@{}", profile.user, profile.host),
            )],
            ..ExecRequest::default()
        });
    }
    steps
}

fn project_steps(
    config: &ProvisioningConfig,
    project: &Project,
    configured: &mut BTreeSet<String>,
) -> Vec<ExecRequest> {
    let workspace = Some(project.workspace.clone());
    let mut steps = vec![ExecRequest {
        command: format!("mkdir -p {}", shell_quote(&project.workspace)),
        ..ExecRequest::default()
    }];

    if let (Some(name), Some(profile)) = (&project.scm_profile, config.scm_profile(project)) {
        if configured.insert(name.clone()) {
            steps.extend(git_identity_steps(profile));
        }
    }

    for source in &project.sources {
        steps.push(ExecRequest {
            command: format!(
                "[ -d {dir} ] || git clone {url}",
                dir = shell_quote(checkout_dir(source)),
                url = shell_quote(source)
            ),
            workdir: workspace.clone(),
            ..ExecRequest::default()
        });
    }

    for line in &project.container {
        steps.push(ExecRequest {
            command: line.clone(),
            workdir: workspace.clone(),
            ..ExecRequest::default()
        });
    }
    steps
}

/// Every setup command for `config`, in execution order. Git identity for a
/// given scm profile is configured once, by the first project using it.
pub fn setup_steps(config: &ProvisioningConfig) -> Vec<SetupStep> {
    let mut configured = BTreeSet::new();
    config
        .projects
        .iter()
        .flat_map(|project| {
            project_steps(config, project, &mut configured)
                .into_iter()
                .map(|request| SetupStep {
                    project: project.name.clone(),
                    request,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Run every setup step in `container`, stopping at the first failure.
/// Returns the number of commands run.
pub fn run_setup(
    runtime: &dyn ContainerRuntime,
    container: &ContainerHandle,
    config: &ProvisioningConfig,
) -> Result<usize, CoreError> {
    let steps = setup_steps(config);
    for step in &steps {
        // Env values may hold credentials; only the command is logged.
        debug!("[{}] {}", step.project, step.request.command);
        let output = runtime.exec(container, &step.request)?;
        if !output.success() {
            return Err(CoreError::SetupFailed {
                project: step.project.clone(),
                command: step.request.command.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            });
        }
    }
    info!("ran {} setup commands in {}", steps.len(), container.name);
    Ok(steps.len())
}
