use crate::backend::{
    BuildRequest, ContainerHandle, ContainerRuntime, ExecOutput, ExecRequest, ImageHandle,
    RunRequest,
};
use crate::RuntimeError;
use serde::Deserialize;
use std::process::{Command, Output};
use tracing::{debug, trace};

/// Runtime adapter that shells out to a docker-compatible CLI.
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn output(&self, args: &[String]) -> Result<Output, RuntimeError> {
        self.output_with_env(args, &[])
    }

    /// Values in `env` reach the child through its environment only, never
    /// through argv or the trace log.
    fn output_with_env(
        &self,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Output, RuntimeError> {
        trace!("{} {}", self.binary, args.join(" "));
        Command::new(&self.binary)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::BackendUnavailable(self.binary.clone())
                } else {
                    RuntimeError::Io(e)
                }
            })
    }

    fn checked(&self, op: &'static str, target: &str, args: &[String]) -> Result<Output, RuntimeError> {
        let output = self.output(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(RuntimeError::CommandFailed {
                op,
                target: target.to_owned(),
                message: stderr_summary(&output),
            })
        }
    }
}

impl ContainerRuntime for DockerCli {
    fn name(&self) -> &str {
        &self.binary
    }

    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn find_image(&self, name: &str) -> Result<Option<ImageHandle>, RuntimeError> {
        let args = strings(&["image", "inspect", name]);
        let output = self.output(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                debug!("image {name} not found");
                return Ok(None);
            }
            return Err(RuntimeError::CommandFailed {
                op: "image inspect",
                target: name.to_owned(),
                message: stderr_summary(&output),
            });
        }
        parse_image_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>, RuntimeError> {
        let args = strings(&["container", "inspect", name]);
        let output = self.output(&args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                debug!("container {name} not found");
                return Ok(None);
            }
            return Err(RuntimeError::CommandFailed {
                op: "container inspect",
                target: name.to_owned(),
                message: stderr_summary(&output),
            });
        }
        parse_container_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    fn build_image(&self, request: &BuildRequest) -> Result<ImageHandle, RuntimeError> {
        self.checked("build", &request.tag, &build_args(request))?;
        self.find_image(&request.tag)?
            .ok_or_else(|| RuntimeError::ImageNotFound(request.tag.clone()))
    }

    fn remove_image(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut args = strings(&["image", "rm"]);
        if force {
            args.push("--force".to_owned());
        }
        args.push(id.to_owned());
        self.checked("image rm", id, &args)?;
        Ok(())
    }

    fn run_container(&self, request: &RunRequest) -> Result<ContainerHandle, RuntimeError> {
        self.checked("run", &request.name, &run_args(request))?;
        self.find_container(&request.name)?
            .ok_or_else(|| RuntimeError::ContainerNotFound(request.name.clone()))
    }

    fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut args = strings(&["container", "rm"]);
        if force {
            args.push("--force".to_owned());
        }
        args.push(id.to_owned());
        self.checked("container rm", id, &args)?;
        Ok(())
    }

    fn exec(
        &self,
        container: &ContainerHandle,
        request: &ExecRequest,
    ) -> Result<ExecOutput, RuntimeError> {
        let output = self.output_with_env(&exec_args(&container.name, request), &request.env)?;
        Ok(ExecOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

/// Last non-empty stderr line, or the exit status if stderr is empty.
fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map_or_else(|| format!("exited with {}", output.status), str::to_owned)
}

/// Whether an inspect failure means "no such object" rather than a runtime
/// fault. Docker says "No such image/container/object", podman says
/// "... not known" or "no such ...".
pub fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such image")
        || lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("not known")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageInspect {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    name: String,
    #[serde(default)]
    config: Option<ContainerConfig>,
    #[serde(default)]
    state: Option<ContainerState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerConfig {
    #[serde(default)]
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    #[serde(default)]
    running: bool,
}

pub fn parse_image_inspect(stdout: &str) -> Result<Option<ImageHandle>, RuntimeError> {
    let entries: Vec<ImageInspect> =
        serde_json::from_str(stdout).map_err(|e| RuntimeError::MalformedOutput {
            op: "image inspect",
            message: e.to_string(),
        })?;
    Ok(entries.into_iter().next().map(|e| ImageHandle {
        id: e.id,
        tags: e.repo_tags.unwrap_or_default(),
    }))
}

pub fn parse_container_inspect(stdout: &str) -> Result<Option<ContainerHandle>, RuntimeError> {
    let entries: Vec<ContainerInspect> =
        serde_json::from_str(stdout).map_err(|e| RuntimeError::MalformedOutput {
            op: "container inspect",
            message: e.to_string(),
        })?;
    Ok(entries.into_iter().next().map(|e| ContainerHandle {
        id: e.id,
        name: e.name.trim_start_matches('/').to_owned(),
        image: e.config.map(|c| c.image).unwrap_or_default(),
        running: e.state.is_some_and(|s| s.running),
    }))
}

pub fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec!["build".to_owned(), "--rm".to_owned()];
    if request.force_rm {
        args.push("--force-rm".to_owned());
    }
    args.push("--file".to_owned());
    args.push(request.script.to_string_lossy().into_owned());
    args.push("--tag".to_owned());
    args.push(request.tag.clone());
    args.push(request.context.to_string_lossy().into_owned());
    args
}

pub fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = vec!["run".to_owned()];
    if request.detach {
        args.push("--detach".to_owned());
    }
    if request.interactive {
        args.push("--interactive".to_owned());
    }
    if request.tty {
        args.push("--tty".to_owned());
    }
    args.extend([
        "--name".to_owned(),
        request.name.clone(),
        "--hostname".to_owned(),
        request.hostname.clone(),
        "--user".to_owned(),
        request.user.clone(),
    ]);
    for port in &request.ports {
        args.push("--publish".to_owned());
        args.push(port.to_string());
    }
    args.push(request.image.clone());
    args.extend(request.command.iter().cloned());
    args
}

/// `--env` entries carry names only; values come from the child environment.
pub fn exec_args(container: &str, request: &ExecRequest) -> Vec<String> {
    let mut args = vec!["exec".to_owned()];
    if let Some(dir) = &request.workdir {
        args.push("--workdir".to_owned());
        args.push(dir.clone());
    }
    if let Some(user) = &request.user {
        args.push("--user".to_owned());
        args.push(user.clone());
    }
    for (k, _) in &request.env {
        args.push("--env".to_owned());
        args.push(k.clone());
    }
    args.extend([
        container.to_owned(),
        "bash".to_owned(),
        "-lc".to_owned(),
        request.command.clone(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use containedenv_schema::PortMapping;
    use std::path::PathBuf;

    #[test]
    fn parses_docker_image_inspect() {
        let out = r#"[{"Id":"sha256:abc","RepoTags":["containedenv:web","other:latest"],"Size":12}]"#;
        let image = parse_image_inspect(out).unwrap().unwrap();
        assert_eq!(image.id, "sha256:abc");
        assert_eq!(image.tags, vec!["containedenv:web", "other:latest"]);
    }

    #[test]
    fn parses_untagged_image() {
        let out = r#"[{"Id":"sha256:abc","RepoTags":null}]"#;
        let image = parse_image_inspect(out).unwrap().unwrap();
        assert!(image.tags.is_empty());
    }

    #[test]
    fn empty_inspect_array_is_absent() {
        assert!(parse_image_inspect("[]").unwrap().is_none());
        assert!(parse_container_inspect("[]").unwrap().is_none());
    }

    #[test]
    fn parses_container_inspect() {
        let out = r#"[{"Id":"f00","Name":"/web_cnt","Config":{"Image":"containedenv:web"},"State":{"Running":true}}]"#;
        let cnt = parse_container_inspect(out).unwrap().unwrap();
        assert_eq!(cnt.id, "f00");
        assert_eq!(cnt.name, "web_cnt");
        assert_eq!(cnt.image, "containedenv:web");
        assert!(cnt.running);
    }

    #[test]
    fn malformed_inspect_output_is_an_error() {
        assert!(matches!(
            parse_image_inspect("not json"),
            Err(RuntimeError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn not_found_detection() {
        assert!(is_not_found("Error: No such image: containedenv:web"));
        assert!(is_not_found("Error response from daemon: No such container: web_cnt"));
        assert!(is_not_found("Error: containedenv:web: image not known"));
        assert!(!is_not_found(
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock"
        ));
        assert!(!is_not_found("permission denied while trying to connect"));
    }

    #[test]
    fn build_args_force_intermediate_removal() {
        let args = build_args(&BuildRequest {
            context: PathBuf::from("/ctx"),
            script: PathBuf::from("/ctx/Dockerfile.web"),
            tag: "containedenv:web".to_owned(),
            force_rm: true,
        });
        assert_eq!(
            args,
            vec![
                "build",
                "--rm",
                "--force-rm",
                "--file",
                "/ctx/Dockerfile.web",
                "--tag",
                "containedenv:web",
                "/ctx"
            ]
        );
    }

    #[test]
    fn run_args_include_ports_and_flags() {
        let args = run_args(&RunRequest {
            image: "containedenv:web".to_owned(),
            name: "web_cnt".to_owned(),
            hostname: "web".to_owned(),
            user: "dev".to_owned(),
            command: vec!["bash".to_owned()],
            ports: vec![
                PortMapping { host: 8080, container: 80 },
                PortMapping { host: 2222, container: 22 },
            ],
            tty: true,
            interactive: true,
            detach: true,
        });
        let joined = args.join(" ");
        assert!(joined.starts_with("run --detach --interactive --tty"));
        assert!(joined.contains("--name web_cnt --hostname web --user dev"));
        assert!(joined.contains("--publish 8080:80 --publish 2222:22"));
        assert!(joined.ends_with("containedenv:web bash"));
    }

    #[test]
    fn exec_args_wrap_command_in_login_shell() {
        let args = exec_args(
            "web_cnt",
            &ExecRequest {
                command: "git clone x".to_owned(),
                workdir: Some("/projects".to_owned()),
                user: None,
                env: vec![("GIT_TERMINAL_PROMPT".to_owned(), "0".to_owned())],
            },
        );
        assert_eq!(
            args,
            vec![
                "exec",
                "--workdir",
                "/projects",
                "--env",
                "GIT_TERMINAL_PROMPT",
                "web_cnt",
                "bash",
                "-lc",
                "git clone x"
            ]
        );
    }

    #[test]
    fn missing_binary_is_backend_unavailable() {
        let rt = DockerCli::new("containedenv-no-such-binary");
        assert!(!rt.available());
        assert!(matches!(
            rt.find_image("x"),
            Err(RuntimeError::BackendUnavailable(_))
        ));
    }
}
