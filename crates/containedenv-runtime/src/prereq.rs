use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn daemon_reachable(binary: &str) -> bool {
    Command::new(binary)
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check prerequisites for a docker-compatible runtime binary.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_runtime_prereqs(binary: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if binary == "mock" {
        return missing;
    }

    if !command_exists(binary) {
        missing.push(MissingPrereq {
            name: binary.to_owned(),
            purpose: "building images and running containers",
            install_hint: "apt install docker.io | dnf install podman | pacman -S docker",
        });
    } else if !daemon_reachable(binary) {
        missing.push(MissingPrereq {
            name: format!("{binary} daemon"),
            purpose: "talking to the container engine",
            install_hint: "start the service (systemctl start docker) or join the docker group",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\ncontainedenv needs a container runtime to build development images.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "docker".to_owned(),
            purpose: "building images",
            install_hint: "apt install docker.io",
        };
        let s = format!("{m}");
        assert!(s.contains("docker"));
        assert!(s.contains("building images"));
        assert!(s.contains("apt install docker.io"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "docker".to_owned(),
                purpose: "images",
                install_hint: "apt install docker.io",
            },
            MissingPrereq {
                name: "docker daemon".to_owned(),
                purpose: "engine",
                install_hint: "systemctl start docker",
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("docker daemon"));
    }

    #[test]
    fn mock_runtime_needs_nothing() {
        assert!(check_runtime_prereqs("mock").is_empty());
    }

    #[test]
    fn unknown_binary_is_reported() {
        let missing = check_runtime_prereqs("containedenv-no-such-binary");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "containedenv-no-such-binary");
    }
}
