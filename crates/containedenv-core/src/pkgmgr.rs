use serde::Serialize;

/// Distribution package manager inferred from the base image reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Apk,
    Zypper,
    Pacman,
}

impl PackageManager {
    /// Detect from an image reference such as `ubuntu:22.04` or
    /// `docker.io/library/fedora:40`. Unknown distributions fall back to apt.
    pub fn detect(image: &str) -> Self {
        let repo = image.rsplit('/').next().unwrap_or(image);
        let repo = repo.split([':', '@']).next().unwrap_or(repo).to_lowercase();
        match repo.as_str() {
            "fedora" | "centos" | "rockylinux" | "almalinux" | "rhel" => Self::Dnf,
            "alpine" => Self::Apk,
            "opensuse" | "leap" | "tumbleweed" | "suse" => Self::Zypper,
            "archlinux" | "arch" | "manjaro" => Self::Pacman,
            _ => Self::Apt,
        }
    }

    /// Commands that refresh the package index and upgrade the base system.
    pub fn refresh_commands(self) -> Vec<String> {
        match self {
            Self::Apt => vec![
                "DEBIAN_FRONTEND=noninteractive apt-get update -y".to_owned(),
                "DEBIAN_FRONTEND=noninteractive apt-get upgrade -y".to_owned(),
            ],
            Self::Dnf => vec!["dnf upgrade -y".to_owned()],
            Self::Apk => vec!["apk update".to_owned(), "apk upgrade".to_owned()],
            Self::Zypper => vec![
                "zypper --non-interactive refresh".to_owned(),
                "zypper --non-interactive update".to_owned(),
            ],
            Self::Pacman => vec!["pacman -Syu --noconfirm".to_owned()],
        }
    }

    fn install_prefix(self) -> &'static str {
        match self {
            Self::Apt => "DEBIAN_FRONTEND=noninteractive apt-get install -y",
            Self::Dnf => "dnf install -y",
            Self::Apk => "apk add --no-cache",
            Self::Zypper => "zypper --non-interactive install",
            Self::Pacman => "pacman -S --noconfirm --needed",
        }
    }

    /// A single install command for `packages`: `None` when empty, the
    /// package inline when there is one, one package per continuation line
    /// otherwise.
    pub fn install_command<S: AsRef<str>>(self, packages: &[S]) -> Option<String> {
        let prefix = self.install_prefix();
        match packages {
            [] => None,
            [one] => Some(format!("{prefix} {}", one.as_ref())),
            many => {
                let list: Vec<&str> = many.iter().map(|p| p.as_ref()).collect();
                Some(format!("{prefix} \\\n\t{}", list.join(" \\\n\t")))
            }
        }
    }
}
