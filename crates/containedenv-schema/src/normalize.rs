use crate::catalog::{clean_list, PackageCatalog};
use crate::config::{ConfigError, ConfigV1, ProjectSection, ScmProfileSection};
use crate::identity::AppIdentity;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Fully validated provisioning configuration. Loaded once per run and
/// read-only thereafter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub app: AppIdentity,
    pub user: String,
    pub base_image: String,
    pub ports: Vec<PortMapping>,
    pub runtime_backend: String,
    pub catalog: PackageCatalog,
    pub projects: Vec<Project>,
    pub scm_profiles: BTreeMap<String, ScmProfile>,
}

/// A host-to-container TCP port publication.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    /// Parse a `"hostPort:containerPort"` entry.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPort(spec.to_owned());
        let (host, container) = spec.split_once(':').ok_or_else(invalid)?;
        let host = host.trim().parse::<u16>().map_err(|_| invalid())?;
        let container = container.trim().parse::<u16>().map_err(|_| invalid())?;
        if host == 0 || container == 0 {
            return Err(invalid());
        }
        Ok(Self { host, container })
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub scm_profile: Option<String>,
    pub workspace: String,
    pub requires: Vec<String>,
    /// Literal script lines appended after all package installation.
    pub image: Vec<String>,
    pub sources: Vec<String>,
    /// Shell lines run inside the started container.
    pub container: Vec<String>,
}

#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct ScmProfile {
    pub user: String,
    pub mail: String,
    pub host: String,
    #[serde(skip)]
    pub token: Option<String>,
}

impl fmt::Debug for ScmProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScmProfile")
            .field("user", &self.user)
            .field("mail", &self.mail)
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConfigV1 {
    /// Validate every section and produce the typed configuration tree.
    pub fn normalize(&self, base_dir: &Path) -> Result<ProvisioningConfig, ConfigError> {
        let app = AppIdentity::new(&self.app.namespace, &self.app.name)?;

        let base_image = self.app.image.trim().to_owned();
        if base_image.is_empty() {
            return Err(ConfigError::EmptyBaseImage);
        }

        let user = self.app.user.trim().to_owned();
        if user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }

        let ports = self
            .app
            .ports
            .iter()
            .map(|p| PortMapping::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = PackageCatalog::from_sections(&self.packages, base_dir)?;

        let scm_profiles: BTreeMap<String, ScmProfile> = self
            .scm
            .iter()
            .map(|(name, p)| (name.trim().to_owned(), normalize_scm(p)))
            .collect();

        let mut seen = BTreeSet::new();
        let mut projects = Vec::with_capacity(self.projects.len());
        for section in &self.projects {
            let project = normalize_project(section, &scm_profiles)?;
            if !seen.insert(project.name.clone()) {
                return Err(ConfigError::DuplicateProject(project.name));
            }
            projects.push(project);
        }

        Ok(ProvisioningConfig {
            app,
            user,
            base_image,
            ports,
            runtime_backend: self.runtime.backend.trim().to_lowercase(),
            catalog,
            projects,
            scm_profiles,
        })
    }
}

impl ProvisioningConfig {
    /// Union of every project's `requires`, in first-seen order.
    pub fn requested_packages(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.projects
            .iter()
            .flat_map(|p| p.requires.iter())
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn scm_profile(&self, project: &Project) -> Option<&ScmProfile> {
        project
            .scm_profile
            .as_deref()
            .and_then(|name| self.scm_profiles.get(name))
    }
}

fn normalize_scm(section: &ScmProfileSection) -> ScmProfile {
    ScmProfile {
        user: section.user.trim().to_owned(),
        mail: section.mail.trim().to_owned(),
        host: section.host.trim().to_owned(),
        token: section
            .token
            .as_ref()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty()),
    }
}

fn normalize_project(
    section: &ProjectSection,
    scm_profiles: &BTreeMap<String, ScmProfile>,
) -> Result<Project, ConfigError> {
    let name = section.name.trim().to_owned();
    if name.is_empty() {
        return Err(ConfigError::EmptyProjectName);
    }

    let scm_profile = section
        .scmprofile
        .as_ref()
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty());
    if let Some(profile) = &scm_profile {
        if !scm_profiles.contains_key(profile) {
            return Err(ConfigError::UnknownScmProfile {
                project: name,
                profile: profile.clone(),
            });
        }
    }

    Ok(Project {
        scm_profile,
        workspace: section.workspace.trim().to_owned(),
        requires: clean_list(&section.requires),
        image: section.image.clone(),
        sources: clean_list(&section.sources),
        container: clean_list(&section.container),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config_str;

    fn normalize(input: &str) -> Result<ProvisioningConfig, ConfigError> {
        parse_config_str(input).unwrap().normalize(Path::new("."))
    }

    #[test]
    fn normalizes_full_config() {
        let config = normalize(
            r#"
[app]
name = "devbox"
image = " ubuntu:22.04 "
ports = ["8080:80"]

[runtime]
backend = "Docker"

[[packages]]
name = "rust"
requires = ["curl"]

[[projects]]
name = "web"
scmprofile = "github"
requires = ["git", "python"]

[[projects]]
name = "api"
requires = ["python", "rust", "git"]

[scm.github]
user = "someone"
mail = "someone@example.com"
"#,
        )
        .unwrap();

        assert_eq!(config.base_image, "ubuntu:22.04");
        assert_eq!(config.ports, vec![PortMapping { host: 8080, container: 80 }]);
        assert_eq!(config.runtime_backend, "docker");
        assert_eq!(config.catalog.len(), 1);
        assert_eq!(config.requested_packages(), vec!["git", "python", "rust"]);
        let web = &config.projects[0];
        assert_eq!(config.scm_profile(web).unwrap().user, "someone");
        assert!(config.scm_profile(&config.projects[1]).is_none());
    }

    #[test]
    fn rejects_unknown_scm_profile() {
        let err = normalize(
            r#"
[app]
name = "devbox"
image = "ubuntu:22.04"

[[projects]]
name = "web"
scmprofile = "gitlab"
"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::UnknownScmProfile { ref project, ref profile } if project == "web" && profile == "gitlab")
        );
    }

    #[test]
    fn rejects_empty_base_image() {
        let err = normalize("[app]\nname = \"devbox\"\nimage = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBaseImage));
    }

    #[test]
    fn rejects_duplicate_projects() {
        let err = normalize(
            r#"
[app]
name = "devbox"
image = "ubuntu:22.04"

[[projects]]
name = "web"

[[projects]]
name = "web"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProject(_)));
    }

    #[test]
    fn rejects_invalid_port_specs() {
        for spec in ["8080", "a:80", "8080:", "70000:80", "0:80"] {
            assert!(PortMapping::parse(spec).is_err(), "{spec} should be rejected");
        }
    }

    #[test]
    fn parses_port_spec() {
        let p = PortMapping::parse(" 8888 : 8080").unwrap();
        assert_eq!(p.host, 8888);
        assert_eq!(p.container, 8080);
        assert_eq!(p.to_string(), "8888:8080");
    }

    #[test]
    fn token_is_kept_but_never_serialized() {
        let config = normalize(
            r#"
[app]
name = "devbox"
image = "ubuntu:22.04"

[scm.github]
user = "someone"
mail = "someone@example.com"
token = "ghp_secret"
"#,
        )
        .unwrap();
        assert_eq!(config.scm_profiles["github"].token.as_deref(), Some("ghp_secret"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("ghp_secret"));
    }
}
