use crate::identity::DEFAULT_NAMESPACE;
use crate::normalize::ProvisioningConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Conventional config file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "containedenv.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("app.name must not be empty")]
    EmptyAppName,
    #[error("invalid app.name '{0}': expected lowercase [a-z0-9][a-z0-9_.-]*")]
    InvalidAppName(String),
    #[error("invalid app.namespace '{0}': expected lowercase [a-z0-9][a-z0-9_.-]*")]
    InvalidNamespace(String),
    #[error("app.image must not be empty")]
    EmptyBaseImage,
    #[error("app.user must not be empty")]
    EmptyUser,
    #[error("invalid port mapping '{0}', expected '<hostPort>:<containerPort>'")]
    InvalidPort(String),
    #[error("package name must not be empty")]
    EmptyPackageName,
    #[error("package '{0}' is declared more than once")]
    DuplicatePackage(String),
    #[error("failed to read script_file '{path}' of package '{package}': {source}")]
    ScriptFile {
        package: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("package '{0}' sets both script and script_file")]
    ConflictingScript(String),
    #[error("project name must not be empty")]
    EmptyProjectName,
    #[error("project '{0}' is declared more than once")]
    DuplicateProject(String),
    #[error("project '{project}' references unknown scm profile '{profile}'")]
    UnknownScmProfile { project: String, profile: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigV1 {
    pub app: AppSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub packages: Vec<PackageSection>,
    #[serde(default)]
    pub projects: Vec<ProjectSection>,
    #[serde(default)]
    pub scm: BTreeMap<String, ScmProfileSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppSection {
    pub name: String,
    pub image: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// A catalog entry: a name projects can list in `requires`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    /// Names this entry expands to: other catalog entries, special packages,
    /// or plain package-manager packages.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Script fragment appended verbatim after package installation.
    #[serde(default)]
    pub script: Option<String>,
    /// Same as `script`, read from a file relative to the config file.
    #[serde(default)]
    pub script_file: Option<String>,
    /// Literal script lines appended after the fragment.
    #[serde(default)]
    pub image: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    #[serde(default)]
    pub scmprofile: Option<String>,
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub container: Vec<String>,
}

#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScmProfileSection {
    pub user: String,
    pub mail: String,
    #[serde(default = "default_scm_host")]
    pub host: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for ScmProfileSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScmProfileSection")
            .field("user", &self.user)
            .field("mail", &self.mail)
            .field("host", &self.host)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_user() -> String {
    "root".to_owned()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

fn default_backend() -> String {
    "docker".to_owned()
}

fn default_scm_host() -> String {
    "github.com".to_owned()
}

fn default_workspace() -> String {
    "/projects".to_owned()
}

pub fn parse_config_str(input: &str) -> Result<ConfigV1, ConfigError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ConfigV1, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse and validate a config file in one step. Relative `script_file`
/// paths resolve against the config file's directory.
pub fn load_config(path: impl AsRef<Path>) -> Result<ProvisioningConfig, ConfigError> {
    let path = path.as_ref();
    let raw = parse_config_file(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    raw.normalize(base_dir)
}
