use crate::config::ConfigError;
use crate::types::{ContainerName, ImageName};
use serde::Serialize;

/// Namespace used for image tags when the config does not set one.
pub const DEFAULT_NAMESPACE: &str = "containedenv";

/// App identity from which every runtime object name is derived.
///
/// Names are pure functions of `(namespace, name)`. Both parts are restricted
/// to lowercase alphanumerics plus `_`, `.` and `-`, with a leading
/// alphanumeric, which is what container runtimes accept without rewriting.
/// Since neither part may contain `:`, distinct identities always map to
/// distinct image tags. The container name carries only the app name, so
/// apps in different namespaces share it; callers must check
/// `owns_container_image` before adopting or removing a container.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppIdentity {
    namespace: String,
    name: String,
}

impl AppIdentity {
    pub fn new(namespace: &str, name: &str) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyAppName);
        }
        if !is_valid_component(name) {
            return Err(ConfigError::InvalidAppName(name.to_owned()));
        }
        let namespace = namespace.trim();
        if !is_valid_component(namespace) {
            return Err(ConfigError::InvalidNamespace(namespace.to_owned()));
        }
        Ok(Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `<namespace>:<appname>`
    pub fn image_name(&self) -> ImageName {
        ImageName::new(format!("{}:{}", self.namespace, self.name))
    }

    /// `<appname>_cnt`
    pub fn container_name(&self) -> ContainerName {
        ContainerName::new(format!("{}_cnt", self.name))
    }

    /// Whether a container created from `image` belongs to this app. Podman
    /// reports locally built images with a `localhost/` registry prefix.
    pub fn owns_container_image(&self, image: &str) -> bool {
        let expected = self.image_name();
        let image = image.strip_prefix("localhost/").unwrap_or(image);
        image == expected.as_str()
    }
}

fn is_valid_component(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
}
