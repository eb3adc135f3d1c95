use crate::config::{ConfigError, PackageSection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A validated catalog entry. Immutable once loaded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub requires: Vec<String>,
    pub fragment: Option<String>,
    pub lines: Vec<String>,
}

/// Package catalog keyed by entry name.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PackageCatalog {
    entries: BTreeMap<String, PackageEntry>,
}

impl PackageCatalog {
    /// Build the catalog from raw sections. Duplicate names are rejected
    /// rather than letting the last declaration win.
    pub fn from_sections(sections: &[PackageSection], base_dir: &Path) -> Result<Self, ConfigError> {
        let mut entries = BTreeMap::new();
        for section in sections {
            let entry = normalize_entry(section, base_dir)?;
            if entries.contains_key(&entry.name) {
                return Err(ConfigError::DuplicatePackage(entry.name));
            }
            entries.insert(entry.name.clone(), entry);
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = PackageEntry>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if map.contains_key(&entry.name) {
                return Err(ConfigError::DuplicatePackage(entry.name));
            }
            map.insert(entry.name.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageEntry> {
        self.entries.values()
    }
}

fn normalize_entry(section: &PackageSection, base_dir: &Path) -> Result<PackageEntry, ConfigError> {
    let name = section.name.trim().to_owned();
    if name.is_empty() {
        return Err(ConfigError::EmptyPackageName);
    }

    let fragment = match (&section.script, &section.script_file) {
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingScript(name)),
        (Some(script), None) => Some(script.clone()),
        (None, Some(file)) => {
            let path = base_dir.join(file);
            let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ScriptFile {
                package: name.clone(),
                path: path.display().to_string(),
                source,
            })?;
            Some(content)
        }
        (None, None) => None,
    };

    Ok(PackageEntry {
        requires: clean_list(&section.requires),
        fragment: fragment.filter(|f| !f.trim().is_empty()),
        lines: section.image.clone(),
        name,
    })
}

/// Trim and drop blanks, keeping declaration order.
pub(crate) fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect()
}
