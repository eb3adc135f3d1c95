//! Package dependency resolution.
//!
//! Requests accumulate in a [`Resolver`]; [`Resolver::resolve`] turns every
//! pending request into an [`InstallPlan`] and records the expanded names as
//! installed so later plans in the same run never emit them again. Applying
//! a plan to a [`ScriptBuilder`] is a separate step.

use crate::pkgmgr::PackageManager;
use crate::script::{ScriptBuilder, ScriptError};
use crate::special::SpecialPackage;
use crate::CoreError;
use containedenv_schema::PackageCatalog;
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("package dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("catalog entry '{0}' shadows the special package of the same name")]
    ShadowsSpecialPackage(String),
}

/// Script contribution of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogContribution {
    pub package: String,
    pub fragment: Option<String>,
    pub lines: Vec<String>,
}

/// Install actions for one resolution, in emission order: plain packages in
/// a single install command, then special bootstraps in request order, then
/// catalog fragments and lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallPlan {
    pub plain: BTreeSet<String>,
    pub special: Vec<SpecialPackage>,
    pub contributions: Vec<CatalogContribution>,
}

impl InstallPlan {
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.special.is_empty() && self.contributions.is_empty()
    }

    pub fn apply(
        &self,
        package_manager: PackageManager,
        script: &mut ScriptBuilder,
    ) -> Result<(), ScriptError> {
        let plain: Vec<&str> = self.plain.iter().map(String::as_str).collect();
        if let Some(install) = package_manager.install_command(&plain) {
            script.comment("install all projects packages")?.run([install])?;
        }
        for special in &self.special {
            special.bootstrap(script)?;
        }
        for contribution in &self.contributions {
            script.comment(&format!("package {}", contribution.package))?;
            if let Some(fragment) = &contribution.fragment {
                for line in fragment.lines() {
                    script.line(line)?;
                }
            }
            for line in &contribution.lines {
                script.line(line)?;
            }
        }
        Ok(())
    }
}

/// Per-run resolver state. Build a fresh one for every provisioning run.
#[derive(Debug, Default)]
pub struct Resolver {
    to_install: IndexSet<String>,
    installed: HashSet<String>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `names` for installation. Names already installed in this run
    /// and names already pending are ignored.
    pub fn request<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || self.installed.contains(name) {
                continue;
            }
            self.to_install.insert(name.to_owned());
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.to_install.iter().map(String::as_str)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Expand every pending request against `catalog`. On success the
    /// pending set is emptied and every expanded name is marked installed;
    /// on failure the resolver is left untouched.
    pub fn resolve(&mut self, catalog: &PackageCatalog) -> Result<InstallPlan, ResolveError> {
        if let Some(entry) = catalog
            .iter()
            .find(|e| SpecialPackage::from_name(&e.name).is_some())
        {
            return Err(ResolveError::ShadowsSpecialPackage(entry.name.clone()));
        }

        let mut expansion = Expansion {
            catalog,
            installed: &self.installed,
            visited: HashSet::new(),
            stack: Vec::new(),
            plan: InstallPlan::default(),
        };
        for name in &self.to_install {
            expansion.visit(name)?;
        }
        let Expansion { visited, plan, .. } = expansion;

        debug!(
            "resolved install plan: {} plain, {} special, {} catalog",
            plan.plain.len(),
            plan.special.len(),
            plan.contributions.len()
        );
        self.installed.extend(visited);
        self.to_install.clear();
        Ok(plan)
    }

    /// Resolve and emit the plan into `script`.
    pub fn install_plan(
        &mut self,
        catalog: &PackageCatalog,
        package_manager: PackageManager,
        script: &mut ScriptBuilder,
    ) -> Result<InstallPlan, CoreError> {
        let plan = self.resolve(catalog)?;
        plan.apply(package_manager, script)?;
        Ok(plan)
    }
}

struct Expansion<'a> {
    catalog: &'a PackageCatalog,
    installed: &'a HashSet<String>,
    visited: HashSet<String>,
    stack: Vec<String>,
    plan: InstallPlan,
}

impl Expansion<'_> {
    fn visit(&mut self, name: &str) -> Result<(), ResolveError> {
        if self.installed.contains(name) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut cycle = self.stack[pos..].to_vec();
            cycle.push(name.to_owned());
            return Err(ResolveError::DependencyCycle(cycle));
        }
        if self.visited.contains(name) {
            return Ok(());
        }

        if let Some(special) = SpecialPackage::from_name(name) {
            self.visited.insert(name.to_owned());
            self.plan.special.push(special);
            // Dependencies may themselves be catalog entries.
            for dep in special.dependencies() {
                self.visit(dep)?;
            }
            return Ok(());
        }

        let catalog = self.catalog;
        if let Some(entry) = catalog.get(name) {
            self.stack.push(name.to_owned());
            for required in &entry.requires {
                self.visit(required)?;
            }
            self.stack.pop();
            self.visited.insert(name.to_owned());
            if entry.fragment.is_some() || !entry.lines.is_empty() {
                self.plan.contributions.push(CatalogContribution {
                    package: entry.name.clone(),
                    fragment: entry.fragment.clone(),
                    lines: entry.lines.clone(),
                });
            }
            return Ok(());
        }

        self.visited.insert(name.to_owned());
        self.plan.plain.insert(name.to_owned());
        Ok(())
    }
}
