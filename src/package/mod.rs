//! Package descriptor: modules, dependency edges and pinned versions.
//!
//! The descriptor is built from the port file and validated before any
//! native build starts and again at assembly time. Its JSON form
//! (`manifest.json`) depends only on configuration, so two runs with the
//! same port file produce byte-identical manifests.

mod assemble;
mod prefab;

pub use assemble::{assemble, AssembledPackage, AssemblyOptions};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::PortConfig;
use crate::error::PipelineError;

/// A reference from a module to something it links against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyRef {
    /// Another module of the same package (`:rutil`).
    Internal(String),
    /// A component of an external package (`//openssl:crypto`).
    External { package: String, component: String },
}

impl FromStr for DependencyRef {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::InvalidConfig(format!("malformed dependency reference '{}'", s));

        if let Some(rest) = s.strip_prefix("//") {
            let (package, component) = rest.split_once(':').ok_or_else(invalid)?;
            if package.is_empty() || component.is_empty() || component.contains(':') {
                return Err(invalid());
            }
            return Ok(DependencyRef::External {
                package: package.to_string(),
                component: component.to_string(),
            });
        }

        let name = s.strip_prefix(':').unwrap_or(s);
        if name.is_empty() || name.contains(':') || name.contains('/') {
            return Err(invalid());
        }
        Ok(DependencyRef::Internal(name.to_string()))
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRef::Internal(name) => write!(f, ":{}", name),
            DependencyRef::External { package, component } => {
                write!(f, "//{}:{}", package, component)
            }
        }
    }
}

impl Serialize for DependencyRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DependencyRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub dependencies: Vec<DependencyRef>,
    /// File name of the shared library, e.g. `librutil.so`.
    pub library: String,
}

impl Module {
    pub fn external_dependencies(&self) -> impl Iterator<Item = &DependencyRef> {
        self.dependencies
            .iter()
            .filter(|d| matches!(d, DependencyRef::External { .. }))
    }
}

/// A CMake-compatible version: one to four dot-separated integers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortVersion(Vec<u32>);

impl PortVersion {
    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for PortVersion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            PipelineError::InvalidConfig(format!(
                "version '{}' is not CMake compatible ({})",
                s, why
            ))
        };
        let parts = s
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid("non-numeric component")))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.len() > 4 {
            return Err(invalid("more than four components"));
        }
        Ok(PortVersion(parts))
    }
}

impl fmt::Display for PortVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

impl Serialize for PortVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: PortVersion,
    /// License file, relative to the source tree.
    pub license: PathBuf,
    /// External package -> pinned version.
    pub dependencies: BTreeMap<String, String>,
    pub modules: Vec<Module>,
}

impl PackageDescriptor {
    /// Build (without validating) the descriptor described by the port file.
    pub fn from_port(port: &PortConfig) -> Result<Self, PipelineError> {
        let modules = port
            .modules
            .iter()
            .map(|m| {
                let dependencies = m
                    .dependencies
                    .iter()
                    .map(|d| d.parse())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Module {
                    name: m.name.clone(),
                    library: m
                        .library
                        .clone()
                        .unwrap_or_else(|| format!("lib{}.so", m.name)),
                    dependencies,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            name: port.package.name.clone(),
            version: port.package.version.parse()?,
            license: port.package.license.clone(),
            dependencies: port.dependencies.clone(),
            modules,
        })
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Check that every reference resolves and internal edges are acyclic.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.modules.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "package '{}' declares no modules",
                self.name
            )));
        }

        let mut names = BTreeSet::new();
        for module in &self.modules {
            if !names.insert(module.name.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "module '{}' is declared twice",
                    module.name
                )));
            }
        }

        for module in &self.modules {
            for dep in &module.dependencies {
                let resolved = match dep {
                    DependencyRef::Internal(name) => names.contains(name.as_str()),
                    DependencyRef::External { package, .. } => {
                        self.dependencies.contains_key(package)
                    }
                };
                if !resolved {
                    return Err(PipelineError::UnresolvedModuleDependency {
                        module: module.name.clone(),
                        reference: dep.to_string(),
                    });
                }
            }
        }

        self.check_cycles()
    }

    fn check_cycles(&self) -> Result<(), PipelineError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit<'a>(
            desc: &'a PackageDescriptor,
            name: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<(), PipelineError> {
            match marks.get(name).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(name.to_string());
                    return Err(PipelineError::DependencyCycle { cycle });
                }
                Mark::Unvisited => {}
            }

            marks.insert(name, Mark::InProgress);
            stack.push(name);
            if let Some(module) = desc.module(name) {
                for dep in &module.dependencies {
                    if let DependencyRef::Internal(next) = dep {
                        visit(desc, next, marks, stack)?;
                    }
                }
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for module in &self.modules {
            visit(self, &module.name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Deterministic manifest JSON.
    pub fn to_manifest_json(&self) -> Result<String, PipelineError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::InvalidConfig(format!("cannot serialize manifest: {}", e)))?;
        json.push('\n');
        Ok(json)
    }
}
