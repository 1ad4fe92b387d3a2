//! Configuration management for ndkport.
//!
//! Two layers, resolved once into an immutable [`PipelineConfig`]:
//! - the environment (`.env` file plus process environment, the latter
//!   taking precedence) for host-specific paths such as the NDK;
//! - the port file (TOML) describing the package: version, modules,
//!   pinned dependencies, feature flags and publication metadata.
//!
//! Command-line overrides are applied last.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::flags::FeatureFlagSet;
use crate::target::{self, Abi};

/// Default port file, relative to the base directory.
pub const DEFAULT_PORT_FILE: &str = "ports/resiprocate.toml";

/// Default per-ABI build timeout.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Host configuration read from `.env` and the environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// NDK root (`NDK_PATH`, falling back to `ANDROID_NDK_HOME`).
    pub ndk_path: Option<PathBuf>,
    /// Port file (`PORT_FILE`).
    pub port_file: Option<PathBuf>,
    /// Working directory for sources, staging and logs (`WORK_DIR`).
    pub work_dir: Option<PathBuf>,
    /// Concurrent ABI builds (`JOBS`).
    pub jobs: Option<usize>,
    /// Per-ABI timeout in seconds (`BUILD_TIMEOUT`).
    pub build_timeout: Option<Duration>,
    /// Appended to the published version, e.g. `-SNAPSHOT` (`SNAPSHOT_SUFFIX`).
    pub snapshot_suffix: Option<String>,
}

impl Config {
    /// Load configuration from `<base_dir>/.env` and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut vars = BTreeMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path_iter(&env_path) {
                Ok(iter) => {
                    for (key, value) in iter.flatten() {
                        vars.insert(key, value);
                    }
                }
                Err(e) => eprintln!("  [WARN] Ignoring {}: {}", env_path.display(), e),
            }
        }

        // Environment variables override .env file
        vars.extend(std::env::vars());

        Self::from_vars(&vars, base_dir)
    }

    fn from_vars(vars: &BTreeMap<String, String>, base_dir: &Path) -> Self {
        let path = |key: &str| vars.get(key).map(|s| absolutize(base_dir, Path::new(s)));

        Self {
            ndk_path: path("NDK_PATH").or_else(|| path("ANDROID_NDK_HOME")),
            port_file: path("PORT_FILE"),
            work_dir: path("WORK_DIR"),
            jobs: vars.get("JOBS").and_then(|s| s.parse().ok()),
            build_timeout: vars
                .get("BUILD_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            snapshot_suffix: vars.get("SNAPSHOT_SUFFIX").cloned(),
        }
    }
}

// =============================================================================
// Port file
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortConfig {
    pub package: PackageSection,
    pub source: SourceSection,
    pub build: BuildSection,
    #[serde(default)]
    pub autoconf: AutoconfSection,
    #[serde(default)]
    pub cmake: CmakeSection,
    /// External package name -> pinned version.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    pub modules: Vec<ModuleConfig>,
    #[serde(default)]
    pub licenses: Vec<LicenseConfig>,
    pub publication: PublicationSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    pub group: String,
    pub version: String,
    /// License file, relative to the extracted source tree.
    pub license: PathBuf,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub snapshot: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Autoconf,
    Cmake,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Autoconf => "autoconf",
            StrategyKind::Cmake => "cmake",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub strategy: StrategyKind,
    pub min_sdk: u32,
    #[serde(default = "all_abis")]
    pub abis: Vec<Abi>,
    /// Base of the per-ABI dependency sysroots (default `<work>/sysroot`).
    #[serde(default)]
    pub sysroot: Option<PathBuf>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn all_abis() -> Vec<Abi> {
    Abi::ALL.to_vec()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutoconfSection {
    #[serde(default)]
    pub flags: Option<FeatureFlagSet>,
    /// Extra environment for configure, e.g. `CFLAGS`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CmakeSection {
    #[serde(default)]
    pub flags: Option<FeatureFlagSet>,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default = "default_build_type")]
    pub build_type: String,
}

impl Default for CmakeSection {
    fn default() -> Self {
        Self {
            flags: None,
            generator: default_generator(),
            build_type: default_build_type(),
        }
    }
}

fn default_generator() -> String {
    "Ninja".to_string()
}

fn default_build_type() -> String {
    "RelWithDebInfo".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,
    /// `:module`, `module` or `//package:component`.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Library file name override (default `lib<name>.so`).
    #[serde(default)]
    pub library: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_distribution")]
    pub distribution: String,
}

fn default_distribution() -> String {
    "repo".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicationSection {
    #[serde(default)]
    pub developers: Vec<String>,
    #[serde(default)]
    pub scm_url: String,
    #[serde(default)]
    pub scm_connection: String,
    /// Filesystem path or `file://` URL of the Maven repository.
    pub repository: String,
    /// Where the release zip is written.
    #[serde(default)]
    pub dist_dir: Option<PathBuf>,
    #[serde(default)]
    pub snapshot_suffix: String,
    /// Maven group of the external dependencies in the POM.
    #[serde(default = "default_dependency_group")]
    pub dependency_group: String,
}

fn default_dependency_group() -> String {
    "com.android.ndk.thirdparty".to_string()
}

impl PortConfig {
    pub fn from_toml(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content).map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read port file {}", path.display()))?;
        let port = Self::from_toml(&content)
            .with_context(|| format!("Invalid port file {}", path.display()))?;
        Ok(port)
    }

    /// Feature flags of the selected strategy, falling back to its defaults.
    pub fn feature_flags(&self) -> FeatureFlagSet {
        match self.build.strategy {
            StrategyKind::Autoconf => self
                .autoconf
                .flags
                .clone()
                .unwrap_or_else(FeatureFlagSet::autoconf_defaults),
            StrategyKind::Cmake => self
                .cmake
                .flags
                .clone()
                .unwrap_or_else(FeatureFlagSet::cmake_defaults),
        }
    }
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// Command-line overrides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub abis: Vec<Abi>,
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
    pub force: bool,
}

/// Everything a pipeline run needs, constructed once and passed by reference.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    pub port_file: PathBuf,
    pub port: PortConfig,
    pub ndk_path: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub snapshot: PathBuf,
    pub sysroot_dir: PathBuf,
    pub repository: String,
    pub dist_dir: PathBuf,
    pub abis: Vec<Abi>,
    /// Concurrent ABI builds.
    pub jobs: usize,
    /// Parallelism handed to make/ninja inside one ABI build.
    pub make_jobs: usize,
    pub timeout: Duration,
    pub force: bool,
    pub snapshot_suffix: String,
}

impl PipelineConfig {
    pub fn resolve(
        base_dir: &Path,
        env: &Config,
        port_file: PathBuf,
        port: PortConfig,
        overrides: &Overrides,
    ) -> Result<Self, PipelineError> {
        let work_dir = env
            .work_dir
            .clone()
            .unwrap_or_else(|| base_dir.join("build"));

        let mut abis = if overrides.abis.is_empty() {
            port.build.abis.clone()
        } else {
            overrides.abis.clone()
        };
        abis.sort();
        abis.dedup();
        if abis.is_empty() {
            return Err(PipelineError::InvalidConfig("no ABIs configured".into()));
        }

        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let jobs = overrides
            .jobs
            .or(env.jobs)
            .or(port.build.jobs)
            .unwrap_or_else(|| (cpus / 2).max(1))
            .max(1);
        let make_jobs = (cpus / jobs.min(abis.len())).max(1);

        let timeout = overrides
            .timeout
            .or(env.build_timeout)
            .or(port.build.timeout_secs.map(Duration::from_secs))
            .unwrap_or(DEFAULT_BUILD_TIMEOUT);
        if timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "build timeout must be greater than zero".into(),
            ));
        }

        let sysroot_dir = port
            .build
            .sysroot
            .as_deref()
            .map(|p| absolutize(base_dir, p))
            .unwrap_or_else(|| work_dir.join("sysroot"));

        let repository = match port.publication.repository.as_str() {
            r if r.contains("://") => r.to_string(),
            r => absolutize(base_dir, Path::new(r))
                .to_string_lossy()
                .into_owned(),
        };

        let dist_dir = port
            .publication
            .dist_dir
            .as_deref()
            .map(|p| absolutize(base_dir, p))
            .unwrap_or_else(|| work_dir.join("dist"));

        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            snapshot: absolutize(base_dir, &port.source.snapshot),
            ndk_path: env.ndk_path.clone().or_else(target::default_ndk_path),
            snapshot_suffix: env
                .snapshot_suffix
                .clone()
                .unwrap_or_else(|| port.publication.snapshot_suffix.clone()),
            port_file,
            work_dir,
            sysroot_dir,
            repository,
            dist_dir,
            abis,
            jobs,
            make_jobs,
            timeout,
            force: overrides.force,
            port,
        })
    }

    pub fn ndk_path(&self) -> Result<&Path, PipelineError> {
        self.ndk_path.as_deref().ok_or_else(|| {
            PipelineError::InvalidConfig(
                "no NDK found; set NDK_PATH (or ANDROID_NDK_HOME) in the environment or .env".into(),
            )
        })
    }

    /// Version string as published: the package version plus snapshot suffix.
    pub fn publish_version(&self) -> String {
        format!("{}{}", self.port.package.version, self.snapshot_suffix)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.work_dir.join("src")
    }

    pub fn port_dir(&self, abi: Abi) -> PathBuf {
        self.work_dir.join("port").join(abi.name())
    }

    pub fn log_path(&self, abi: Abi) -> PathBuf {
        self.work_dir.join("logs").join(format!("{}.log", abi.name()))
    }

    pub fn package_dir(&self) -> PathBuf {
        self.work_dir.join("package")
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        let port = &self.port;
        println!("Configuration:");
        println!("  Port file:    {}", self.port_file.display());
        println!(
            "  Package:      {}:{}:{}",
            port.package.group,
            port.package.name,
            self.publish_version()
        );
        println!("  Strategy:     {}", port.build.strategy.name());
        println!("  Min SDK:      {}", port.build.min_sdk);
        let abis: Vec<&str> = self.abis.iter().map(|a| a.name()).collect();
        println!("  ABIs:         {}", abis.join(", "));
        println!("  Snapshot:     {}", self.snapshot.display());
        match &self.ndk_path {
            Some(p) => println!("  NDK:          {}", p.display()),
            None => println!("  NDK:          NOT FOUND (set NDK_PATH)"),
        }
        println!("  Work dir:     {}", self.work_dir.display());
        println!("  Sysroots:     {}", self.sysroot_dir.display());
        println!("  Repository:   {}", self.repository);
        println!("  Dist dir:     {}", self.dist_dir.display());
        println!("  Jobs:         {} (make -j{})", self.jobs, self.make_jobs);
        println!("  Timeout:      {}s per ABI", self.timeout.as_secs());
        for (name, version) in &port.dependencies {
            println!("  Depends on:   {} {}", name, version);
        }
    }
}

fn absolutize(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const MINIMAL_PORT: &str = r#"
        [package]
        name = "resiprocate"
        group = "org.resiprocate"
        version = "1.13.0"
        license = "COPYING"

        [source]
        snapshot = "snapshot.tar.gz"

        [build]
        strategy = "autoconf"
        min_sdk = 16

        [dependencies]
        openssl = "1.1.1k"

        [[modules]]
        name = "rutil"
        dependencies = ["//openssl:crypto", "//openssl:ssl"]

        [publication]
        repository = "out/repository"
    "#;

    #[test]
    fn test_port_defaults() {
        let port = PortConfig::from_toml(MINIMAL_PORT).unwrap();
        assert_eq!(port.build.abis, Abi::ALL.to_vec());
        assert_eq!(port.cmake.generator, "Ninja");
        assert_eq!(port.feature_flags(), FeatureFlagSet::autoconf_defaults());
        assert_eq!(port.dependencies["openssl"], "1.1.1k");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let bad = MINIMAL_PORT.replace("min_sdk = 16", "min_sdk = 16\nminsdk = 19");
        let err = PortConfig::from_toml(&bad).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let port = PortConfig::from_toml(MINIMAL_PORT).unwrap();
        let env = Config {
            ndk_path: Some(PathBuf::from("/ndk")),
            snapshot_suffix: Some("-SNAPSHOT".into()),
            ..Config::default()
        };
        let overrides = Overrides {
            abis: vec![Abi::X86, Abi::Arm64, Abi::X86],
            jobs: Some(3),
            ..Overrides::default()
        };
        let cfg = PipelineConfig::resolve(
            Path::new("/base"),
            &env,
            PathBuf::from("/base/port.toml"),
            port,
            &overrides,
        )
        .unwrap();

        assert_eq!(cfg.abis, vec![Abi::Arm64, Abi::X86]);
        assert_eq!(cfg.jobs, 3);
        assert_eq!(cfg.snapshot, PathBuf::from("/base/snapshot.tar.gz"));
        assert_eq!(cfg.repository, "/base/out/repository");
        assert_eq!(cfg.sysroot_dir, PathBuf::from("/base/build/sysroot"));
        assert_eq!(cfg.publish_version(), "1.13.0-SNAPSHOT");
        assert_eq!(cfg.timeout, DEFAULT_BUILD_TIMEOUT);
        assert_eq!(cfg.log_path(Abi::X86), PathBuf::from("/base/build/logs/x86.log"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let resolve = |env: &Config, overrides: &Overrides| {
            PipelineConfig::resolve(
                Path::new("/base"),
                env,
                PathBuf::from("/base/port.toml"),
                PortConfig::from_toml(MINIMAL_PORT).unwrap(),
                overrides,
            )
        };

        let from_cli = Overrides {
            timeout: Some(Duration::ZERO),
            ..Overrides::default()
        };
        let err = resolve(&Config::default(), &from_cli).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("timeout")));

        let from_env = Config {
            build_timeout: Some(Duration::ZERO),
            ..Config::default()
        };
        assert!(resolve(&from_env, &Overrides::default()).is_err());
    }

    #[test]
    fn test_env_vars_parsed() {
        let mut vars = BTreeMap::new();
        vars.insert("ANDROID_NDK_HOME".to_string(), "ndk".to_string());
        vars.insert("JOBS".to_string(), "2".to_string());
        vars.insert("BUILD_TIMEOUT".to_string(), "90".to_string());

        let cfg = Config::from_vars(&vars, Path::new("/base"));
        assert_eq!(cfg.ndk_path, Some(PathBuf::from("/base/ndk")));
        assert_eq!(cfg.jobs, Some(2));
        assert_eq!(cfg.build_timeout, Some(Duration::from_secs(90)));
    }
}
