//! Android ABIs, build targets and the NDK toolchain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// A CPU/ABI combination the library is cross-compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abi {
    Arm,
    Arm64,
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Abi {
    pub const ALL: [Abi; 4] = [Abi::Arm, Abi::Arm64, Abi::X86, Abi::X86_64];

    /// Android ABI name as used in `jniLibs` and prefab directories.
    pub fn name(self) -> &'static str {
        match self {
            Abi::Arm => "armeabi-v7a",
            Abi::Arm64 => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// GNU triple, used for `--host` and binutils prefixes.
    pub fn triple(self) -> &'static str {
        match self {
            Abi::Arm => "arm-linux-androideabi",
            Abi::Arm64 => "aarch64-linux-android",
            Abi::X86 => "i686-linux-android",
            Abi::X86_64 => "x86_64-linux-android",
        }
    }

    /// Triple prefix of the API-suffixed clang wrappers in the NDK.
    pub fn clang_triple(self) -> &'static str {
        match self {
            Abi::Arm => "armv7a-linux-androideabi",
            other => other.triple(),
        }
    }

    /// Lowest API level the NDK supports for this ABI.
    pub fn min_api(self) -> u32 {
        match self {
            Abi::Arm | Abi::X86 => 16,
            Abi::Arm64 | Abi::X86_64 => 21,
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Abi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm" | "armeabi-v7a" => Ok(Abi::Arm),
            "arm64" | "arm64-v8a" | "aarch64" => Ok(Abi::Arm64),
            "x86" | "i686" => Ok(Abi::X86),
            "x86_64" | "x86-64" => Ok(Abi::X86_64),
            other => Err(format!(
                "unknown ABI '{}' (expected arm, arm64, x86 or x86_64)",
                other
            )),
        }
    }
}

/// One ABI to build, with the API level clamped to what the ABI supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub abi: Abi,
    pub api: u32,
    /// Per-ABI sysroot holding the headers and libraries of external
    /// dependencies (e.g. openssl).
    pub sysroot: PathBuf,
}

impl BuildTarget {
    pub fn new(abi: Abi, min_sdk: u32, sysroot_base: &Path) -> Self {
        Self {
            abi,
            api: min_sdk.max(abi.min_api()),
            sysroot: sysroot_base.join(abi.name()),
        }
    }
}

/// A detected NDK installation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ndk_root: PathBuf,
    /// Full `Pkg.Revision`, e.g. `23.1.7779620`.
    pub revision: String,
    pub major: u32,
    /// `<ndk>/toolchains/llvm/prebuilt/<host>/`
    pub llvm_root: PathBuf,
}

impl Toolchain {
    /// Detect the NDK at `ndk_root` from its `source.properties`.
    pub fn detect(ndk_root: &Path) -> Result<Self, PipelineError> {
        let props = ndk_root.join("source.properties");
        let content = fs::read_to_string(&props).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "NDK not found at {} (cannot read {}: {})",
                ndk_root.display(),
                props.display(),
                e
            ))
        })?;

        let revision = parse_revision(&content).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("no Pkg.Revision in {}", props.display()))
        })?;
        let major = revision
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "malformed Pkg.Revision '{}' in {}",
                    revision,
                    props.display()
                ))
            })?;

        Ok(Self {
            ndk_root: ndk_root.to_path_buf(),
            revision,
            major,
            llvm_root: ndk_root
                .join("toolchains/llvm/prebuilt")
                .join(host_tag()),
        })
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.llvm_root.join("bin")
    }

    pub fn clang(&self, target: &BuildTarget) -> PathBuf {
        self.bin_dir()
            .join(format!("{}{}-clang", target.abi.clang_triple(), target.api))
    }

    pub fn clangxx(&self, target: &BuildTarget) -> PathBuf {
        self.bin_dir()
            .join(format!("{}{}-clang++", target.abi.clang_triple(), target.api))
    }

    pub fn llvm_tool(&self, name: &str) -> PathBuf {
        self.bin_dir().join(format!("llvm-{}", name))
    }

    pub fn cmake_toolchain_file(&self) -> PathBuf {
        self.ndk_root.join("build/cmake/android.toolchain.cmake")
    }
}

fn parse_revision(properties: &str) -> Option<String> {
    properties.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == "Pkg.Revision").then(|| value.trim().to_string())
    })
}

/// Prebuilt host directory name inside the NDK.
pub fn host_tag() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin-x86_64"
    } else if cfg!(target_os = "windows") {
        "windows-x86_64"
    } else {
        "linux-x86_64"
    }
}

/// Find the newest NDK under `~/Android/Sdk/ndk`, if any.
pub fn default_ndk_path() -> Option<PathBuf> {
    let ndk_dir = dirs::home_dir()?.join("Android/Sdk/ndk");
    let mut versions: Vec<PathBuf> = fs::read_dir(&ndk_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.join("source.properties").exists())
        .collect();
    versions.sort_by_key(|p| version_key(p));
    versions.pop()
}

fn version_key(path: &Path) -> Vec<u64> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').filter_map(|c| c.parse().ok()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_parse_aliases() {
        assert_eq!("arm64".parse::<Abi>().unwrap(), Abi::Arm64);
        assert_eq!("arm64-v8a".parse::<Abi>().unwrap(), Abi::Arm64);
        assert_eq!("armeabi-v7a".parse::<Abi>().unwrap(), Abi::Arm);
        assert!("mips".parse::<Abi>().is_err());
    }

    #[test]
    fn test_target_api_is_clamped_for_64_bit() {
        let sysroot = Path::new("/work/sysroot");
        assert_eq!(BuildTarget::new(Abi::Arm, 16, sysroot).api, 16);
        assert_eq!(BuildTarget::new(Abi::Arm64, 16, sysroot).api, 21);
        assert_eq!(BuildTarget::new(Abi::X86_64, 24, sysroot).api, 24);
        assert_eq!(
            BuildTarget::new(Abi::X86, 19, sysroot).sysroot,
            PathBuf::from("/work/sysroot/x86")
        );
    }

    #[test]
    fn test_arm_uses_armv7a_clang() {
        let tc = Toolchain {
            ndk_root: PathBuf::from("/ndk"),
            revision: "23.1.7779620".into(),
            major: 23,
            llvm_root: PathBuf::from("/ndk/llvm"),
        };
        let target = BuildTarget::new(Abi::Arm, 19, Path::new("/s"));
        assert_eq!(
            tc.clang(&target),
            PathBuf::from("/ndk/llvm/bin/armv7a-linux-androideabi19-clang")
        );
    }

    #[test]
    fn test_detect_reads_revision() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("source.properties"),
            "Pkg.Desc = Android NDK\nPkg.Revision = 23.1.7779620\n",
        )
        .unwrap();

        let tc = Toolchain::detect(dir.path()).unwrap();
        assert_eq!(tc.revision, "23.1.7779620");
        assert_eq!(tc.major, 23);
    }

    #[test]
    fn test_detect_missing_ndk_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Toolchain::detect(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }
}
