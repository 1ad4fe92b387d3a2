//! Shared test utilities for ndkport tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use ndkport::config::{Config, Overrides, PipelineConfig, PortConfig};
use ndkport::flags::FeatureFlagSet;
use ndkport::process::Invocation;
use ndkport::strategy::{NativeBuildStrategy, TargetContext};
use ndkport::target::Abi;
use tempfile::TempDir;

pub const NDK_REVISION: &str = "23.1.7779620";

/// Libraries the reSIProcate build installs for every ABI.
pub const LIBRARIES: [&str; 4] = [
    "libresipares.so",
    "librutil.so",
    "libresip.so",
    "libdum.so",
];

/// Test environment: a fake NDK, a source snapshot and a scratch base dir.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Base directory (project root simulation)
    pub base_dir: PathBuf,
    pub ndk: PathBuf,
    pub snapshot: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with a fake NDK and snapshot.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();

        let ndk = base_dir.join("ndk").join(NDK_REVISION);
        create_mock_ndk(&ndk);

        let snapshot = base_dir.join("reSIProcate-snapshot.tar.gz");
        create_mock_snapshot(&base_dir.join("snapshot-src"), &snapshot);

        Self {
            _temp_dir: temp_dir,
            base_dir,
            ndk,
            snapshot,
        }
    }

    /// The reSIProcate port definition, pointed at this environment.
    pub fn port_toml(&self) -> String {
        format!(
            r#"
[package]
name = "resiprocate"
group = "org.resiprocate"
version = "1.13.0"
license = "COPYING"
description = "The ndkports AAR for resiprocate."
url = "https://android.googlesource.com/platform/tools/ndkports"

[source]
snapshot = "{snapshot}"

[build]
strategy = "cmake"
min_sdk = 19

[dependencies]
openssl = "1.1.1s"

[[modules]]
name = "resipares"

[[modules]]
name = "rutil"
dependencies = ["//openssl:crypto", "//openssl:ssl"]

[[modules]]
name = "resip"

[[modules]]
name = "dum"

[[licenses]]
name = "The reSIProcate License"
url = "https://www.resiprocate.org/License"

[publication]
developers = ["reSIProcate developers"]
scm_url = "https://github.com/resiprocate/ndkports"
scm_connection = "scm:git:https://github.com/resiprocate/ndkports"
repository = "out/repository"
dist_dir = "out/dist"
"#,
            snapshot = self.snapshot.display()
        )
    }

    /// Resolved configuration for the default port.
    pub fn config(&self) -> PipelineConfig {
        self.config_from(&self.port_toml(), &Overrides::default())
    }

    pub fn config_from(&self, port_toml: &str, overrides: &Overrides) -> PipelineConfig {
        let port = PortConfig::from_toml(port_toml).expect("port file should parse");
        let env = Config {
            ndk_path: Some(self.ndk.clone()),
            work_dir: Some(self.base_dir.join("work")),
            jobs: Some(2),
            ..Config::default()
        };
        PipelineConfig::resolve(
            &self.base_dir,
            &env,
            self.base_dir.join("ports/resiprocate.toml"),
            port,
            overrides,
        )
        .expect("config should resolve")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.base_dir.join("work")
    }
}

/// A minimal NDK layout: `source.properties` and the LLVM bin directory.
pub fn create_mock_ndk(ndk: &Path) {
    fs::create_dir_all(ndk.join("toolchains/llvm/prebuilt/linux-x86_64/bin"))
        .expect("Failed to create NDK toolchain dir");
    fs::create_dir_all(ndk.join("build/cmake")).expect("Failed to create NDK cmake dir");
    fs::write(
        ndk.join("source.properties"),
        format!("Pkg.Desc = Android NDK\nPkg.Revision = {}\n", NDK_REVISION),
    )
    .expect("Failed to write source.properties");
    fs::write(ndk.join("build/cmake/android.toolchain.cmake"), "# toolchain\n")
        .expect("Failed to write toolchain file");
}

/// A release tarball with a single top-level directory, like `make dist` output.
pub fn create_mock_snapshot(staging: &Path, archive: &Path) {
    let root = staging.join("resiprocate-1.13.0");
    fs::create_dir_all(root.join("rutil")).expect("Failed to create snapshot tree");
    fs::write(root.join("COPYING"), "The reSIProcate License\n").expect("Failed to write COPYING");
    fs::write(root.join("CMakeLists.txt"), "project(resiprocate)\n")
        .expect("Failed to write CMakeLists.txt");
    fs::write(root.join("rutil/Data.hxx"), "#pragma once\n").expect("Failed to write header");

    let status = Command::new("tar")
        .arg("-czf")
        .arg(archive)
        .arg("-C")
        .arg(staging)
        .arg("resiprocate-1.13.0")
        .status()
        .expect("tar should run");
    assert!(status.success(), "tar failed to create the snapshot");
}

/// A build strategy that fakes the native build with shell scripts.
///
/// Successful builds install every library in [`LIBRARIES`] plus a header
/// into the ABI's staging prefix; the library content is the ABI name.
#[derive(Default)]
pub struct ScriptStrategy {
    /// ABIs whose configure step exits non-zero.
    pub fail: Vec<Abi>,
    /// Sleep before installing, to exercise timeouts.
    pub delay: Option<Duration>,
    /// Libraries to leave out of the install.
    pub omit: Vec<&'static str>,
    /// Run the delay in a background child (pid in `build/sleeper.pid`),
    /// the way `make` leaves compilers running underneath it.
    pub background: bool,
    /// File every install step appends `start <abi>` / `end <abi>` to.
    pub trace: Option<PathBuf>,
}

impl ScriptStrategy {
    pub fn failing(abis: &[Abi]) -> Self {
        Self {
            fail: abis.to_vec(),
            ..Self::default()
        }
    }
}

impl NativeBuildStrategy for ScriptStrategy {
    fn kind(&self) -> &str {
        "script"
    }

    fn plan(&self, ctx: &TargetContext, flags: &FeatureFlagSet) -> Vec<Invocation> {
        let abi = ctx.target.abi;
        let configure = Invocation::new("configure", "sh", &ctx.build_dir)
            .arg("-c")
            .arg(if self.fail.contains(&abi) {
                "echo 'configure: error: OpenSSL not found' >&2; exit 2".to_string()
            } else {
                format!("echo configuring with {} flags", flags.len())
            });

        let mut script = String::from("set -e\n");
        if let Some(trace) = &self.trace {
            script.push_str(&format!("echo \"start $2\" >> '{}'\n", trace.display()));
        }
        match self.delay {
            Some(delay) if self.background => script.push_str(&format!(
                "sleep {} & echo $! > sleeper.pid; wait\n",
                delay.as_secs_f64()
            )),
            Some(delay) => script.push_str(&format!("sleep {}\n", delay.as_secs_f64())),
            None => {}
        }
        script.push_str("mkdir -p \"$1/lib\" \"$1/include/rutil\"\n");
        script.push_str("echo '#pragma once' > \"$1/include/rutil/Data.hxx\"\n");
        for lib in LIBRARIES.iter().filter(|l| !self.omit.contains(l)) {
            script.push_str(&format!("printf '%s' \"$2\" > \"$1/lib/{}\"\n", lib));
        }
        if let Some(trace) = &self.trace {
            script.push_str(&format!("echo \"end $2\" >> '{}'\n", trace.display()));
        }

        let install = Invocation::new("install", "sh", &ctx.build_dir)
            .arg("-c")
            .arg(script)
            .arg("sh")
            .arg(ctx.install_dir.to_string_lossy())
            .arg(abi.name());

        vec![configure, install]
    }
}

/// True while `pid` exists and is not a zombie.
pub fn process_alive(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid.trim())) {
        Ok(stat) => !matches!(
            stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next()),
            Some("Z") | Some("X")
        ),
        Err(_) => false,
    }
}

/// Poll until `pid` has gone away, for at most `limit`.
pub fn wait_for_exit(pid: &str, limit: Duration) -> bool {
    let deadline = std::time::Instant::now() + limit;
    while process_alive(pid) {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    true
}

/// True if the host can pack AARs.
pub fn zip_available() -> bool {
    ndkport::process::exists("zip")
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}
