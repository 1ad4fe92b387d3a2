//! Build environment checks (NDK, snapshot, sysroots, output locations).

use std::fs;
use std::path::Path;

use crate::config::{PipelineConfig, StrategyKind};
use crate::package::PackageDescriptor;
use crate::process::Cmd;
use crate::publish;
use crate::source;
use crate::target::{BuildTarget, Toolchain};

use super::types::CheckResult;

/// Check the NDK and its toolchain layout.
pub fn check_toolchain(config: &PipelineConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let ndk = match config.ndk_path() {
        Ok(p) => p,
        Err(e) => {
            results.push(CheckResult::fail("NDK", &e.to_string()));
            return results;
        }
    };

    let toolchain = match Toolchain::detect(ndk) {
        Ok(t) => t,
        Err(e) => {
            results.push(CheckResult::fail("NDK", &e.to_string()));
            return results;
        }
    };
    results.push(CheckResult::pass_with(
        "NDK",
        &format!("{} ({})", toolchain.revision, ndk.display()),
    ));

    let bin = toolchain.bin_dir();
    if bin.is_dir() {
        results.push(CheckResult::pass_with("LLVM toolchain", &bin.display().to_string()));
    } else {
        results.push(CheckResult::fail(
            "LLVM toolchain",
            &format!("{} not found - is this NDK for another host?", bin.display()),
        ));
    }

    if config.port.build.strategy == StrategyKind::Cmake {
        let file = toolchain.cmake_toolchain_file();
        if file.is_file() {
            results.push(CheckResult::pass("android.toolchain.cmake"));
        } else {
            results.push(CheckResult::fail(
                "android.toolchain.cmake",
                &format!("{} not found", file.display()),
            ));
        }
    }

    results
}

/// Check the package definition, snapshot, sysroots and output locations.
pub fn check_build_environment(config: &PipelineConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match PackageDescriptor::from_port(&config.port).and_then(|d| d.validate().map(|_| d)) {
        Ok(d) => results.push(CheckResult::pass_with(
            "modules",
            &format!("{} modules, dependency graph resolves", d.modules.len()),
        )),
        Err(e) => results.push(CheckResult::fail("modules", &e.to_string())),
    }

    match source::acquire(&config.snapshot) {
        Ok(snapshot) => results.push(CheckResult::pass_with(
            "source snapshot",
            &format!("{} (sha256 {})", snapshot.path.display(), &snapshot.sha256[..12]),
        )),
        Err(e) => results.push(CheckResult::fail("source snapshot", &e.to_string())),
    }

    // Missing sysroots only warn; headers may come from the NDK sysroot
    for &abi in &config.abis {
        let target = BuildTarget::new(abi, config.port.build.min_sdk, &config.sysroot_dir);
        let name = format!("sysroot {}", abi);
        if target.sysroot.join("include").is_dir() && target.sysroot.join("lib").is_dir() {
            results.push(CheckResult::pass_with(&name, &target.sysroot.display().to_string()));
        } else {
            results.push(CheckResult::warn(
                &name,
                &format!(
                    "{} has no include/ and lib/ - dependency headers and libraries expected there",
                    target.sysroot.display()
                ),
            ));
        }
    }

    results.push(check_writable("work dir", &config.work_dir));

    match publish::repository_root(&config.repository) {
        Ok(root) => results.push(check_writable("repository", &root)),
        Err(e) => results.push(CheckResult::fail("repository", &e.to_string())),
    }

    if let Some(check) = check_disk_space(&config.base_dir) {
        results.push(check);
    }

    results
}

fn check_writable(name: &str, dir: &Path) -> CheckResult {
    if let Err(e) = fs::create_dir_all(dir) {
        return CheckResult::fail(name, &format!("Cannot create {}: {}", dir.display(), e));
    }
    let test_file = dir.join(".preflight-test");
    match fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = fs::remove_file(&test_file);
            CheckResult::pass_with(name, &dir.display().to_string())
        }
        Err(e) => CheckResult::fail(name, &format!("Cannot write to {}: {}", dir.display(), e)),
    }
}

/// Warn below 10GB free.
fn check_disk_space(dir: &Path) -> Option<CheckResult> {
    let result = Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(dir)
        .allow_fail()
        .run()
        .ok()?;
    if !result.success() {
        return None;
    }
    let avail_bytes: u64 = result.stdout.lines().nth(1)?.trim().parse().ok()?;
    let free_gb = avail_bytes / (1024 * 1024 * 1024);
    Some(if free_gb < 10 {
        CheckResult::warn("disk space", &format!("{}GB free - builds need ~8GB", free_gb))
    } else {
        CheckResult::pass_with("disk space", &format!("{}GB free", free_gb))
    })
}
