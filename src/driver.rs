//! Per-architecture build driver.
//!
//! Runs a strategy's plan for every [`TargetContext`], at most `jobs` at a
//! time. ABI builds share nothing mutable: each writes only below its own
//! port directory and log file.
//!
//! Failure policy: once any build fails no further build is started, but
//! builds already running are allowed to finish so that every error is
//! reported in one go. The result is all-or-nothing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::cache;
use crate::error::PipelineError;
use crate::flags::FeatureFlagSet;
use crate::process::{self, Invocation};
use crate::strategy::{NativeBuildStrategy, TargetContext};
use crate::target::Abi;

const INPUTS_HASH: &str = ".inputs.sha256";
const LOG_TAIL_LINES: usize = 40;

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Maximum concurrent ABI builds.
    pub jobs: usize,
    /// Wall-clock limit for one ABI build, all steps included.
    pub timeout: Duration,
    /// Rebuild even if the inputs are unchanged.
    pub force: bool,
    /// Snapshot hash, part of the rebuild fingerprint.
    pub source_hash: String,
    /// Pinned external dependency versions, part of the rebuild fingerprint.
    pub dependencies: BTreeMap<String, String>,
}

/// Output of one successful ABI build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifacts {
    pub abi: Abi,
    pub api: u32,
    pub install_dir: PathBuf,
    /// Shared libraries under `install/lib`, sorted.
    pub libraries: Vec<PathBuf>,
    /// Public headers root (`install/include`).
    pub include_dir: PathBuf,
    /// True if the build was skipped because its inputs were unchanged.
    pub cached: bool,
}

impl StagedArtifacts {
    pub fn library(&self, file_name: &str) -> Option<&Path> {
        self.libraries
            .iter()
            .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(file_name))
            .map(PathBuf::as_path)
    }
}

enum Outcome {
    Built(StagedArtifacts),
    Failed(PipelineError),
    /// Not started because another ABI had already failed.
    Skipped(Abi),
}

/// Build every target and wait for all of them (the assembly barrier).
///
/// Returns the staged artifacts in ABI order, or every failure collected.
pub async fn build_all(
    strategy: Arc<dyn NativeBuildStrategy>,
    flags: Arc<FeatureFlagSet>,
    targets: Vec<TargetContext>,
    options: DriverOptions,
) -> Result<Vec<StagedArtifacts>, PipelineError> {
    let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
    let failed = Arc::new(AtomicBool::new(false));
    let options = Arc::new(options);
    let mut set = JoinSet::new();

    for ctx in targets {
        let strategy = Arc::clone(&strategy);
        let flags = Arc::clone(&flags);
        let semaphore = Arc::clone(&semaphore);
        let failed = Arc::clone(&failed);
        let options = Arc::clone(&options);

        set.spawn(async move {
            let abi = ctx.target.abi;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Outcome::Skipped(abi);
            };
            if failed.load(Ordering::SeqCst) {
                return Outcome::Skipped(abi);
            }
            match build_target(strategy.as_ref(), &ctx, &flags, &options).await {
                Ok(artifacts) => Outcome::Built(artifacts),
                Err(e) => {
                    failed.store(true, Ordering::SeqCst);
                    eprintln!("  [FAIL] {}", abi);
                    Outcome::Failed(e)
                }
            }
        });
    }

    let mut built = Vec::new();
    let mut failures = Vec::new();
    let mut skipped = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Outcome::Built(a)) => built.push(a),
            Ok(Outcome::Failed(e)) => failures.push(e),
            Ok(Outcome::Skipped(abi)) => skipped.push(abi),
            Err(e) => {
                failed.store(true, Ordering::SeqCst);
                failures.push(PipelineError::BuildTaskPanicked(e.to_string()))
            }
        }
    }

    if !skipped.is_empty() {
        skipped.sort();
        let names: Vec<&str> = skipped.iter().map(|a| a.name()).collect();
        tracing::warn!(skipped = ?names, "builds not started after an earlier failure");
    }

    match failures.len() {
        0 => {
            built.sort_by_key(|a| a.abi);
            Ok(built)
        }
        1 => Err(failures.remove(0)),
        _ => {
            failures.sort_by_key(failure_abi);
            Err(PipelineError::ArchitectureBuildsFailed { failures })
        }
    }
}

fn failure_abi(e: &PipelineError) -> Option<Abi> {
    match e {
        PipelineError::NativeBuildFailure { abi, .. } | PipelineError::BuildTimeout { abi, .. } => {
            Some(*abi)
        }
        _ => None,
    }
}

/// Build one ABI: run the plan, then collect what it installed.
pub async fn build_target(
    strategy: &dyn NativeBuildStrategy,
    ctx: &TargetContext,
    flags: &FeatureFlagSet,
    options: &DriverOptions,
) -> Result<StagedArtifacts, PipelineError> {
    let abi = ctx.target.abi;
    let plan = strategy.plan(ctx, flags);
    let fingerprint = fingerprint(strategy.kind(), ctx, options, &plan);
    let hash_file = ctx.install_dir.join(INPUTS_HASH);

    if let Some(fingerprint) = fingerprint.as_deref() {
        if !options.force && !cache::needs_rebuild(fingerprint, &hash_file, &ctx.install_dir) {
            println!("  [SKIP] {} (inputs unchanged)", abi);
            return collect(ctx, true);
        }
    }

    // Stale staging from an earlier run must not leak into the package.
    for dir in [&ctx.install_dir, &ctx.build_dir] {
        if dir.exists() {
            fs::remove_dir_all(dir)
                .map_err(|e| PipelineError::io(format!("Failed to clean {}", dir.display()), e))?;
        }
    }
    if ctx.log_path.exists() {
        fs::remove_file(&ctx.log_path).map_err(|e| {
            PipelineError::io(format!("Failed to remove {}", ctx.log_path.display()), e)
        })?;
    }

    println!("  Building {} (API {}) with {}...", abi, ctx.target.api, strategy.kind());
    let start = Instant::now();

    match tokio::time::timeout(options.timeout, run_plan(ctx, &plan)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(PipelineError::BuildTimeout {
                abi,
                timeout: options.timeout,
                log: ctx.log_path.clone(),
            })
        }
    }

    let artifacts = collect(ctx, false)?;
    if let Some(fingerprint) = fingerprint {
        cache::write_cached_hash(&hash_file, &fingerprint).map_err(|e| {
            PipelineError::io(format!("Failed to write {}", hash_file.display()), e)
        })?;
    }

    println!(
        "  [{:.1}s] {}: {} librar{}",
        start.elapsed().as_secs_f64(),
        abi,
        artifacts.libraries.len(),
        if artifacts.libraries.len() == 1 { "y" } else { "ies" }
    );
    Ok(artifacts)
}

async fn run_plan(ctx: &TargetContext, plan: &[Invocation]) -> Result<(), PipelineError> {
    let abi = ctx.target.abi;
    let mut log = process::open_log(&ctx.log_path)
        .map_err(|e| PipelineError::io(format!("Failed to open {}", ctx.log_path.display()), e))?;

    for invocation in plan {
        tracing::info!(abi = %abi, step = %invocation.step, "running");
        let status = process::run_logged(invocation, &mut log)
            .await
            .map_err(|e| PipelineError::NativeBuildFailure {
                abi,
                step: invocation.step.clone(),
                code: -1,
                log: ctx.log_path.clone(),
                output: format!("failed to execute '{}': {}", invocation.program, e),
            })?;

        if !status.success() {
            return Err(PipelineError::NativeBuildFailure {
                abi,
                step: invocation.step.clone(),
                code: status.code().unwrap_or(-1),
                log: ctx.log_path.clone(),
                output: process::log_tail(&ctx.log_path, LOG_TAIL_LINES),
            });
        }
    }
    Ok(())
}

/// Gather shared libraries and the header root from the staging prefix.
fn collect(ctx: &TargetContext, cached: bool) -> Result<StagedArtifacts, PipelineError> {
    let lib_dir = ctx.install_dir.join("lib");
    let mut libraries: Vec<PathBuf> = WalkDir::new(&lib_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() || e.file_type().is_symlink())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("so"))
        .collect();
    libraries.sort();

    if libraries.is_empty() {
        return Err(PipelineError::NativeBuildFailure {
            abi: ctx.target.abi,
            step: "collect".into(),
            code: 0,
            log: ctx.log_path.clone(),
            output: format!("no shared libraries installed in {}", lib_dir.display()),
        });
    }

    Ok(StagedArtifacts {
        abi: ctx.target.abi,
        api: ctx.target.api,
        install_dir: ctx.install_dir.clone(),
        libraries,
        include_dir: ctx.install_dir.join("include"),
        cached,
    })
}

/// Hash of everything that feeds one ABI build: strategy, snapshot, pinned
/// dependencies, the ABI's sysroot contents and the rendered plan.
///
/// None if the sysroot can't be read; the build then always runs.
fn fingerprint(
    kind: &str,
    ctx: &TargetContext,
    options: &DriverOptions,
    plan: &[Invocation],
) -> Option<String> {
    let sysroot = cache::hash_tree(&ctx.target.sysroot)?;
    let dependencies = options
        .dependencies
        .iter()
        .map(|(name, version)| format!("{}={}", name, version));
    let rendered = plan.iter().map(|i| i.to_string());
    Some(cache::hash_strings(
        [kind.to_string(), options.source_hash.clone(), sysroot]
            .into_iter()
            .chain(dependencies)
            .chain(rendered),
    ))
}
