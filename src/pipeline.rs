//! The packaging pipeline.
//!
//! ```text
//! source::acquire ─► driver::build_all ─► package::assemble ─► publish ─► dist
//!                     (ABIs in parallel)   (waits for all)
//! ```
//!
//! Any error aborts the run; nothing is assembled or published unless every
//! ABI built.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::driver::{self, DriverOptions, StagedArtifacts};
use crate::error::PipelineError;
use crate::package::{self, AssembledPackage, AssemblyOptions, PackageDescriptor};
use crate::publish::{self, dist, Publication, PublicationMetadata};
use crate::source::{self, Snapshot};
use crate::strategy::{self, NativeBuildStrategy, TargetContext};
use crate::target::{BuildTarget, Toolchain};
use crate::timing::Timer;

/// Result of a complete release run.
#[derive(Debug)]
pub struct ReleaseSummary {
    pub artifacts: Vec<StagedArtifacts>,
    pub package: AssembledPackage,
    pub publication: Publication,
    pub archive: Option<PathBuf>,
}

/// Builds of every ABI, plus the toolchain that produced them.
#[derive(Debug)]
pub struct BuildOutput {
    pub toolchain: Toolchain,
    pub artifacts: Vec<StagedArtifacts>,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    strategy: Arc<dyn NativeBuildStrategy>,
}

impl<'a> Pipeline<'a> {
    /// Pipeline using the strategy selected by the port file.
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self::with_strategy(config, strategy::for_port(&config.port))
    }

    pub fn with_strategy(config: &'a PipelineConfig, strategy: Arc<dyn NativeBuildStrategy>) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    /// The validated package descriptor. Depends only on configuration.
    pub fn descriptor(&self) -> Result<PackageDescriptor, PipelineError> {
        let descriptor = PackageDescriptor::from_port(&self.config.port)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Verify and unpack the source snapshot.
    pub fn acquire(&self) -> Result<Snapshot, PipelineError> {
        let snapshot = source::acquire(&self.config.snapshot)?;
        let dest = self.config.source_dir();
        if source::extract(&snapshot, &dest)? {
            println!("  Extracted {} to {}", snapshot.path.display(), dest.display());
        } else {
            println!("  [SKIP] Source already extracted");
        }
        Ok(snapshot)
    }

    pub fn targets(&self, toolchain: &Toolchain) -> Vec<TargetContext> {
        self.config
            .abis
            .iter()
            .map(|&abi| {
                let target =
                    BuildTarget::new(abi, self.config.port.build.min_sdk, &self.config.sysroot_dir);
                TargetContext::new(self.config, toolchain, target)
            })
            .collect()
    }

    /// Build every configured ABI from an acquired snapshot.
    pub async fn build(&self, snapshot: &Snapshot) -> Result<BuildOutput, PipelineError> {
        let toolchain = Toolchain::detect(self.config.ndk_path()?)?;
        tracing::info!(ndk = %toolchain.revision, strategy = self.strategy.kind(), "toolchain detected");

        let options = DriverOptions {
            jobs: self.config.jobs,
            timeout: self.config.timeout,
            force: self.config.force,
            source_hash: snapshot.sha256.clone(),
            dependencies: self.config.port.dependencies.clone(),
        };
        let artifacts = driver::build_all(
            Arc::clone(&self.strategy),
            Arc::new(self.config.port.feature_flags()),
            self.targets(&toolchain),
            options,
        )
        .await?;

        Ok(BuildOutput {
            toolchain,
            artifacts,
        })
    }

    pub fn assemble(&self, output: &BuildOutput) -> Result<AssembledPackage, PipelineError> {
        let out_dir = self.config.package_dir();
        package::assemble(
            self.descriptor()?,
            &output.artifacts,
            AssemblyOptions {
                source_dir: &self.config.source_dir(),
                out_dir: &out_dir,
                min_sdk: self.config.port.build.min_sdk,
                ndk_major: output.toolchain.major,
            },
        )
    }

    pub fn publish(&self, package: &AssembledPackage) -> Result<Publication, PipelineError> {
        publish::publish(package, &PublicationMetadata::from_config(self.config))
    }

    /// Source acquisition and every ABI build, without packaging.
    pub async fn run_build(&self) -> Result<BuildOutput, PipelineError> {
        self.descriptor()?;

        println!("\n=== Source ===");
        let snapshot = self.acquire()?;

        println!("\n=== Build ({} ABIs, {} at a time) ===", self.config.abis.len(), self.config.jobs);
        let t = Timer::start("Native builds");
        let output = self.build(&snapshot).await?;
        t.finish();
        Ok(output)
    }

    /// The whole pipeline: build, assemble, publish and optionally archive.
    pub async fn run_release(&self, with_dist: bool) -> Result<ReleaseSummary, PipelineError> {
        let output = self.run_build().await?;

        println!("\n=== Assemble ===");
        let t = Timer::start("Package");
        let package = self.assemble(&output)?;
        t.finish();
        println!(
            "  {} modules, manifest: {}",
            package.descriptor.modules.len(),
            package.manifest.display()
        );

        println!("\n=== Publish ===");
        let t = Timer::start("Publish");
        let publication = self.publish(&package)?;
        t.finish();
        println!("  AAR: {}", publication.aar.display());
        println!("  POM: {}", publication.pom.display());

        let archive = if with_dist {
            println!("\n=== Distribution ===");
            let archive = dist::create_archive(&publication, &self.config.dist_dir)?;
            println!("  Archive: {}", archive.display());
            Some(archive)
        } else {
            None
        };

        Ok(ReleaseSummary {
            artifacts: output.artifacts,
            package,
            publication,
            archive,
        })
    }
}
