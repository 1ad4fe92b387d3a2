//! Show command - displays information.

use anyhow::Result;

use crate::config::{PipelineConfig, StrategyKind};
use crate::package::PackageDescriptor;
use crate::pipeline::Pipeline;
use crate::strategy;
use crate::target::{Abi, Toolchain};

/// Show target for the show command.
pub enum ShowTarget {
    /// Show resolved configuration
    Config,
    /// Show feature flags as passed to the build system, or the full
    /// command plan for one ABI
    Flags { abi: Option<Abi> },
    /// Show the package manifest
    Manifest,
}

/// Execute the show command.
pub fn cmd_show(config: &PipelineConfig, target: ShowTarget) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Flags { abi: Some(abi) } => {
            let toolchain = Toolchain::detect(config.ndk_path()?)?;
            let ctx = Pipeline::new(config)
                .targets(&toolchain)
                .into_iter()
                .find(|c| c.target.abi == abi)
                .ok_or_else(|| anyhow::anyhow!("{} is not a configured ABI", abi))?;
            let plan = strategy::for_port(&config.port).plan(&ctx, &config.port.feature_flags());
            println!("Build plan for {} (API {}):", abi, ctx.target.api);
            for invocation in plan {
                println!("\n[{}] (cd {})", invocation.step, invocation.dir.display());
                println!("  {}", invocation);
            }
        }
        ShowTarget::Flags { abi: None } => {
            let flags = config.port.feature_flags();
            println!("Feature flags ({}, {}):", config.port.build.strategy.name(), flags.len());
            let rendered = match config.port.build.strategy {
                StrategyKind::Autoconf => flags.configure_args(),
                StrategyKind::Cmake => flags.cmake_defines(),
            };
            for arg in rendered {
                println!("  {}", arg);
            }
        }
        ShowTarget::Manifest => {
            let descriptor = PackageDescriptor::from_port(&config.port)?;
            descriptor.validate()?;
            print!("{}", descriptor.to_manifest_json()?);
        }
    }
    Ok(())
}
