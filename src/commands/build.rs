//! Build command - runs the native builds without packaging.

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;

/// Execute the build command.
pub fn cmd_build(config: &PipelineConfig) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let output = rt.block_on(Pipeline::new(config).run_build())?;

    println!("\n=== Build Complete (NDK {}) ===", output.toolchain.revision);
    for artifacts in &output.artifacts {
        println!(
            "  {:<12} API {:<3} {} libraries{}",
            artifacts.abi.name(),
            artifacts.api,
            artifacts.libraries.len(),
            if artifacts.cached { " (unchanged)" } else { "" }
        );
    }
    Ok(())
}
