//! Release command - the whole pipeline, source to published AAR.

use anyhow::{Context, Result};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::timing::format_elapsed;

/// Execute the release command.
pub fn cmd_release(config: &PipelineConfig, no_dist: bool) -> Result<()> {
    println!(
        "=== Release {}:{}:{} ===",
        config.port.package.group,
        config.port.package.name,
        config.publish_version()
    );
    let start = Instant::now();

    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let summary = rt.block_on(Pipeline::new(config).run_release(!no_dist))?;

    let built = summary.artifacts.iter().filter(|a| !a.cached).count();
    println!(
        "\n=== Release Complete ({}) ===",
        format_elapsed(start.elapsed().as_secs_f64())
    );
    println!(
        "  ABIs: {} ({} built, {} unchanged)",
        summary.artifacts.len(),
        built,
        summary.artifacts.len() - built
    );
    println!("  Repository: {}", summary.publication.repository_root.display());
    if let Some(archive) = &summary.archive {
        println!("  Archive: {}", archive.display());
    }
    Ok(())
}
