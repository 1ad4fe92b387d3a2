//! Clean command - removes build outputs.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::publish;

/// Clean target for the clean command.
pub enum CleanTarget {
    /// Per-ABI build trees, logs and the assembled package (default)
    Build,
    /// The local Maven repository and release archives
    Repository,
    /// Everything, including the extracted source
    All,
}

/// Execute the clean command.
pub fn cmd_clean(config: &PipelineConfig, target: CleanTarget) -> Result<()> {
    match target {
        CleanTarget::Build => {
            let mut cleaned = false;
            for dir in ["port", "logs", "package"] {
                cleaned |= remove_dir(&config.work_dir.join(dir))?;
            }
            if cleaned {
                println!("Build outputs cleaned (source and repository preserved).");
            } else {
                println!("Nothing to clean.");
            }
        }
        CleanTarget::Repository => clean_repository(config)?,
        CleanTarget::All => {
            remove_dir(&config.work_dir)?;
            clean_repository(config)?;
            println!("Clean complete.");
        }
    }
    Ok(())
}

fn clean_repository(config: &PipelineConfig) -> Result<()> {
    let root = publish::repository_root(&config.repository)?;
    remove_dir(&root)?;
    remove_dir(&config.dist_dir)?;
    Ok(())
}

fn remove_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    println!("Removing {}...", dir.display());
    fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    Ok(true)
}
