//! Typed pipeline errors.
//!
//! Every variant is fatal for the run. The `Display` output names the stage
//! that failed so the message printed on exit points at the culprit.

use std::path::PathBuf;
use std::time::Duration;

use crate::target::Abi;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("[source] snapshot archive {}: {reason}", path.display())]
    MissingSource { path: PathBuf, reason: String },

    #[error(
        "[build {abi}] {step} failed (exit code {code})\n  log: {}\n{output}",
        log.display()
    )]
    NativeBuildFailure {
        abi: Abi,
        step: String,
        code: i32,
        log: PathBuf,
        output: String,
    },

    #[error("[build {abi}] timed out after {timeout:?}\n  log: {}", log.display())]
    BuildTimeout {
        abi: Abi,
        timeout: Duration,
        log: PathBuf,
    },

    #[error("[build] build task panicked: {0}")]
    BuildTaskPanicked(String),

    #[error("{} architecture build(s) failed:\n{}", failures.len(), render_failures(failures))]
    ArchitectureBuildsFailed { failures: Vec<PipelineError> },

    #[error("[assemble] module '{module}' depends on unresolved reference '{reference}'")]
    UnresolvedModuleDependency { module: String, reference: String },

    #[error("[assemble] module dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("[assemble] module '{module}' has no library for {abi}: expected {}", path.display())]
    MissingArtifact {
        module: String,
        abi: Abi,
        path: PathBuf,
    },

    #[error("[publish] cannot write to {location}: {reason}")]
    PublicationWriteFailure { location: String, reason: String },

    #[error("[config] {0}")]
    InvalidConfig(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn publish(location: impl ToString, reason: impl ToString) -> Self {
        Self::PublicationWriteFailure {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn render_failures(failures: &[PipelineError]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {}", f.to_string().replace('\n', "\n    ")))
        .collect::<Vec<_>>()
        .join("\n")
}
