//! Flat release archive of the published repository.
//!
//! Collects every `.aar` and `.pom` below the repository root (with their
//! repository-relative paths) into `<dist>/<name>-<version>.zip`. Taking a
//! [`Publication`] ties this step to a successful publish.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::Publication;
use crate::error::PipelineError;
use crate::process::Cmd;

const DIST_EXTENSIONS: [&str; 2] = ["aar", "pom"];

/// Repository-relative paths of every file that goes into the archive, sorted.
pub fn collect_files(repository_root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(repository_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| DIST_EXTENSIONS.contains(&x))
        })
        .filter_map(|e| e.path().strip_prefix(repository_root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

pub fn create_archive(publication: &Publication, dist_dir: &Path) -> Result<PathBuf, PipelineError> {
    let files = collect_files(&publication.repository_root);
    if files.is_empty() {
        return Err(PipelineError::publish(
            publication.repository_root.display(),
            "repository contains no .aar or .pom files",
        ));
    }

    fs::create_dir_all(dist_dir).map_err(|e| PipelineError::publish(dist_dir.display(), e))?;
    let dist_dir =
        fs::canonicalize(dist_dir).map_err(|e| PipelineError::publish(dist_dir.display(), e))?;

    let archive = dist_dir.join(format!("{}.zip", publication.metadata.base_name()));
    if archive.exists() {
        fs::remove_file(&archive).map_err(|e| PipelineError::publish(archive.display(), e))?;
    }

    let mut cmd = Cmd::new("zip")
        .args(["-X", "-q"])
        .arg_path(&archive)
        .dir(&publication.repository_root);
    for file in &files {
        cmd = cmd.arg_path(file);
    }
    cmd.error_msg("zip failed")
        .run()
        .map_err(|e| PipelineError::publish(archive.display(), format!("{:#}", e)))?;

    Ok(archive)
}
