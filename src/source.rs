//! Source acquisition.
//!
//! The snapshot archive is produced outside this tool (e.g. by the library's
//! own release-tarball script). Here we only verify it and unpack it.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::cache;
use crate::error::PipelineError;
use crate::process::Cmd;

const EXTRACT_MARKER: &str = ".snapshot.sha256";

/// A verified source snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    /// SHA-256 of the archive, used for rebuild fingerprints.
    pub sha256: String,
}

/// Verify that the snapshot exists, is a regular file and is readable.
pub fn acquire(path: &Path) -> Result<Snapshot, PipelineError> {
    let missing = |reason: String| PipelineError::MissingSource {
        path: path.to_path_buf(),
        reason,
    };

    let meta = fs::metadata(path).map_err(|e| missing(format!("not found ({})", e)))?;
    if !meta.is_file() {
        return Err(missing("is not a regular file".into()));
    }

    let mut file = File::open(path).map_err(|e| missing(format!("not readable ({})", e)))?;
    let mut first = [0u8; 1];
    match file.read(&mut first) {
        Ok(0) => return Err(missing("is empty".into())),
        Ok(_) => {}
        Err(e) => return Err(missing(format!("not readable ({})", e))),
    }

    let sha256 = cache::hash_files(&[path]).ok_or_else(|| missing("could not be hashed".into()))?;

    Ok(Snapshot {
        path: path.to_path_buf(),
        sha256,
    })
}

/// Unpack the snapshot into `dest`, dropping the archive's top-level directory.
///
/// Skips the work when `dest` already holds an extraction of the same archive.
/// Returns true if the archive was extracted.
pub fn extract(snapshot: &Snapshot, dest: &Path) -> Result<bool, PipelineError> {
    let marker = dest.join(EXTRACT_MARKER);
    if cache::read_cached_hash(&marker).as_deref() == Some(snapshot.sha256.as_str()) {
        return Ok(false);
    }

    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|e| PipelineError::io(format!("Failed to clean {}", dest.display()), e))?;
    }
    fs::create_dir_all(dest)
        .map_err(|e| PipelineError::io(format!("Failed to create {}", dest.display()), e))?;

    Cmd::new("tar")
        .arg("-xf")
        .arg_path(&snapshot.path)
        .arg("-C")
        .arg_path(dest)
        .arg("--strip-components=1")
        .error_msg(format!("Failed to extract {}", snapshot.path.display()))
        .run()
        .map_err(|e| PipelineError::MissingSource {
            path: snapshot.path.clone(),
            reason: format!("{:#}", e),
        })?;

    cache::write_cached_hash(&marker, &snapshot.sha256)
        .map_err(|e| PipelineError::io(format!("Failed to write {}", marker.display()), e))?;

    Ok(true)
}
