//! Hash-based rebuild detection.
//!
//! Uses SHA-256 of the actual inputs rather than mtimes, so touching a file
//! without changing it does not trigger a rebuild.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Compute SHA-256 of multiple files concatenated.
/// Returns None if any file doesn't exist or can't be read.
pub fn hash_files(paths: &[&Path]) -> Option<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        if !path.exists() {
            return None;
        }
        match fs::read(path) {
            Ok(content) => hasher.update(&content),
            Err(e) => {
                eprintln!(
                    "  [WARN] Failed to read {} for hashing: {} (cache will be invalidated)",
                    path.display(),
                    e
                );
                return None;
            }
        }
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// SHA-256 over every regular file below `root`: relative names and contents.
///
/// A missing root hashes like an empty tree. Returns None if a file can't be read.
pub fn hash_tree(root: &Path) -> Option<String> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
    let contents = hash_files(&paths)?;

    let names = files.iter().map(|p| {
        p.strip_prefix(root)
            .unwrap_or(p)
            .to_string_lossy()
            .into_owned()
    });
    Some(hash_strings(names.chain(std::iter::once(contents))))
}

/// SHA-256 over a sequence of strings, each terminated by a NUL so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn hash_strings<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Read cached hash from a .hash file.
/// Returns None if file doesn't exist.
pub fn read_cached_hash(hash_file: &Path) -> Option<String> {
    if !hash_file.exists() {
        return None;
    }
    match fs::read_to_string(hash_file) {
        Ok(s) => Some(s.trim().to_string()),
        Err(e) => {
            eprintln!(
                "  [WARN] Failed to read cache hash file {}: {} (will rebuild)",
                hash_file.display(),
                e
            );
            None
        }
    }
}

/// Write hash to a .hash file.
pub fn write_cached_hash(hash_file: &Path, hash: &str) -> std::io::Result<()> {
    if let Some(parent) = hash_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(hash_file, hash)
}

/// Check if target needs rebuild based on the input hash.
///
/// Returns true if the target doesn't exist, no hash was recorded, or the
/// recorded hash differs. Unlike a mtime check, a missing hash file always
/// means rebuild: a half-finished build leaves no hash behind.
pub fn needs_rebuild(input_hash: &str, hash_file: &Path, target: &Path) -> bool {
    if !target.exists() {
        return true;
    }
    match read_cached_hash(hash_file) {
        Some(cached) => cached != input_hash,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_files_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hash_files(&[&dir.path().join("missing")]).is_none());
    }

    #[test]
    fn test_hash_strings_separates_parts() {
        assert_ne!(hash_strings(["ab", "c"]), hash_strings(["a", "bc"]));
        assert_eq!(hash_strings(["x"]), hash_strings(vec!["x".to_string()]));
    }

    #[test]
    fn test_hash_tree_tracks_names_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sysroot");
        let empty = hash_tree(&root).unwrap();

        fs::create_dir_all(root.join("include/openssl")).unwrap();
        fs::write(root.join("include/openssl/opensslv.h"), "1.1.1k").unwrap();
        let k = hash_tree(&root).unwrap();
        assert_ne!(k, empty);
        assert_eq!(hash_tree(&root).unwrap(), k);

        fs::write(root.join("include/openssl/opensslv.h"), "1.1.1s").unwrap();
        assert_ne!(hash_tree(&root).unwrap(), k);

        fs::rename(
            root.join("include/openssl/opensslv.h"),
            root.join("include/openssl/crypto.h"),
        )
        .unwrap();
        fs::write(root.join("include/openssl/crypto.h"), "1.1.1k").unwrap();
        assert_ne!(hash_tree(&root).unwrap(), k);
    }

    #[test]
    fn test_needs_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("install");
        let hash_file = dir.path().join(".inputs.sha256");

        assert!(needs_rebuild("abc", &hash_file, &target));

        fs::create_dir_all(&target).unwrap();
        assert!(needs_rebuild("abc", &hash_file, &target));

        write_cached_hash(&hash_file, "abc").unwrap();
        assert!(!needs_rebuild("abc", &hash_file, &target));
        assert!(needs_rebuild("def", &hash_file, &target));
    }
}
