//! Publication of the assembled package into a Maven-layout repository.
//!
//! ```text
//! <repo>/<group path>/<name>/maven-metadata.xml
//! <repo>/<group path>/<name>/<version>/<name>-<version>.aar(.sha256|.sha512)
//! <repo>/<group path>/<name>/<version>/<name>-<version>.pom(.sha256|.sha512)
//! ```
//!
//! Nothing is retried; a failed publication is recovered by rerunning the
//! pipeline, which overwrites the version directory.

pub mod dist;
mod pom;
mod repository;

pub use pom::xml_escape;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{LicenseConfig, PipelineConfig};
use crate::error::PipelineError;
use crate::package::AssembledPackage;
use crate::process::Cmd;

/// Everything the POM and repository layout need besides the package itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationMetadata {
    pub group: String,
    pub name: String,
    /// Published version, snapshot suffix included.
    pub version: String,
    pub description: String,
    pub url: String,
    pub licenses: Vec<LicenseConfig>,
    pub developers: Vec<String>,
    pub scm_url: String,
    pub scm_connection: String,
    /// External package -> pinned version, emitted as POM dependencies.
    pub dependencies: BTreeMap<String, String>,
    pub dependency_group: String,
    /// Filesystem path or `file://` URL.
    pub repository: String,
}

impl PublicationMetadata {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let port = &config.port;
        Self {
            group: port.package.group.clone(),
            name: port.package.name.clone(),
            version: config.publish_version(),
            description: port.package.description.clone(),
            url: port.package.url.clone(),
            licenses: port.licenses.clone(),
            developers: port.publication.developers.clone(),
            scm_url: port.publication.scm_url.clone(),
            scm_connection: port.publication.scm_connection.clone(),
            dependencies: port.dependencies.clone(),
            dependency_group: port.publication.dependency_group.clone(),
            repository: config.repository.clone(),
        }
    }

    /// `<name>-<version>`
    pub fn base_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Resolve the repository location to a local directory.
///
/// Only local repositories are supported; remote URLs are rejected up front
/// so that no partial state is written.
pub fn repository_root(location: &str) -> Result<PathBuf, PipelineError> {
    if let Some(path) = location.strip_prefix("file://") {
        if path.is_empty() {
            return Err(PipelineError::publish(location, "empty file:// URL"));
        }
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = location.split_once("://") {
        return Err(PipelineError::publish(
            location,
            format!("unsupported repository scheme '{}'", scheme),
        ));
    }
    if location.is_empty() {
        return Err(PipelineError::publish(location, "no repository configured"));
    }
    Ok(PathBuf::from(location))
}

/// A successful publication. Required to build the release archive.
#[derive(Debug, Clone)]
pub struct Publication {
    pub metadata: PublicationMetadata,
    pub repository_root: PathBuf,
    pub version_dir: PathBuf,
    pub aar: PathBuf,
    pub pom: PathBuf,
}

/// Publish the assembled package.
pub fn publish(
    package: &AssembledPackage,
    metadata: &PublicationMetadata,
) -> Result<Publication, PipelineError> {
    let root = repository_root(&metadata.repository)?;
    let artifact_dir = root
        .join(metadata.group.replace('.', "/"))
        .join(&metadata.name);
    let version_dir = artifact_dir.join(&metadata.version);

    fs::create_dir_all(&version_dir)
        .map_err(|e| PipelineError::publish(version_dir.display(), e))?;
    // zip runs inside the AAR directory, so every path handed to it is absolute.
    let version_dir = fs::canonicalize(&version_dir)
        .map_err(|e| PipelineError::publish(version_dir.display(), e))?;

    let base = metadata.base_name();
    let aar = version_dir.join(format!("{}.aar", base));
    let pom = version_dir.join(format!("{}.pom", base));

    zip_dir(&package.aar_dir, &aar)?;
    repository::write_with_checksums(&aar, None)?;

    let pom_xml = pom::render(metadata);
    repository::write_with_checksums(&pom, Some(pom_xml.as_bytes()))?;

    repository::update_metadata(&artifact_dir, metadata)?;

    Ok(Publication {
        metadata: metadata.clone(),
        repository_root: root,
        version_dir,
        aar,
        pom,
    })
}

/// Zip the contents of `dir` (not the directory itself) into `dest`.
fn zip_dir(dir: &Path, dest: &Path) -> Result<(), PipelineError> {
    let tmp = dest.with_extension("aar.tmp");
    if tmp.exists() {
        fs::remove_file(&tmp).map_err(|e| PipelineError::publish(tmp.display(), e))?;
    }

    Cmd::new("zip")
        .args(["-r", "-X", "-q"])
        .arg_path(&tmp)
        .arg(".")
        .dir(dir)
        .error_msg("zip failed")
        .run()
        .map_err(|e| PipelineError::publish(dest.display(), format!("{:#}", e)))?;

    fs::rename(&tmp, dest).map_err(|e| PipelineError::publish(dest.display(), e))
}
