//! Repository file writing: checksum sidecars and `maven-metadata.xml`.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};

use super::{xml_escape, PublicationMetadata};
use crate::error::PipelineError;

/// Write `content` to `path` (if given) and add `.sha256`/`.sha512` files.
pub fn write_with_checksums(path: &Path, content: Option<&[u8]>) -> Result<(), PipelineError> {
    let fail = |e: std::io::Error| PipelineError::publish(path.display(), e);

    if let Some(content) = content {
        fs::write(path, content).map_err(fail)?;
    }
    let bytes = fs::read(path).map_err(fail)?;

    let sidecars = [
        ("sha256", format!("{:x}", Sha256::digest(&bytes))),
        ("sha512", format!("{:x}", Sha512::digest(&bytes))),
    ];
    for (ext, digest) in sidecars {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        let sidecar = Path::new(&name);
        fs::write(sidecar, digest).map_err(|e| PipelineError::publish(sidecar.display(), e))?;
    }
    Ok(())
}

/// Versions listed in an existing `maven-metadata.xml`, in file order.
pub fn parse_versions(xml: &str) -> Vec<String> {
    let Some(start) = xml.find("<versions>") else {
        return Vec::new();
    };
    let Some(end) = xml[start..].find("</versions>") else {
        return Vec::new();
    };
    let mut versions = Vec::new();
    let mut rest = &xml[start..start + end];
    while let Some(open) = rest.find("<version>") {
        rest = &rest[open + "<version>".len()..];
        let Some(close) = rest.find("</version>") else {
            break;
        };
        versions.push(rest[..close].trim().to_string());
        rest = &rest[close..];
    }
    versions
}

/// Add the published version to the artifact's `maven-metadata.xml`.
pub fn update_metadata(artifact_dir: &Path, meta: &PublicationMetadata) -> Result<(), PipelineError> {
    let path = artifact_dir.join("maven-metadata.xml");

    let mut versions = match fs::read_to_string(&path) {
        Ok(existing) => parse_versions(&existing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(PipelineError::publish(path.display(), e)),
    };
    versions.retain(|v| v != &meta.version);
    versions.push(meta.version.clone());

    let release = versions
        .iter()
        .rev()
        .find(|v| !v.ends_with("-SNAPSHOT"))
        .cloned();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
    xml.push_str(&format!("  <groupId>{}</groupId>\n", xml_escape(&meta.group)));
    xml.push_str(&format!("  <artifactId>{}</artifactId>\n", xml_escape(&meta.name)));
    xml.push_str("  <versioning>\n");
    xml.push_str(&format!("    <latest>{}</latest>\n", xml_escape(&meta.version)));
    if let Some(release) = release {
        xml.push_str(&format!("    <release>{}</release>\n", xml_escape(&release)));
    }
    xml.push_str("    <versions>\n");
    for version in &versions {
        xml.push_str(&format!("      <version>{}</version>\n", xml_escape(version)));
    }
    xml.push_str("    </versions>\n  </versioning>\n</metadata>\n");

    write_with_checksums(&path, Some(xml.as_bytes()))
}
