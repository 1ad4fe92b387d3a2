//! Assembly of the prefab tree from the staged ABI builds.
//!
//! Layout written under `<out>/aar/`:
//!
//! ```text
//! AndroidManifest.xml
//! META-INF/LICENSE
//! prefab/prefab.json
//! prefab/modules/<module>/module.json
//! prefab/modules/<module>/include/...
//! prefab/modules/<module>/libs/android.<abi>/abi.json
//! prefab/modules/<module>/libs/android.<abi>/lib<module>.so
//! ```
//!
//! plus `<out>/manifest.json`, the package descriptor.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::prefab::{android_manifest, AbiJson, ModuleJson, PackageJson};
use super::PackageDescriptor;
use crate::driver::StagedArtifacts;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions<'a> {
    /// Extracted source tree (for the license file).
    pub source_dir: &'a Path,
    pub out_dir: &'a Path,
    pub min_sdk: u32,
    pub ndk_major: u32,
}

/// A validated descriptor together with its on-disk prefab tree.
#[derive(Debug, Clone)]
pub struct AssembledPackage {
    pub descriptor: PackageDescriptor,
    /// Root of the AAR contents.
    pub aar_dir: PathBuf,
    pub manifest: PathBuf,
}

pub fn assemble(
    descriptor: PackageDescriptor,
    artifacts: &[StagedArtifacts],
    options: AssemblyOptions<'_>,
) -> Result<AssembledPackage, PipelineError> {
    descriptor.validate()?;

    let Some(first) = artifacts.first() else {
        return Err(PipelineError::InvalidConfig(
            "nothing to assemble: no architecture was built".into(),
        ));
    };

    // Check everything before touching the output directory.
    for module in &descriptor.modules {
        for staged in artifacts {
            if staged.library(&module.library).is_none() {
                return Err(PipelineError::MissingArtifact {
                    module: module.name.clone(),
                    abi: staged.abi,
                    path: staged.install_dir.join("lib").join(&module.library),
                });
            }
        }
    }
    let license = options.source_dir.join(&descriptor.license);
    if !license.is_file() {
        return Err(PipelineError::InvalidConfig(format!(
            "license file {} not found in the source tree",
            license.display()
        )));
    }

    let out_dir = options.out_dir;
    if out_dir.exists() {
        fs::remove_dir_all(out_dir)
            .map_err(|e| PipelineError::io(format!("Failed to clean {}", out_dir.display()), e))?;
    }
    let aar_dir = out_dir.join("aar");
    let prefab_dir = aar_dir.join("prefab");

    write_json(&prefab_dir.join("prefab.json"), &PackageJson::new(&descriptor))?;

    for module in &descriptor.modules {
        let module_dir = prefab_dir.join("modules").join(&module.name);
        write_json(&module_dir.join("module.json"), &ModuleJson::new(module))?;

        if first.include_dir.is_dir() {
            copy_tree(&first.include_dir, &module_dir.join("include"))?;
        } else {
            create_dir(&module_dir.join("include"))?;
        }

        for staged in artifacts {
            let abi_dir = module_dir
                .join("libs")
                .join(format!("android.{}", staged.abi.name()));
            write_json(&abi_dir.join("abi.json"), &AbiJson::new(staged, options.ndk_major))?;

            // Checked above.
            if let Some(library) = staged.library(&module.library) {
                copy_file(library, &abi_dir.join(&module.library))?;
            }
        }
    }

    write_file(
        &aar_dir.join("AndroidManifest.xml"),
        android_manifest(&descriptor.name, options.min_sdk).as_bytes(),
    )?;
    copy_file(&license, &aar_dir.join("META-INF/LICENSE"))?;

    let manifest = out_dir.join("manifest.json");
    write_file(&manifest, descriptor.to_manifest_json()?.as_bytes())?;

    Ok(AssembledPackage {
        descriptor,
        aar_dir,
        manifest,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|e| {
        PipelineError::InvalidConfig(format!("cannot serialize {}: {}", path.display(), e))
    })?;
    json.push('\n');
    write_file(path, json.as_bytes())
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, content)
        .map_err(|e| PipelineError::io(format!("Failed to write {}", path.display()), e))
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .map_err(|e| PipelineError::io(format!("Failed to create {}", path.display()), e))
}

fn copy_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = to.parent() {
        create_dir(parent)?;
    }
    fs::copy(from, to).map_err(|e| {
        PipelineError::io(
            format!("Failed to copy {} to {}", from.display(), to.display()),
            e,
        )
    })?;
    Ok(())
}

/// Copy a directory tree, following symlinks.
fn copy_tree(from: &Path, to: &Path) -> Result<(), PipelineError> {
    for entry in WalkDir::new(from).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PipelineError::io(
                format!("Failed to walk {}", from.display()),
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            )
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            create_dir(&dest)?;
        } else {
            copy_file(entry.path(), &dest)?;
        }
    }
    Ok(())
}
