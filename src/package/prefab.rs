//! Prefab metadata files (schema version 2).

use serde::Serialize;

use super::{DependencyRef, Module, PackageDescriptor};
use crate::driver::StagedArtifacts;

pub const SCHEMA_VERSION: u32 = 2;
/// STL the NDK build links against.
pub const STL: &str = "c++_shared";

/// `prefab/prefab.json`
#[derive(Debug, Serialize)]
pub struct PackageJson<'a> {
    pub schema_version: u32,
    pub name: &'a str,
    pub version: String,
    pub dependencies: Vec<&'a str>,
}

impl<'a> PackageJson<'a> {
    pub fn new(desc: &'a PackageDescriptor) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: &desc.name,
            version: desc.version.to_string(),
            dependencies: desc.dependencies.keys().map(String::as_str).collect(),
        }
    }
}

/// `prefab/modules/<name>/module.json`
#[derive(Debug, Serialize)]
pub struct ModuleJson {
    pub export_libraries: Vec<String>,
    pub library_name: Option<String>,
    pub android: AndroidModuleJson,
}

#[derive(Debug, Serialize)]
pub struct AndroidModuleJson {
    pub export_libraries: Option<Vec<String>>,
    pub library_name: Option<String>,
}

impl ModuleJson {
    pub fn new(module: &Module) -> Self {
        let default_library = format!("lib{}.so", module.name);
        let library_name = (module.library != default_library).then(|| {
            module
                .library
                .trim_end_matches(".so")
                .to_string()
        });
        Self {
            export_libraries: module.dependencies.iter().map(DependencyRef::to_string).collect(),
            library_name,
            android: AndroidModuleJson {
                export_libraries: None,
                library_name: None,
            },
        }
    }
}

/// `prefab/modules/<name>/libs/android.<abi>/abi.json`
#[derive(Debug, Serialize)]
pub struct AbiJson<'a> {
    pub abi: &'a str,
    pub api: u32,
    pub ndk: u32,
    pub stl: &'a str,
    #[serde(rename = "static")]
    pub is_static: bool,
}

impl<'a> AbiJson<'a> {
    pub fn new(artifacts: &StagedArtifacts, ndk_major: u32) -> Self {
        Self {
            abi: artifacts.abi.name(),
            api: artifacts.api,
            ndk: ndk_major,
            stl: STL,
            is_static: false,
        }
    }
}

pub fn android_manifest(package_name: &str, min_sdk: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.android.ndk.thirdparty.{name}"
    android:versionCode="1"
    android:versionName="1.0">

    <uses-sdk
        android:minSdkVersion="{min_sdk}"
        android:targetSdkVersion="{min_sdk}" />

</manifest>
"#,
        name = package_name.replace('-', "_"),
        min_sdk = min_sdk,
    )
}
