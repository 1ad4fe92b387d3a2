//! End-to-end pipeline tests.
//!
//! Native builds are replaced by [`helpers::ScriptStrategy`]; everything else
//! (snapshot extraction, the build driver, assembly and publication) is real.
//! Publication tests need `zip` on the host and are skipped without it.

mod helpers;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use helpers::{
    assert_file_contains, assert_file_exists, wait_for_exit, zip_available, ScriptStrategy,
    TestEnv,
};
use ndkport::config::Overrides;
use ndkport::pipeline::Pipeline;
use ndkport::target::Abi;
use ndkport::PipelineError;

// =============================================================================
// Source acquisition
// =============================================================================

#[tokio::test]
async fn test_missing_snapshot_aborts_before_any_build() {
    let env = TestEnv::new();
    fs::remove_file(&env.snapshot).unwrap();
    let config = env.config();

    let err = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_release(true)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingSource { .. }), "got {err}");
    assert!(!config.work_dir.join("port").exists());
    assert!(!env.base_dir.join("out/repository").exists());
}

// =============================================================================
// Build driver
// =============================================================================

#[tokio::test]
async fn test_build_stages_every_abi() {
    let env = TestEnv::new();
    let config = env.config();

    let output = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_build()
        .await
        .unwrap();

    assert_eq!(output.toolchain.major, 23);
    let abis: Vec<Abi> = output.artifacts.iter().map(|a| a.abi).collect();
    assert_eq!(abis, Abi::ALL);
    for staged in &output.artifacts {
        assert_eq!(staged.libraries.len(), 4);
        assert_eq!(staged.api, 19u32.max(staged.abi.min_api()));
        assert!(!staged.cached);
        assert_eq!(
            fs::read_to_string(staged.library("librutil.so").unwrap()).unwrap(),
            staged.abi.name()
        );
    }
    assert_file_contains(&config.log_path(Abi::Arm64), "configuring with");
}

#[tokio::test]
async fn test_one_failed_abi_stops_the_release() {
    let env = TestEnv::new();
    let config = env.config();

    let err = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::failing(&[Abi::Arm64])))
        .run_release(true)
        .await
        .unwrap_err();

    match err {
        PipelineError::NativeBuildFailure {
            abi, step, code, output, ..
        } => {
            assert_eq!(abi, Abi::Arm64);
            assert_eq!(step, "configure");
            assert_eq!(code, 2);
            assert!(output.contains("OpenSSL not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.package_dir().exists());
    assert!(!env.base_dir.join("out/repository").exists());
}

#[tokio::test]
async fn test_multiple_failures_are_aggregated() {
    let env = TestEnv::new();
    let overrides = Overrides {
        jobs: Some(4),
        ..Overrides::default()
    };
    let config = env.config_from(&env.port_toml(), &overrides);

    let strategy = ScriptStrategy::failing(&[Abi::X86_64, Abi::Arm]);
    let err = Pipeline::with_strategy(&config, Arc::new(strategy))
        .run_build()
        .await
        .unwrap_err();

    match err {
        PipelineError::ArchitectureBuildsFailed { failures } => {
            let abis: Vec<String> = failures
                .iter()
                .map(|f| match f {
                    PipelineError::NativeBuildFailure { abi, .. } => abi.to_string(),
                    other => panic!("unexpected failure: {other}"),
                })
                .collect();
            assert_eq!(abis, ["armeabi-v7a", "x86_64"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_build_timeout() {
    let env = TestEnv::new();
    let overrides = Overrides {
        abis: vec![Abi::X86],
        timeout: Some(Duration::from_millis(500)),
        ..Overrides::default()
    };
    let config = env.config_from(&env.port_toml(), &overrides);

    let strategy = ScriptStrategy {
        delay: Some(Duration::from_secs(10)),
        ..ScriptStrategy::default()
    };
    let err = Pipeline::with_strategy(&config, Arc::new(strategy))
        .run_build()
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::BuildTimeout { abi: Abi::X86, .. }),
        "got {err}"
    );
}

#[tokio::test]
async fn test_unchanged_inputs_skip_rebuild() {
    let env = TestEnv::new();
    let config = env.config();
    let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));

    pipeline.run_build().await.unwrap();
    let second = pipeline.run_build().await.unwrap();
    assert!(second.artifacts.iter().all(|a| a.cached));

    let mut forced = config.clone();
    forced.force = true;
    let third = Pipeline::with_strategy(&forced, Arc::new(ScriptStrategy::default()))
        .run_build()
        .await
        .unwrap();
    assert!(third.artifacts.iter().all(|a| !a.cached));
}

#[tokio::test]
async fn test_timeout_kills_the_whole_build() {
    let env = TestEnv::new();
    let overrides = Overrides {
        abis: vec![Abi::X86],
        timeout: Some(Duration::from_millis(500)),
        ..Overrides::default()
    };
    let config = env.config_from(&env.port_toml(), &overrides);

    let strategy = ScriptStrategy {
        delay: Some(Duration::from_secs(30)),
        background: true,
        ..ScriptStrategy::default()
    };
    let err = Pipeline::with_strategy(&config, Arc::new(strategy))
        .run_build()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::BuildTimeout { .. }), "got {err}");

    let pid = fs::read_to_string(config.port_dir(Abi::X86).join("build/sleeper.pid")).unwrap();
    assert!(
        wait_for_exit(&pid, Duration::from_secs(5)),
        "compiler-like child {} still running after the timeout",
        pid.trim()
    );
}

#[tokio::test]
async fn test_sysroot_change_forces_rebuild() {
    let env = TestEnv::new();
    let config = env.config();
    let openssl = config.sysroot_dir.join(Abi::X86.name()).join("include/openssl");
    fs::create_dir_all(&openssl).unwrap();
    fs::write(openssl.join("opensslv.h"), "#define OPENSSL_VERSION_TEXT \"1.1.1k\"\n").unwrap();

    let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));
    pipeline.run_build().await.unwrap();

    fs::write(openssl.join("opensslv.h"), "#define OPENSSL_VERSION_TEXT \"1.1.1s\"\n").unwrap();
    let second = pipeline.run_build().await.unwrap();

    for staged in &second.artifacts {
        assert_eq!(staged.cached, staged.abi != Abi::X86, "{}", staged.abi);
    }
}

#[tokio::test]
async fn test_dependency_bump_forces_rebuild() {
    let env = TestEnv::new();
    let config = env.config();
    Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_build()
        .await
        .unwrap();

    let bumped = env.port_toml().replace("1.1.1s", "3.0.8");
    let config = env.config_from(&bumped, &Overrides::default());
    let second = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_build()
        .await
        .unwrap();
    assert!(second.artifacts.iter().all(|a| !a.cached));
}

#[tokio::test]
async fn test_jobs_limit_serializes_builds() {
    let env = TestEnv::new();
    let overrides = Overrides {
        jobs: Some(1),
        ..Overrides::default()
    };
    let config = env.config_from(&env.port_toml(), &overrides);
    let trace = env.base_dir.join("trace.log");

    let strategy = ScriptStrategy {
        delay: Some(Duration::from_millis(200)),
        trace: Some(trace.clone()),
        ..ScriptStrategy::default()
    };
    Pipeline::with_strategy(&config, Arc::new(strategy))
        .run_build()
        .await
        .unwrap();

    let trace = fs::read_to_string(&trace).unwrap();
    let events: Vec<&str> = trace.lines().collect();
    assert_eq!(events.len(), 2 * Abi::ALL.len(), "{trace}");
    for pair in events.chunks(2) {
        let abi = pair[0].strip_prefix("start ").expect("build started while another ran");
        assert_eq!(pair[1], format!("end {abi}"), "{trace}");
    }
}

#[tokio::test]
async fn test_no_build_starts_after_a_failure() {
    let env = TestEnv::new();
    let overrides = Overrides {
        jobs: Some(1),
        ..Overrides::default()
    };
    let config = env.config_from(&env.port_toml(), &overrides);

    let err = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::failing(&Abi::ALL)))
        .run_build()
        .await
        .unwrap_err();

    // Only the first build ran; the rest were never started.
    assert!(matches!(err, PipelineError::NativeBuildFailure { .. }), "got {err}");
    let logged: Vec<Abi> = Abi::ALL
        .into_iter()
        .filter(|&abi| config.log_path(abi).exists())
        .collect();
    assert_eq!(logged.len(), 1, "logs written for {logged:?}");
}

// =============================================================================
// Assembly
// =============================================================================

#[tokio::test]
async fn test_assembled_package_layout() {
    let env = TestEnv::new();
    let config = env.config();
    let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));

    let output = pipeline.run_build().await.unwrap();
    let package = pipeline.assemble(&output).unwrap();

    let names: Vec<&str> = package.descriptor.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["resipares", "rutil", "resip", "dum"]);

    let prefab = package.aar_dir.join("prefab");
    assert_file_contains(&prefab.join("prefab.json"), "\"schema_version\": 2");
    assert_file_contains(&prefab.join("prefab.json"), "\"openssl\"");
    assert_file_contains(
        &prefab.join("modules/rutil/module.json"),
        "//openssl:crypto",
    );
    assert_file_exists(&prefab.join("modules/rutil/include/rutil/Data.hxx"));

    let abi_dir = prefab.join("modules/dum/libs/android.arm64-v8a");
    assert_file_exists(&abi_dir.join("libdum.so"));
    assert_file_contains(&abi_dir.join("abi.json"), "\"api\": 21");
    assert_file_contains(&abi_dir.join("abi.json"), "\"ndk\": 23");
    assert_file_contains(&abi_dir.join("abi.json"), "\"stl\": \"c++_shared\"");
    assert_file_contains(
        &prefab.join("modules/dum/libs/android.armeabi-v7a/abi.json"),
        "\"api\": 19",
    );

    assert_file_contains(
        &package.aar_dir.join("AndroidManifest.xml"),
        "com.android.ndk.thirdparty.resiprocate",
    );
    assert_file_contains(&package.aar_dir.join("META-INF/LICENSE"), "reSIProcate License");
}

#[tokio::test]
async fn test_manifest_records_external_dependencies() {
    let env = TestEnv::new();
    let config = env.config();
    let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));

    let output = pipeline.run_build().await.unwrap();
    let package = pipeline.assemble(&output).unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&package.manifest).unwrap()).unwrap();
    assert_eq!(manifest["dependencies"]["openssl"], "1.1.1s");

    let rutil = manifest["modules"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "rutil")
        .unwrap();
    assert_eq!(
        rutil["dependencies"],
        serde_json::json!(["//openssl:crypto", "//openssl:ssl"])
    );
}

#[tokio::test]
async fn test_manifest_is_deterministic() {
    let mut manifests = Vec::new();
    for _ in 0..2 {
        let env = TestEnv::new();
        let config = env.config();
        let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));
        let output = pipeline.run_build().await.unwrap();
        let package = pipeline.assemble(&output).unwrap();
        manifests.push(fs::read(&package.manifest).unwrap());
    }
    assert_eq!(manifests[0], manifests[1]);
}

#[tokio::test]
async fn test_missing_module_library() {
    let env = TestEnv::new();
    let config = env.config();
    let strategy = ScriptStrategy {
        omit: vec!["libdum.so"],
        ..ScriptStrategy::default()
    };
    let pipeline = Pipeline::with_strategy(&config, Arc::new(strategy));

    let output = pipeline.run_build().await.unwrap();
    let err = pipeline.assemble(&output).unwrap_err();

    match err {
        PipelineError::MissingArtifact { module, abi, .. } => {
            assert_eq!(module, "dum");
            assert_eq!(abi, Abi::Arm);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.package_dir().exists());
}

#[tokio::test]
async fn test_unresolved_dependency_aborts_before_build() {
    let env = TestEnv::new();
    let port = env.port_toml().replace(
        "dependencies = [\"//openssl:crypto\", \"//openssl:ssl\"]",
        "dependencies = [\"//openssl:crypto\", \"//zlib:z\"]",
    );
    let config = env.config_from(&port, &Overrides::default());

    let err = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_release(true)
        .await
        .unwrap_err();

    match err {
        PipelineError::UnresolvedModuleDependency { module, reference } => {
            assert_eq!(module, "rutil");
            assert_eq!(reference, "//zlib:z");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.work_dir.join("port").exists());
}

#[tokio::test]
async fn test_module_cycle_rejected() {
    let env = TestEnv::new();
    let port = env
        .port_toml()
        .replace("name = \"resipares\"", "name = \"resipares\"\ndependencies = [\":dum\"]")
        .replace("name = \"dum\"", "name = \"dum\"\ndependencies = [\":resip\"]")
        .replace("name = \"resip\"", "name = \"resip\"\ndependencies = [\":resipares\"]");
    let config = env.config_from(&port, &Overrides::default());

    let err = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .descriptor()
        .unwrap_err();
    assert!(matches!(err, PipelineError::DependencyCycle { .. }), "got {err}");
}

// =============================================================================
// Publication
// =============================================================================

#[tokio::test]
async fn test_release_publishes_to_local_repository() {
    if !zip_available() {
        eprintln!("Skipping: zip not installed");
        return;
    }
    let env = TestEnv::new();
    let config = env.config();

    let summary = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()))
        .run_release(true)
        .await
        .unwrap();

    let artifact_dir = env.base_dir.join("out/repository/org/resiprocate/resiprocate");
    let version_dir = artifact_dir.join("1.13.0");
    for file in [
        "resiprocate-1.13.0.aar",
        "resiprocate-1.13.0.aar.sha256",
        "resiprocate-1.13.0.aar.sha512",
        "resiprocate-1.13.0.pom",
        "resiprocate-1.13.0.pom.sha256",
    ] {
        assert_file_exists(&version_dir.join(file));
    }

    let pom = version_dir.join("resiprocate-1.13.0.pom");
    assert_file_contains(&pom, "<packaging>aar</packaging>");
    assert_file_contains(&pom, "<name>The reSIProcate License</name>");
    assert_file_contains(&pom, "<artifactId>openssl</artifactId>");
    assert_file_contains(&pom, "<version>1.1.1s</version>");
    assert_file_contains(&artifact_dir.join("maven-metadata.xml"), "<release>1.13.0</release>");

    let archive = summary.archive.expect("release archive");
    let expected = env.base_dir.join("out/dist/resiprocate-1.13.0.zip");
    assert_eq!(archive, expected.canonicalize().unwrap());
}

#[tokio::test]
async fn test_snapshot_versions_accumulate_in_metadata() {
    if !zip_available() {
        eprintln!("Skipping: zip not installed");
        return;
    }
    let env = TestEnv::new();
    let release = env.config();
    let mut snapshot = release.clone();
    snapshot.snapshot_suffix = "-SNAPSHOT".into();

    for config in [&release, &snapshot] {
        Pipeline::with_strategy(config, Arc::new(ScriptStrategy::default()))
            .run_release(false)
            .await
            .unwrap();
    }

    let metadata = env
        .base_dir
        .join("out/repository/org/resiprocate/resiprocate/maven-metadata.xml");
    assert_file_contains(&metadata, "<latest>1.13.0-SNAPSHOT</latest>");
    assert_file_contains(&metadata, "<release>1.13.0</release>");
    assert_file_contains(&metadata, "<version>1.13.0</version>");
    assert_file_contains(&metadata, "<version>1.13.0-SNAPSHOT</version>");
}

#[tokio::test]
async fn test_remote_repository_rejected_without_writes() {
    let env = TestEnv::new();
    let port = env.port_toml().replace(
        "repository = \"out/repository\"",
        "repository = \"https://maven.example.com/releases\"",
    );
    let config = env.config_from(&port, &Overrides::default());
    let pipeline = Pipeline::with_strategy(&config, Arc::new(ScriptStrategy::default()));

    let output = pipeline.run_build().await.unwrap();
    let package = pipeline.assemble(&output).unwrap();
    let err = pipeline.publish(&package).unwrap_err();

    assert!(matches!(err, PipelineError::PublicationWriteFailure { .. }), "got {err}");
    assert!(!env.base_dir.join("out").exists());
}
