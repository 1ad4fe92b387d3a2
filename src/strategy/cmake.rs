//! CMake based builds using the NDK's toolchain file.

use super::{NativeBuildStrategy, TargetContext};
use crate::flags::FeatureFlagSet;
use crate::process::Invocation;

#[derive(Debug, Clone)]
pub struct CmakeStrategy {
    generator: String,
    build_type: String,
}

impl CmakeStrategy {
    pub fn new(generator: &str, build_type: &str) -> Self {
        Self {
            generator: generator.to_string(),
            build_type: build_type.to_string(),
        }
    }
}

impl Default for CmakeStrategy {
    fn default() -> Self {
        Self::new("Ninja", "RelWithDebInfo")
    }
}

impl NativeBuildStrategy for CmakeStrategy {
    fn kind(&self) -> &str {
        "cmake"
    }

    fn plan(&self, ctx: &TargetContext, flags: &FeatureFlagSet) -> Vec<Invocation> {
        let build_dir = ctx.build_dir.display().to_string();
        let sysroot = ctx.target.sysroot.display();

        let configure = Invocation::new("cmake configure", "cmake", &ctx.build_dir)
            .env("PATH", ctx.tool_path())
            .args(["-S".to_string(), ctx.source_dir.display().to_string()])
            .args(["-B".to_string(), build_dir.clone()])
            .args(["-G".to_string(), self.generator.clone()])
            .arg(format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                ctx.toolchain.cmake_toolchain_file().display()
            ))
            .arg(format!("-DANDROID_ABI={}", ctx.target.abi.name()))
            .arg(format!("-DANDROID_PLATFORM=android-{}", ctx.target.api))
            .arg(format!("-DCMAKE_BUILD_TYPE={}", self.build_type))
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", ctx.install_dir.display()))
            .arg(format!("-DCMAKE_FIND_ROOT_PATH={}", sysroot))
            .arg(format!("-DCMAKE_C_FLAGS=-I{}/include", sysroot))
            .arg(format!("-DCMAKE_CXX_FLAGS=-I{}/include", sysroot))
            .arg(format!("-DCMAKE_SHARED_LINKER_FLAGS=-L{}/lib", sysroot))
            .args(flags.cmake_defines());

        let build = Invocation::new("cmake build", "cmake", &ctx.build_dir)
            .env("PATH", ctx.tool_path())
            .args(["--build".to_string(), build_dir.clone()])
            .args(["--parallel".to_string(), ctx.make_jobs.to_string()]);

        let install = Invocation::new("cmake install", "cmake", &ctx.build_dir)
            .env("PATH", ctx.tool_path())
            .args(["--install".to_string(), build_dir]);

        vec![configure, build, install]
    }
}
