//! Native build strategies.
//!
//! A strategy describes WHAT to run for one ABI as a list of [`Invocation`]s;
//! the build driver decides HOW (logging, timeouts, concurrency). One
//! strategy is selected for the whole package.
//!
//! ```text
//! AutoconfStrategy::plan(ctx, flags)     CmakeStrategy::plan(ctx, flags)
//!   configure --host=... <flags>           cmake -S -B -G Ninja -D<flags>
//!   make -jN                               cmake --build --parallel N
//!   make install                           cmake --install
//! ```

mod autoconf;
mod cmake;

pub use autoconf::AutoconfStrategy;
pub use cmake::CmakeStrategy;

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{PipelineConfig, PortConfig, StrategyKind};
use crate::flags::FeatureFlagSet;
use crate::process::Invocation;
use crate::target::{BuildTarget, Toolchain};

/// Everything a strategy needs to know about one ABI build.
#[derive(Debug, Clone)]
pub struct TargetContext {
    pub target: BuildTarget,
    pub toolchain: Toolchain,
    /// Extracted source tree, shared read-only by every ABI.
    pub source_dir: PathBuf,
    /// Out-of-tree build directory for this ABI.
    pub build_dir: PathBuf,
    /// Staging prefix (`include/`, `lib/`) for this ABI.
    pub install_dir: PathBuf,
    pub log_path: PathBuf,
    /// Parallelism inside this build (`make -j`).
    pub make_jobs: usize,
}

impl TargetContext {
    pub fn new(config: &PipelineConfig, toolchain: &Toolchain, target: BuildTarget) -> Self {
        let port_dir = config.port_dir(target.abi);
        Self {
            log_path: config.log_path(target.abi),
            source_dir: config.source_dir(),
            build_dir: port_dir.join("build"),
            install_dir: port_dir.join("install"),
            toolchain: toolchain.clone(),
            make_jobs: config.make_jobs,
            target,
        }
    }

    /// `PATH` with the NDK's LLVM tools first.
    pub fn tool_path(&self) -> String {
        let mut path = self.toolchain.bin_dir().to_string_lossy().into_owned();
        if let Ok(existing) = std::env::var("PATH") {
            path.push(':');
            path.push_str(&existing);
        }
        path
    }
}

/// A way of driving the wrapped library's own build system.
pub trait NativeBuildStrategy: Send + Sync {
    /// Name used in logs and rebuild fingerprints.
    fn kind(&self) -> &str;

    /// Commands that configure, compile and install one ABI into
    /// `ctx.install_dir`, in order.
    fn plan(&self, ctx: &TargetContext, flags: &FeatureFlagSet) -> Vec<Invocation>;
}

/// The strategy selected by the port file.
pub fn for_port(port: &PortConfig) -> Arc<dyn NativeBuildStrategy> {
    match port.build.strategy {
        StrategyKind::Autoconf => Arc::new(AutoconfStrategy::new(port.autoconf.env.clone())),
        StrategyKind::Cmake => Arc::new(CmakeStrategy::new(
            &port.cmake.generator,
            &port.cmake.build_type,
        )),
    }
}
