//! Configure-script based builds (`./configure && make && make install`).

use std::collections::BTreeMap;

use super::{NativeBuildStrategy, TargetContext};
use crate::flags::FeatureFlagSet;
use crate::process::Invocation;

#[derive(Debug, Clone, Default)]
pub struct AutoconfStrategy {
    /// Extra environment from the port file, applied after the toolchain
    /// variables so it can override them.
    extra_env: BTreeMap<String, String>,
}

impl AutoconfStrategy {
    pub fn new(extra_env: BTreeMap<String, String>) -> Self {
        Self { extra_env }
    }

    fn toolchain_env(&self, ctx: &TargetContext) -> Vec<(String, String)> {
        let tc = &ctx.toolchain;
        let sysroot = ctx.target.sysroot.display();
        let mut env = vec![
            ("PATH".to_string(), ctx.tool_path()),
            ("CC".to_string(), tc.clang(&ctx.target).display().to_string()),
            ("CXX".to_string(), tc.clangxx(&ctx.target).display().to_string()),
            ("AR".to_string(), tc.llvm_tool("ar").display().to_string()),
            ("RANLIB".to_string(), tc.llvm_tool("ranlib").display().to_string()),
            ("STRIP".to_string(), tc.llvm_tool("strip").display().to_string()),
            ("CPPFLAGS".to_string(), format!("-fPIC -I{}/include", sysroot)),
            ("LDFLAGS".to_string(), format!("-L{}/lib", sysroot)),
        ];
        for (key, value) in &self.extra_env {
            env.retain(|(k, _)| k != key);
            env.push((key.clone(), value.clone()));
        }
        env
    }
}

impl NativeBuildStrategy for AutoconfStrategy {
    fn kind(&self) -> &str {
        "autoconf"
    }

    fn plan(&self, ctx: &TargetContext, flags: &FeatureFlagSet) -> Vec<Invocation> {
        let env = self.toolchain_env(ctx);
        let with_env = |inv: Invocation| {
            env.iter()
                .fold(inv, |inv, (k, v)| inv.env(k.as_str(), v.as_str()))
        };

        let configure = with_env(
            Invocation::new(
                "configure",
                ctx.source_dir.join("configure").display().to_string(),
                &ctx.build_dir,
            )
            .arg(format!("--host={}", ctx.target.abi.triple()))
            .arg(format!("--prefix={}", ctx.install_dir.display()))
            .args(flags.configure_args()),
        );

        let make = with_env(
            Invocation::new("make", "make", &ctx.build_dir).arg(format!("-j{}", ctx.make_jobs)),
        );

        let install = with_env(Invocation::new("make install", "make", &ctx.build_dir).arg("install"));

        vec![configure, make, install]
    }
}
