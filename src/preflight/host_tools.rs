//! Host tool availability checks.

use crate::config::{PortConfig, StrategyKind};
use crate::process;

use super::types::CheckResult;

/// Check host tools are installed.
pub fn check_host_tools(port: &PortConfig) -> Vec<CheckResult> {
    let mut results = Vec::new();

    // Required regardless of strategy
    let required_tools = [
        ("tar", "tar", "Required to unpack the source snapshot"),
        ("zip", "zip", "Required to pack the AAR and the release archive"),
        ("sh", "bash", "Required to run configure scripts"),
    ];
    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose));
    }

    let strategy = port.build.strategy;
    let uses_ninja = strategy == StrategyKind::Cmake && port.cmake.generator == "Ninja";
    let strategy_tools = [
        ("make", "make", strategy == StrategyKind::Autoconf),
        ("cmake", "cmake", strategy == StrategyKind::Cmake),
        ("ninja", "ninja-build", uses_ninja),
    ];
    for (tool, package, needed) in strategy_tools {
        if needed {
            let purpose = format!("Required by the {} strategy", strategy.name());
            results.push(check_tool_exists(tool, package, &purpose));
        } else {
            results.push(CheckResult::skip(
                tool,
                &format!("not used by the {} strategy", strategy.name()),
            ));
        }
    }

    results
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, package: &str, purpose: &str) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path),
        None => CheckResult::fail(
            tool,
            &format!("Not found. Install '{}' package. {}", package, purpose),
        ),
    }
}
