//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `release` - Build, assemble and publish the package
//! - `build` - Build native libraries only
//! - `show` - Display configuration, flags and the package manifest
//! - `preflight` - Run preflight checks
//! - `clean` - Remove build outputs

pub mod build;
pub mod clean;
mod preflight;
pub mod release;
pub mod show;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use preflight::cmd_preflight;
pub use release::cmd_release;
pub use show::cmd_show;
