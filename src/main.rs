//! ndkport - Android NDK port packager.
//!
//! Cross-compiles a C/C++ library for every Android ABI and publishes it as a
//! Prefab AAR to a Maven repository:
//! - Source snapshot acquisition
//! - Parallel per-ABI native builds (autoconf or CMake)
//! - Prefab package assembly
//! - Maven publication and release archive

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use ndkport::commands;
use ndkport::config::{Config, Overrides, PipelineConfig, PortConfig, DEFAULT_PORT_FILE};
use ndkport::target::Abi;

#[derive(Parser)]
#[command(name = "ndkport")]
#[command(about = "Android NDK port packager")]
#[command(
    after_help = "QUICK START:\n  ndkport preflight  Check NDK, tools and inputs\n  ndkport release    Build, package and publish\n  ndkport show flags Show the build system flags\n  ndkport clean      Remove build outputs"
)]
struct Cli {
    /// Port definition (default: PORT_FILE or ports/resiprocate.toml)
    #[arg(long, global = true)]
    port: Option<PathBuf>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Build only these ABIs (repeatable, default: all configured)
    #[arg(long = "abi")]
    abis: Vec<Abi>,

    /// Concurrent ABI builds
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Per-ABI timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Rebuild even if inputs are unchanged
    #[arg(long)]
    force: bool,
}

impl BuildArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            abis: self.abis.clone(),
            jobs: self.jobs,
            timeout: self.timeout.map(Duration::from_secs),
            force: self.force,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build every ABI, assemble the AAR and publish it
    Release {
        #[command(flatten)]
        build: BuildArgs,

        /// Skip the release archive
        #[arg(long)]
        no_dist: bool,
    },

    /// Build native libraries only (no packaging)
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Run preflight checks (verify NDK, tools and inputs before a release)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Clean build outputs (default: preserves source and repository)
    Clean {
        #[command(subcommand)]
        what: Option<CleanTarget>,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show resolved configuration
    Config,
    /// Show feature flags as passed to configure/cmake
    Flags {
        /// Show the complete command plan for this ABI instead
        #[arg(long)]
        abi: Option<Abi>,
    },
    /// Show the package manifest (modules and dependencies)
    Manifest,
}

#[derive(Subcommand)]
enum CleanTarget {
    /// Clean per-ABI build trees, logs and the assembled package
    Build,
    /// Clean the local repository and release archives
    Repository,
    /// Clean everything
    All,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ndkport=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_dir = std::env::current_dir().context("Cannot determine working directory")?;

    // Load .env if present
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);
    let env = Config::load(&base_dir);

    let port_file = cli
        .port
        .clone()
        .or_else(|| env.port_file.clone())
        .unwrap_or_else(|| base_dir.join(DEFAULT_PORT_FILE));
    let port = PortConfig::load(&port_file)?;

    let overrides = match &cli.command {
        Commands::Release { build, .. } | Commands::Build { build } => build.overrides(),
        _ => Overrides::default(),
    };
    let config = PipelineConfig::resolve(&base_dir, &env, port_file, port, &overrides)?;

    match cli.command {
        Commands::Release { no_dist, .. } => {
            commands::cmd_release(&config, no_dist)?;
        }

        Commands::Build { .. } => {
            commands::cmd_build(&config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Flags { abi } => commands::show::ShowTarget::Flags { abi },
                ShowTarget::Manifest => commands::show::ShowTarget::Manifest,
            };
            commands::cmd_show(&config, show_target)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Clean { what } => {
            let clean_target = match what {
                None | Some(CleanTarget::Build) => commands::clean::CleanTarget::Build,
                Some(CleanTarget::Repository) => commands::clean::CleanTarget::Repository,
                Some(CleanTarget::All) => commands::clean::CleanTarget::All,
            };
            commands::cmd_clean(&config, clean_target)?;
        }
    }

    Ok(())
}
