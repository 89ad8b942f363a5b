//! Command-line interface.

pub mod build;
pub mod deploy;
pub mod dev;

use crate::config::{self, CliOverrides, ConfigError, SiteConfig};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "siteforge",
    version,
    about = "Static site asset pipeline with incremental watch rebuilds"
)]
pub struct Cli {
    /// Path to site.toml (default: discovered by walking up from cwd)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove the build directory
    Clean,
    /// Clean and run every stage in dependency order
    Build(BuildArgs),
    /// Build, then rebuild changed stages on file changes
    Watch(BuildArgs),
    /// Build, watch, and serve the build tree with live reload
    Dev(DevArgs),
    /// Sync the build tree to the remote host via rsync
    Deploy(DeployArgs),
}

#[derive(Args, Clone)]
pub struct BuildArgs {
    /// Rebuild everything, ignoring freshness
    #[arg(long)]
    pub force: bool,

    /// Print per-file outcomes
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the output directory
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Override the source directory
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Override image re-encode quality (1-100)
    #[arg(long)]
    pub quality: Option<u8>,
}

#[derive(Args)]
pub struct DevArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Dev server port
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args)]
pub struct DeployArgs {
    /// Show what would be transferred without transferring it
    #[arg(long)]
    pub dry_run: bool,
}

/// A loaded project: its root directory and validated configuration.
pub struct Project {
    pub root: PathBuf,
    pub config: SiteConfig,
}

/// Locate and load the project for a CLI invocation.
pub fn load_project(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<Project, ConfigError> {
    let discovered = match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => config::find_config(),
    };

    let root = discovered
        .as_deref()
        .and_then(config::project_root)
        .map(Path::to_path_buf)
        .map_or_else(|| std::env::current_dir().map_err(ConfigError::Io), Ok)?;

    let mut config = config::load_config(discovered.as_deref())?;
    config::merge_cli_overrides(&mut config, overrides);
    Ok(Project { root, config })
}

impl BuildArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            out: self.out.clone(),
            src: self.src.clone(),
            quality: self.quality,
            port: None,
        }
    }
}

/// Parse arguments and dispatch.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let outcome = match cli.command {
        Commands::Clean => build::run_clean(config_path),
        Commands::Build(args) => build::run_build(config_path, &args),
        Commands::Watch(args) => dev::run_watch(config_path, &args),
        Commands::Dev(args) => dev::run_dev(config_path, &args),
        Commands::Deploy(args) => deploy::run_deploy(config_path, &args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::parse_from(["siteforge", "build", "--force", "--out", "dist"]);
        match cli.command {
            Commands::Build(args) => {
                assert!(args.force);
                assert_eq!(args.out, Some(PathBuf::from("dist")));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_parse_dev_port() {
        let cli = Cli::parse_from(["siteforge", "dev", "--port", "4000"]);
        match cli.command {
            Commands::Dev(args) => assert_eq!(args.port, Some(4000)),
            _ => panic!("expected dev"),
        }
    }

    #[test]
    fn test_parse_global_config_flag() {
        let cli = Cli::parse_from(["siteforge", "clean", "--config", "site.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
    }
}
