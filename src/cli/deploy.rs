//! `deploy` command.

use super::{load_project, DeployArgs, Project};
use crate::config::CliOverrides;
use crate::deploy;
use crate::log::timestamp;
use std::path::Path;

pub fn run_deploy(config_path: Option<&Path>, args: &DeployArgs) -> Result<(), String> {
    let Project { root, config } =
        load_project(config_path, &CliOverrides::default()).map_err(|e| e.to_string())?;

    if args.dry_run {
        println!("[{}] Deploy dry run...", timestamp());
    } else {
        println!("[{}] Deploying {}...", timestamp(), config.project.name);
    }
    deploy::deploy(&root, &config, args.dry_run).map_err(|e| e.to_string())?;
    if !args.dry_run {
        println!("[{}] Deploy complete", timestamp());
    }
    Ok(())
}
