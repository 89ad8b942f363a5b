//! `clean` and `build` commands.

use super::{load_project, BuildArgs, Project};
use crate::config::CliOverrides;
use crate::log::{format_duration, timestamp};
use crate::pipeline::{FileOutcome, PipelineRunner, StageResult};
use std::path::Path;
use std::sync::Arc;

pub fn run_clean(config_path: Option<&Path>) -> Result<(), String> {
    let project = load_project(config_path, &CliOverrides::default()).map_err(|e| e.to_string())?;
    let runner = PipelineRunner::new(&project.root, project.config);
    runner.clean().map_err(|e| format!("Failed to clean: {}", e))?;
    println!("[{}] Cleaned {}", timestamp(), runner.config().project.out.display());
    Ok(())
}

pub fn run_build(config_path: Option<&Path>, args: &BuildArgs) -> Result<(), String> {
    let runner = make_runner(config_path, args)?;
    full_build(&runner, args.verbose)
}

/// Construct the runner for build-flavored commands (build, watch, dev).
pub fn make_runner(
    config_path: Option<&Path>,
    args: &BuildArgs,
) -> Result<Arc<PipelineRunner>, String> {
    let Project { root, config } =
        load_project(config_path, &args.overrides()).map_err(|e| e.to_string())?;
    let mut runner = PipelineRunner::new(root, config);
    if args.force {
        runner = runner.with_force();
    }
    Ok(Arc::new(runner))
}

/// Run every stage from a clean output root, print the outcome. Per-file
/// failures are listed on stderr but do not fail the command; fatal stage
/// errors do.
pub fn full_build(runner: &PipelineRunner, verbose: bool) -> Result<(), String> {
    println!("[{}] Building {}...", timestamp(), runner.config().project.name);
    let result = runner.run_full_build().map_err(|e| e.to_string())?;

    for stage in &result.stages {
        print_stage(stage, verbose);
    }
    if result.is_clean() {
        println!("[{}] Build complete: {}", timestamp(), result.summary());
    } else {
        eprintln!("[{}] Build finished with warnings: {}", timestamp(), result.summary());
    }
    Ok(())
}

fn print_stage(result: &StageResult, verbose: bool) {
    println!(
        "[{}] {}: {} built, {} fresh, {} failed in {}",
        timestamp(),
        result.kind,
        result.built_count(),
        result.fresh_count(),
        result.failed_count(),
        format_duration(result.elapsed),
    );
    if verbose {
        for (path, outcome) in &result.files {
            if !matches!(outcome, FileOutcome::Failed(_)) {
                println!("    {} {:?}", path.display(), outcome);
            }
        }
    }
    for (path, message) in result.failures() {
        eprintln!("[{}] {} FAILED {}: {}", timestamp(), result.kind, path.display(), message);
    }
}
