//! `watch` and `dev` commands.

use super::{build, BuildArgs, DevArgs};
use crate::server::{DevServer, LiveReload};
use crate::watch::{self, ShutdownToken};
use std::path::Path;
use std::sync::Arc;
use std::thread;

pub fn run_watch(config_path: Option<&Path>, args: &BuildArgs) -> Result<(), String> {
    let runner = build::make_runner(config_path, args)?;
    build::full_build(&runner, args.verbose)?;

    let token = ShutdownToken::new();
    install_interrupt_handler(&token);
    watch::watch(runner, token, None).map_err(|e| e.to_string())
}

/// Turn Ctrl-C into a cooperative shutdown so in-flight stage runs finish
/// before the process exits.
fn install_interrupt_handler(token: &ShutdownToken) {
    let token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || token.trigger()) {
        eprintln!("Warning: could not install Ctrl-C handler: {}", e);
    }
}

pub fn run_dev(config_path: Option<&Path>, args: &DevArgs) -> Result<(), String> {
    let runner = build::make_runner(config_path, &args.build)?;
    build::full_build(&runner, args.build.verbose)?;

    let reload = Arc::new(LiveReload::new());
    let port = args.port.unwrap_or(runner.config().server.port);
    let server = DevServer::new(
        runner.root().join(&runner.config().project.out),
        port,
        Arc::clone(&reload),
    );

    let token = ShutdownToken::new();
    install_interrupt_handler(&token);
    let watch_token = token.clone();
    let watch_runner = Arc::clone(&runner);
    let watcher = thread::spawn(move || watch::watch(watch_runner, watch_token, Some(reload)));

    let result = server.run(&token).map_err(|e| e.to_string());
    token.trigger();
    match watcher.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => eprintln!("Watcher error: {}", e),
        Err(_) => eprintln!("Watcher thread panicked"),
    }
    result
}
