//! Watch mode: debounced filesystem events driving partial rebuilds.
//!
//! Filesystem events are debounced by notify-debouncer-mini, forwarded into
//! one explicit channel, and consumed by a dispatch loop. The loop maps each
//! changed path to its owning stage(s) and drives a per-stage state machine:
//! reruns of the same stage are serialized, events arriving mid-build
//! collapse into a single pending follow-up run, and distinct stages rebuild
//! concurrently on worker threads (their destinations are disjoint).

use crate::config::SiteConfig;
use crate::log::timestamp;
use crate::pipeline::{glob_base, PipelineRunner, StageKind, StageResult};
use crate::server::LiveReload;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Watch mode error
#[derive(Debug, Error)]
pub enum WatchError {
    /// Filesystem watcher setup failed
    #[error("Failed to set up file watcher: {0}")]
    Notify(#[from] notify::Error),
    /// No watchable directories exist under the project root
    #[error("Nothing to watch: no watch roots exist under {0}")]
    NoWatchRoots(PathBuf),
}

/// Cooperative shutdown flag shared between the dispatch loop and its
/// owner. In-flight stage runs complete before the loop exits.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Messages consumed by the dispatch loop.
enum WatchMessage {
    /// Debounced set of changed absolute paths
    Changed(Vec<PathBuf>),
    /// A stage worker finished
    StageDone(StageKind, Result<StageResult, String>),
}

/// Per-stage dispatch state.
#[derive(Debug, Clone, Copy, Default)]
struct StageState {
    /// A worker is currently running this stage
    running: bool,
    /// At least one change arrived while the stage was running
    pending: bool,
    /// The last run hit a fatal error; the next change event retries
    unavailable: bool,
}

/// The dispatch state machine, separated from I/O so coalescing and
/// serialization are testable without a real watcher.
#[derive(Debug, Default)]
pub struct DispatchState {
    stages: HashMap<StageKind, StageState>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record changes for a set of stages; returns the stages that should
    /// start a run now. Stages already running absorb the change into a
    /// single pending flag. A stage marked unavailable by an earlier fatal
    /// error gets a fresh attempt, so correcting the bad input revives it.
    pub fn on_change(&mut self, kinds: &[StageKind]) -> Vec<StageKind> {
        let mut start = Vec::new();
        for &kind in kinds {
            let state = self.stages.entry(kind).or_default();
            if state.running {
                state.pending = true;
            } else {
                state.unavailable = false;
                state.running = true;
                start.push(kind);
            }
        }
        start
    }

    /// Record a finished run; returns true when a pending change requires
    /// exactly one follow-up run (which is considered started).
    pub fn on_done(&mut self, kind: StageKind, fatal: bool) -> bool {
        let state = self.stages.entry(kind).or_default();
        state.running = false;
        if fatal {
            state.unavailable = true;
            state.pending = false;
            return false;
        }
        if state.pending {
            state.pending = false;
            state.running = true;
            return true;
        }
        false
    }

    /// Forget a follow-up run that will not be started (shutdown path).
    pub fn abandon(&mut self, kind: StageKind) {
        if let Some(state) = self.stages.get_mut(&kind) {
            state.running = false;
            state.pending = false;
        }
    }

    /// Whether any stage run is still in flight.
    pub fn any_running(&self) -> bool {
        self.stages.values().any(|s| s.running)
    }

    pub fn is_unavailable(&self, kind: StageKind) -> bool {
        self.stages.get(&kind).is_some_and(|s| s.unavailable)
    }
}

/// Directories the filesystem watcher must observe: the literal prefixes of
/// every stage watch pattern, deduplicated and restricted to existing dirs.
pub fn watch_roots(root: &Path, config: &SiteConfig) -> Vec<PathBuf> {
    let plan = crate::pipeline::StagePlan::from_config(config);
    let mut roots = BTreeSet::new();
    for stage in plan.stages() {
        for pattern in &stage.watch {
            let base = glob_base(pattern);
            if root.join(&base).is_dir() {
                roots.insert(base);
            }
        }
    }
    // Drop roots nested under another root
    let all: Vec<PathBuf> = roots.iter().cloned().collect();
    all.iter()
        .filter(|r| !all.iter().any(|other| *r != other && r.starts_with(other)))
        .cloned()
        .collect()
}

/// Run the watch loop until the token triggers.
///
/// Assumes an initial full build has already happened; this only reacts to
/// changes. After each successful stage rerun the live-reload notifier is
/// pinged.
pub fn watch(
    runner: Arc<PipelineRunner>,
    token: ShutdownToken,
    reload: Option<Arc<LiveReload>>,
) -> Result<(), WatchError> {
    let roots = watch_roots(runner.root(), runner.config());
    if roots.is_empty() {
        return Err(WatchError::NoWatchRoots(runner.root().to_path_buf()));
    }

    let (msg_tx, msg_rx) = mpsc::channel::<WatchMessage>();

    // The debouncer owns its own channel type; a forwarder thread converts
    // its batches into WatchMessages
    let (debounce_tx, debounce_rx) = mpsc::channel();
    let debounce = Duration::from_millis(u64::from(runner.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce, debounce_tx)?;
    for root in &roots {
        debouncer.watcher().watch(&runner.root().join(root), RecursiveMode::Recursive)?;
    }

    {
        let msg_tx = msg_tx.clone();
        thread::spawn(move || {
            while let Ok(result) = debounce_rx.recv() {
                if let Ok(events) = result {
                    let paths: Vec<PathBuf> =
                        events.into_iter().map(|e| e.path).collect();
                    if msg_tx.send(WatchMessage::Changed(paths)).is_err() {
                        break;
                    }
                }
            }
        });
    }

    for root in &roots {
        println!("[{}] Watching {} for changes...", timestamp(), root.display());
    }

    let mut state = DispatchState::new();
    loop {
        if token.is_triggered() && !state.any_running() {
            break;
        }

        let message = match msg_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(m) => m,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match message {
            WatchMessage::Changed(paths) => {
                if token.is_triggered() {
                    continue;
                }
                let kinds = resolve_changes(&runner, &paths);
                if kinds.is_empty() {
                    continue;
                }
                if runner.config().watch.clear_screen {
                    clear_screen();
                }
                for kind in state.on_change(&kinds) {
                    spawn_stage(&runner, kind, msg_tx.clone());
                }
            }
            WatchMessage::StageDone(kind, outcome) => {
                let fatal = report_stage(kind, &outcome, reload.as_deref());
                if state.on_done(kind, fatal) {
                    if token.is_triggered() {
                        state.abandon(kind);
                    } else {
                        spawn_stage(&runner, kind, msg_tx.clone());
                    }
                } else if fatal {
                    eprintln!(
                        "[{}] {} paused after a fatal error; the next change retries it",
                        timestamp(),
                        kind
                    );
                }
            }
        }
    }

    Ok(())
}

fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Map changed absolute paths to the stages that must rerun, invalidating
/// stage freshness when a watched non-source input changed.
fn resolve_changes(runner: &PipelineRunner, paths: &[PathBuf]) -> Vec<StageKind> {
    let mut kinds = Vec::new();
    for path in paths {
        let rel = match path.strip_prefix(runner.root()) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let owners = runner.plan().stages_for_path(rel);
        if owners.is_empty() {
            continue;
        }
        if let Some(name) = rel.file_name() {
            println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
        }
        for kind in owners {
            if let Some(stage) = runner.plan().stage(kind) {
                if !stage.matches_source(rel) {
                    runner.invalidate_stage(kind);
                }
            }
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
    }
    kinds
}

fn spawn_stage(runner: &Arc<PipelineRunner>, kind: StageKind, tx: mpsc::Sender<WatchMessage>) {
    println!("[{}] Building {}...", timestamp(), kind);
    let runner = Arc::clone(runner);
    thread::spawn(move || {
        let outcome = runner.run_stage(kind).map_err(|e| e.to_string());
        // The loop may already be gone during shutdown
        let _ = tx.send(WatchMessage::StageDone(kind, outcome));
    });
}

/// Log a finished stage run; returns true when the error was fatal.
fn report_stage(
    kind: StageKind,
    outcome: &Result<StageResult, String>,
    reload: Option<&LiveReload>,
) -> bool {
    match outcome {
        Ok(result) => {
            for (path, message) in result.failures() {
                eprintln!("[{}] {} FAILED {}: {}", timestamp(), kind, path.display(), message);
            }
            println!(
                "[{}] {}: {} built, {} fresh, {} failed in {}",
                timestamp(),
                kind,
                result.built_count(),
                result.fresh_count(),
                result.failed_count(),
                crate::log::format_duration(result.elapsed),
            );
            if let Some(reload) = reload {
                reload.bump();
            }
            false
        }
        Err(message) => {
            eprintln!("[{}] {} fatal error: {}", timestamp(), kind, message);
            true
        }
    }
}
