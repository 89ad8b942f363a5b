//! Result types for pipeline runs.

use super::stage::StageKind;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of transforming a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was transformed and its artifacts written
    Built,
    /// The artifacts were already up to date
    Fresh,
    /// The transform failed; the message describes why
    Failed(String),
}

impl FileOutcome {
    /// Whether this outcome counts as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }
}

/// Result of running one stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Which stage ran
    pub kind: StageKind,
    /// Per-source outcomes, in discovery order
    pub files: Vec<(PathBuf, FileOutcome)>,
    /// Artifacts written during this run, relative to the project root
    pub artifacts: Vec<PathBuf>,
    /// Wall-clock duration of the stage
    pub elapsed: Duration,
}

impl StageResult {
    /// Create an empty result for a stage.
    pub fn new(kind: StageKind) -> Self {
        Self { kind, files: Vec::new(), artifacts: Vec::new(), elapsed: Duration::ZERO }
    }

    /// Number of sources actually transformed.
    pub fn built_count(&self) -> usize {
        self.files.iter().filter(|(_, o)| *o == FileOutcome::Built).count()
    }

    /// Number of sources skipped as fresh.
    pub fn fresh_count(&self) -> usize {
        self.files.iter().filter(|(_, o)| *o == FileOutcome::Fresh).count()
    }

    /// Number of sources that failed to transform.
    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|(_, o)| o.is_failure()).count()
    }

    /// Failure messages paired with the source they came from.
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.files.iter().filter_map(|(path, outcome)| match outcome {
            FileOutcome::Failed(msg) => Some((path, msg.as_str())),
            _ => None,
        })
    }
}

/// Aggregate result of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Per-stage results, in execution order
    pub stages: Vec<StageResult>,
    /// Total wall-clock duration of the run
    pub elapsed: Duration,
}

impl PipelineResult {
    /// Total number of sources transformed across all stages.
    pub fn total_built(&self) -> usize {
        self.stages.iter().map(|s| s.built_count()).sum()
    }

    /// Total number of sources skipped as fresh.
    pub fn total_fresh(&self) -> usize {
        self.stages.iter().map(|s| s.fresh_count()).sum()
    }

    /// Total number of per-file failures.
    pub fn total_failed(&self) -> usize {
        self.stages.iter().map(|s| s.failed_count()).sum()
    }

    /// Whether the run completed with no per-file failures.
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0
    }

    /// One-line summary suitable for the end-of-run log line.
    pub fn summary(&self) -> String {
        if self.is_clean() {
            format!(
                "{} built, {} fresh in {:.2}s",
                self.total_built(),
                self.total_fresh(),
                self.elapsed.as_secs_f64()
            )
        } else {
            format!(
                "{} built, {} fresh, {} FAILED in {:.2}s",
                self.total_built(),
                self.total_fresh(),
                self.total_failed(),
                self.elapsed.as_secs_f64()
            )
        }
    }
}
