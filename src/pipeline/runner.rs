//! The pipeline runner: stage execution, clean, and full builds.
//!
//! A runner owns the project root, the validated configuration, the stage
//! plan, and the freshness index. Stage runs for different stages may happen
//! from different threads in watch mode; the freshness index sits behind a
//! mutex and destinations are disjoint by config validation, so runs never
//! contend on files.

use super::discovery::{discover_sources, source_mtime, DiscoveryError};
use super::freshness::FreshnessIndex;
use super::result::{FileOutcome, PipelineResult, StageResult};
use super::stage::{StageKind, StageOrderError, StagePlan};
use crate::config::SiteConfig;
use crate::transforms::{self, OutputFile, StageTransformer, TransformError};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};
use thiserror::Error;

/// Fatal stage-level error. Per-file transform failures are not errors at
/// this level; they land in the stage result.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stage is not part of the current plan
    #[error("Stage '{0}' is not enabled")]
    NotEnabled(StageKind),
    /// Source discovery failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Transform construction failed (bad shared input)
    #[error("Failed to set up {stage}: {source}")]
    Setup {
        stage: StageKind,
        #[source]
        source: TransformError,
    },
    /// Destination directory could not be prepared
    #[error("Failed to prepare destination '{path}': {source}")]
    Dest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Stage ordering failed
    #[error(transparent)]
    Order(#[from] StageOrderError),
    /// The output root could not be cleaned before a full build
    #[error("Failed to clean output directory: {0}")]
    Clean(#[source] std::io::Error),
}

pub struct PipelineRunner {
    root: PathBuf,
    config: SiteConfig,
    plan: StagePlan,
    freshness: Mutex<FreshnessIndex>,
}

impl PipelineRunner {
    /// Create a runner for a project root and validated configuration.
    pub fn new(root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        let plan = StagePlan::from_config(&config);
        Self { root: root.into(), config, plan, freshness: Mutex::new(FreshnessIndex::new()) }
    }

    /// Disable freshness skips for the lifetime of this runner.
    pub fn with_force(mut self) -> Self {
        self.freshness = Mutex::new(FreshnessIndex::forced());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    /// Delete and recreate the output root.
    ///
    /// The output tree is fully derived, so this is always safe.
    pub fn clean(&self) -> std::io::Result<()> {
        let out = self.root.join(&self.config.project.out);
        match fs::remove_dir_all(&out) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&out)?;
        if let Ok(mut freshness) = self.freshness.lock() {
            freshness.clear();
        }
        Ok(())
    }

    /// Clean the output root, then run every enabled stage in dependency
    /// order.
    ///
    /// A fatal stage error aborts the remaining series; per-file failures
    /// never do.
    pub fn run_full_build(&self) -> Result<PipelineResult, StageError> {
        let start = Instant::now();
        self.clean().map_err(StageError::Clean)?;
        let order: Vec<StageKind> = self.plan.build_order()?.iter().map(|s| s.kind).collect();

        let mut result = PipelineResult::default();
        for kind in order {
            result.stages.push(self.run_stage(kind)?);
        }
        result.elapsed = start.elapsed();
        Ok(result)
    }

    /// Run one stage: discover, skip fresh sources, transform, write.
    pub fn run_stage(&self, kind: StageKind) -> Result<StageResult, StageError> {
        let start = Instant::now();
        let stage = self.plan.stage(kind).ok_or(StageError::NotEnabled(kind))?;

        let sources = discover_sources(&self.root, &stage.sources)?;
        let transformer = transforms::for_stage(kind, &self.root, &self.config)
            .map_err(|source| StageError::Setup { stage: kind, source })?;

        let dest = self.root.join(&stage.dest);
        fs::create_dir_all(&dest)
            .map_err(|source| StageError::Dest { path: stage.dest.clone(), source })?;

        let mut result = StageResult::new(kind);
        match transformer {
            StageTransformer::PerFile(transform) => {
                self.run_per_file(kind, &sources, transform.as_ref(), &mut result);
            }
            StageTransformer::Aggregate(transform) => {
                self.run_aggregate(kind, &sources, transform.as_ref(), &mut result);
            }
        }

        result.elapsed = start.elapsed();
        Ok(result)
    }

    /// Drop freshness records for a stage so its next run rebuilds.
    ///
    /// Used when a watched input outside the source set changes (a partial
    /// template, an SCSS module).
    pub fn invalidate_stage(&self, kind: StageKind) {
        if let Ok(mut freshness) = self.freshness.lock() {
            freshness.invalidate_stage(kind);
        }
    }

    fn is_fresh(&self, kind: StageKind, source: &Path, mtime: SystemTime) -> bool {
        self.freshness.lock().map(|f| f.is_fresh(kind, source, mtime)).unwrap_or(false)
    }

    fn run_per_file(
        &self,
        kind: StageKind,
        sources: &[PathBuf],
        transform: &dyn crate::transforms::FileTransform,
        result: &mut StageResult,
    ) {
        struct FileRun {
            source: PathBuf,
            outcome: FileOutcome,
            artifacts: Vec<PathBuf>,
            mtime: Option<SystemTime>,
        }

        let runs: Vec<FileRun> = sources
            .par_iter()
            .map(|source| {
                // mtime is read before the transform so an edit racing the
                // build marks the source stale on the next pass
                let mtime = source_mtime(&self.root, source).ok();
                if let Some(m) = mtime {
                    if self.is_fresh(kind, source, m) {
                        return FileRun {
                            source: source.clone(),
                            outcome: FileOutcome::Fresh,
                            artifacts: Vec::new(),
                            mtime: None,
                        };
                    }
                }

                match transform
                    .transform(&self.root, source)
                    .and_then(|outputs| self.write_outputs(&outputs))
                {
                    Ok(artifacts) => FileRun {
                        source: source.clone(),
                        outcome: FileOutcome::Built,
                        artifacts,
                        mtime,
                    },
                    Err(e) => FileRun {
                        source: source.clone(),
                        outcome: FileOutcome::Failed(e.to_string()),
                        artifacts: Vec::new(),
                        mtime: None,
                    },
                }
            })
            .collect();

        if let Ok(mut freshness) = self.freshness.lock() {
            for run in &runs {
                if let (FileOutcome::Built, Some(mtime)) = (&run.outcome, run.mtime) {
                    freshness.record(kind, &run.source, mtime);
                }
            }
        }

        for run in runs {
            result.artifacts.extend(run.artifacts);
            result.files.push((run.source, run.outcome));
        }
    }

    fn run_aggregate(
        &self,
        kind: StageKind,
        sources: &[PathBuf],
        transform: &dyn crate::transforms::AggregateTransform,
        result: &mut StageResult,
    ) {
        let mtimes: Vec<(PathBuf, Option<SystemTime>)> = sources
            .iter()
            .map(|s| (s.clone(), source_mtime(&self.root, s).ok()))
            .collect();

        let all_fresh = self.freshness.lock().is_ok_and(|f| {
            f.all_fresh(
                kind,
                mtimes
                    .iter()
                    .filter_map(|(p, m)| m.map(|m| (p.as_path(), m))),
            )
        }) && mtimes.iter().all(|(_, m)| m.is_some());

        if all_fresh && !sources.is_empty() {
            for source in sources {
                result.files.push((source.clone(), FileOutcome::Fresh));
            }
            return;
        }

        match transform
            .transform_all(&self.root, sources)
            .and_then(|outputs| self.write_outputs(&outputs))
        {
            Ok(artifacts) => {
                result.artifacts = artifacts;
                if let Ok(mut freshness) = self.freshness.lock() {
                    for (source, mtime) in &mtimes {
                        if let Some(m) = mtime {
                            freshness.record(kind, source, *m);
                        }
                    }
                }
                for source in sources {
                    result.files.push((source.clone(), FileOutcome::Built));
                }
            }
            Err(e) => {
                // The whole aggregate fails as one unit
                let message = e.to_string();
                for source in sources {
                    result.files.push((source.clone(), FileOutcome::Failed(message.clone())));
                }
            }
        }
    }

    fn write_outputs(&self, outputs: &[OutputFile]) -> Result<Vec<PathBuf>, TransformError> {
        let mut written = Vec::with_capacity(outputs.len());
        for output in outputs {
            let path = self.root.join(&output.rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &output.bytes)?;
            written.push(output.rel.clone());
        }
        Ok(written)
    }
}
