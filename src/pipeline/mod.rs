//! The pipeline orchestrator.
//!
//! Stages are declared in [`stage`], discovered sources in [`discovery`],
//! incremental skips in [`freshness`], run outcomes in [`result`], and the
//! runner itself in [`runner`].

pub mod discovery;
pub mod freshness;
pub mod result;
pub mod runner;
pub mod stage;

pub use discovery::{discover_sources, glob_base, source_mtime, DiscoveryError};
pub use freshness::FreshnessIndex;
pub use result::{FileOutcome, PipelineResult, StageResult};
pub use runner::{PipelineRunner, StageError};
pub use stage::{stages_from_config, Stage, StageKind, StageOrderError, StagePlan};
