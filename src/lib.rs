//! siteforge: a static-site asset pipeline.
//!
//! Source trees of templates, SCSS, scripts, images, and fonts are compiled
//! into a disposable `build/` directory by a set of stages with disjoint
//! destinations. The crate supports one-shot builds, incremental watch mode
//! with debounced partial rebuilds, a dev server with live reload, and
//! rsync deployment.
//!
//! Heavy lifting is delegated: tera renders templates, grass compiles SCSS,
//! lightningcss prefixes and minifies, the image crate re-encodes raster
//! variants. The crate's own core is the pipeline orchestrator in
//! [`pipeline`].

pub mod cli;
pub mod config;
pub mod deploy;
pub mod log;
pub mod pipeline;
pub mod server;
pub mod transforms;
pub mod watch;

pub use config::{SiteConfig, ConfigError};
pub use pipeline::{
    FileOutcome, PipelineResult, PipelineRunner, StageError, StageKind, StagePlan, StageResult,
};
pub use watch::{DispatchState, ShutdownToken, WatchError};
