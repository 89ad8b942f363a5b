//! Stage transforms.
//!
//! Each transform wraps an external capability (template engine, SCSS
//! compiler, CSS post-processor, image codec) behind a small trait so the
//! pipeline runner stays ignorant of file formats. Transforms read sources
//! and return in-memory output files; the runner owns all destination
//! writes.

pub mod fonts;
pub mod images;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod templates;

use crate::config::SiteConfig;
use crate::pipeline::stage::StageKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One file produced by a transform, not yet written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Destination path relative to the project root
    pub rel: PathBuf,
    /// File content
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(rel: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self { rel: rel.into(), bytes }
    }
}

/// Error from a transform.
///
/// During a stage run these are caught per file and downgraded to a failed
/// file outcome; only transform construction errors are fatal to a stage.
#[derive(Debug, Error)]
pub enum TransformError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Template registration or rendering error
    #[error("Template error in {path}: {message}")]
    Template { path: PathBuf, message: String },
    /// SCSS compilation error
    #[error("SCSS error: {0}")]
    Scss(String),
    /// CSS post-processing error
    #[error("CSS error: {0}")]
    Css(String),
    /// Image decode or encode error
    #[error("Image error in {path}: {message}")]
    Image { path: PathBuf, message: String },
    /// Sprite assembly error
    #[error("Sprite error: {0}")]
    Sprite(String),
    /// Template data file error
    #[error("Data file error: {0}")]
    Data(String),
}

/// A transform applied independently to each source file.
pub trait FileTransform: Send + Sync {
    /// Transform one source (project-relative) into zero or more outputs.
    fn transform(&self, root: &Path, source: &Path) -> Result<Vec<OutputFile>, TransformError>;
}

/// A transform that consumes a stage's whole source set at once.
pub trait AggregateTransform: Send + Sync {
    /// Transform the full (sorted) source list into outputs.
    fn transform_all(
        &self,
        root: &Path,
        sources: &[PathBuf],
    ) -> Result<Vec<OutputFile>, TransformError>;
}

/// The transform backing one stage.
pub enum StageTransformer {
    PerFile(Box<dyn FileTransform>),
    Aggregate(Box<dyn AggregateTransform>),
}

/// Construct the transform for a stage from configuration.
///
/// Construction reads shared inputs (partial templates, the navigation data
/// file); a failure here is fatal for the stage, unlike per-file transform
/// errors.
pub fn for_stage(
    kind: StageKind,
    root: &Path,
    config: &SiteConfig,
) -> Result<StageTransformer, TransformError> {
    Ok(match kind {
        StageKind::Templates => StageTransformer::PerFile(Box::new(
            templates::TemplateTransform::new(root, &config.templates)?,
        )),
        StageKind::Styles => {
            StageTransformer::PerFile(Box::new(styles::StyleTransform::new(root, &config.styles)))
        }
        StageKind::Scripts => {
            StageTransformer::Aggregate(Box::new(scripts::ScriptBundle::new(&config.scripts)))
        }
        StageKind::Images => {
            StageTransformer::PerFile(Box::new(images::ImageTransform::new(&config.images)))
        }
        StageKind::Fonts => {
            StageTransformer::PerFile(Box::new(fonts::CopyTransform::new(&config.fonts)))
        }
        StageKind::Sprite => {
            StageTransformer::Aggregate(Box::new(sprite::SvgSprite::new(&config.sprite)?))
        }
    })
}
