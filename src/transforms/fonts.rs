//! Byte-for-byte copy of static assets (fonts).

use super::{FileTransform, OutputFile, TransformError};
use crate::config::FontsConfig;
use crate::pipeline::discovery::glob_base;
use std::path::{Path, PathBuf};

pub struct CopyTransform {
    base: PathBuf,
    dest: PathBuf,
}

impl CopyTransform {
    pub fn new(config: &FontsConfig) -> Self {
        let base = config.sources.first().map(|p| glob_base(p)).unwrap_or_default();
        Self { base, dest: config.dest.clone() }
    }
}

impl FileTransform for CopyTransform {
    fn transform(&self, root: &Path, source: &Path) -> Result<Vec<OutputFile>, TransformError> {
        let rel = source.strip_prefix(&self.base).unwrap_or(source);
        let bytes = std::fs::read(root.join(source))?;
        Ok(vec![OutputFile::new(self.dest.join(rel), bytes)])
    }
}
