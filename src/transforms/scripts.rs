//! Script bundling: concatenation of the stage's source set into one file.

use super::{AggregateTransform, OutputFile, TransformError};
use crate::config::ScriptsConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ScriptBundle {
    dest: PathBuf,
    bundle: String,
}

impl ScriptBundle {
    pub fn new(config: &ScriptsConfig) -> Self {
        Self { dest: config.dest.clone(), bundle: config.bundle.clone() }
    }
}

impl AggregateTransform for ScriptBundle {
    fn transform_all(
        &self,
        root: &Path,
        sources: &[PathBuf],
    ) -> Result<Vec<OutputFile>, TransformError> {
        let mut out = String::new();
        for rel in sources {
            let content = fs::read_to_string(root.join(rel))?;
            out.push_str(&content);
            // A file missing its trailing newline must not glue statements
            // onto the next file's first line
            if !content.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(vec![OutputFile::new(self.dest.join(&self.bundle), out.into_bytes())])
    }
}
