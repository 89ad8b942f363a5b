//! Template compilation via tera.
//!
//! Partial templates (layouts, blocks) are registered once at construction;
//! page templates are added and rendered per file. The navigation data file
//! is parsed once and injected into every render context as `nav`.

use super::{FileTransform, OutputFile, TransformError};
use crate::config::TemplatesConfig;
use crate::pipeline::discovery::discover_sources;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tera::{Context, Tera};

pub struct TemplateTransform {
    dest: PathBuf,
    nav: serde_json::Value,
    // add_raw_template needs &mut even during parallel rendering
    tera: Mutex<Tera>,
}

impl TemplateTransform {
    /// Set up the engine: register partials, parse the navigation data.
    pub fn new(root: &Path, config: &TemplatesConfig) -> Result<Self, TransformError> {
        let mut tera = Tera::default();

        let partials = discover_sources(root, &config.partials).map_err(|e| {
            TransformError::Template {
                path: PathBuf::from("partials"),
                message: e.to_string(),
            }
        })?;
        for rel in &partials {
            let content = fs::read_to_string(root.join(rel))?;
            tera.add_raw_template(&template_name(rel), &content).map_err(|e| {
                TransformError::Template { path: rel.clone(), message: render_message(&e) }
            })?;
        }

        let nav = load_nav_data(root, &config.data)?;

        Ok(Self { dest: config.dest.clone(), nav, tera: Mutex::new(tera) })
    }
}

impl FileTransform for TemplateTransform {
    fn transform(&self, root: &Path, source: &Path) -> Result<Vec<OutputFile>, TransformError> {
        let content = fs::read_to_string(root.join(source))?;
        let name = template_name(source);
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());

        let mut context = Context::new();
        context.insert("nav", &self.nav);
        context.insert("page", &stem);

        let html = {
            let mut tera = self.tera.lock().map_err(|_| TransformError::Template {
                path: source.to_path_buf(),
                message: "template engine lock poisoned by an earlier panic".to_string(),
            })?;
            tera.add_raw_template(&name, &content).map_err(|e| TransformError::Template {
                path: source.to_path_buf(),
                message: render_message(&e),
            })?;
            tera.render(&name, &context).map_err(|e| TransformError::Template {
                path: source.to_path_buf(),
                message: render_message(&e),
            })?
        };

        Ok(vec![OutputFile::new(self.dest.join(format!("{}.html", stem)), html.into_bytes())])
    }
}

/// Template name used for registration and `{% extends %}` references:
/// the source path relative to the `src/` tree.
fn template_name(rel: &Path) -> String {
    let name = rel.strip_prefix("src").unwrap_or(rel);
    name.to_string_lossy().replace('\\', "/")
}

fn load_nav_data(root: &Path, data: &Path) -> Result<serde_json::Value, TransformError> {
    let path = root.join(data);
    if !path.exists() {
        // A project without a navigation file renders with `nav` = null
        return Ok(serde_json::Value::Null);
    }
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| TransformError::Data(format!("{}: {}", data.display(), e)))
}

/// Flatten a tera error chain into one message; the top-level error alone
/// rarely names the actual problem.
fn render_message(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
