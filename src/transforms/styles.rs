//! SCSS compilation (grass) and CSS post-processing (lightningcss).
//!
//! The lightningcss pass adds vendor prefixes for a fixed browser range
//! roughly matching "last 10 versions" of the evergreen browsers, and
//! optionally minifies.

use super::{FileTransform, OutputFile, TransformError};
use crate::config::StylesConfig;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::path::{Path, PathBuf};

pub struct StyleTransform {
    dest: PathBuf,
    load_paths: Vec<PathBuf>,
    minify: bool,
}

/// Version triple packed the way lightningcss expects.
const fn version(major: u32, minor: u32) -> Option<u32> {
    Some((major << 16) | (minor << 8))
}

fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: version(90, 0),
        edge: version(90, 0),
        firefox: version(88, 0),
        safari: version(14, 0),
        ios_saf: version(14, 0),
        opera: version(76, 0),
        samsung: version(14, 0),
        android: version(90, 0),
        ie: None,
    })
}

impl StyleTransform {
    pub fn new(root: &Path, config: &StylesConfig) -> Self {
        let load_paths = config.load_paths.iter().map(|p| root.join(p)).collect();
        Self { dest: config.dest.clone(), load_paths, minify: config.minify }
    }

    fn postprocess(&self, css: &str) -> Result<String, TransformError> {
        let mut sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| TransformError::Css(e.to_string()))?;
        sheet
            .minify(MinifyOptions { targets: browser_targets(), ..MinifyOptions::default() })
            .map_err(|e| TransformError::Css(e.to_string()))?;
        let out = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                targets: browser_targets(),
                ..PrinterOptions::default()
            })
            .map_err(|e| TransformError::Css(e.to_string()))?;
        Ok(out.code)
    }
}

impl FileTransform for StyleTransform {
    fn transform(&self, root: &Path, source: &Path) -> Result<Vec<OutputFile>, TransformError> {
        // Partials are compiled via their importers, never on their own
        if source.file_name().is_some_and(|n| n.to_string_lossy().starts_with('_')) {
            return Ok(vec![]);
        }

        let options = self
            .load_paths
            .iter()
            .fold(grass::Options::default(), |opts, p| opts.load_path(p.clone()));
        let css = grass::from_path(root.join(source), &options)
            .map_err(|e| TransformError::Scss(e.to_string()))?;
        let css = self.postprocess(&css)?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "style".to_string());
        Ok(vec![OutputFile::new(self.dest.join(format!("{}.css", stem)), css.into_bytes())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_compile_scss() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/styles/style.scss", "$c: #fff;\nbody { color: $c; }");

        let transform = StyleTransform::new(temp.path(), &StylesConfig::default());
        let outputs =
            transform.transform(temp.path(), Path::new("src/styles/style.scss")).unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].rel, PathBuf::from("build/css/style.css"));
        let css = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(css.contains("color"), "compiled css: {}", css);
    }

    #[test]
    fn test_compile_with_import_from_load_path() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/blocks/header/header.scss", ".header { margin: 0; }");
        write(temp.path(), "src/styles/style.scss", "@use \"header/header\";");

        let transform = StyleTransform::new(temp.path(), &StylesConfig::default());
        let outputs =
            transform.transform(temp.path(), Path::new("src/styles/style.scss")).unwrap();

        let css = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(css.contains(".header"), "compiled css: {}", css);
    }

    #[test]
    fn test_vendor_prefixing() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/styles/style.scss", ".box { user-select: none; }");

        let transform = StyleTransform::new(temp.path(), &StylesConfig::default());
        let outputs =
            transform.transform(temp.path(), Path::new("src/styles/style.scss")).unwrap();

        let css = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(css.contains("-webkit-user-select"), "prefixed css: {}", css);
    }

    #[test]
    fn test_minify() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/styles/style.scss", "body {\n  margin: 0;\n}\n");

        let mut config = StylesConfig::default();
        config.minify = true;
        let transform = StyleTransform::new(temp.path(), &config);
        let outputs =
            transform.transform(temp.path(), Path::new("src/styles/style.scss")).unwrap();

        let css = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(!css.contains('\n'), "minified css: {}", css);
    }

    #[test]
    fn test_partial_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/styles/_vars.scss", "$c: #fff;");

        let transform = StyleTransform::new(temp.path(), &StylesConfig::default());
        let outputs =
            transform.transform(temp.path(), Path::new("src/styles/_vars.scss")).unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_scss_error_is_per_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/styles/style.scss", "body { color: ; }");

        let transform = StyleTransform::new(temp.path(), &StylesConfig::default());
        let result = transform.transform(temp.path(), Path::new("src/styles/style.scss"));
        assert!(matches!(result, Err(TransformError::Scss(_))));
    }
}
