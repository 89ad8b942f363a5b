//! SVG sprite assembly.
//!
//! Every source SVG becomes a `<symbol>` in one sprite file, keyed by its
//! file stem, alongside a small CSS fragment mapping each symbol id to a
//! usage class. Pages reference icons as `sprite.svg#<id>`.

use super::{AggregateTransform, OutputFile, TransformError};
use crate::config::SpriteConfig;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub struct SvgSprite {
    dest: PathBuf,
    file_name: String,
    open_tag: Regex,
    view_box: Regex,
}

impl SvgSprite {
    pub fn new(config: &SpriteConfig) -> Result<Self, TransformError> {
        let open_tag = Regex::new(r"(?s)<svg\b[^>]*>")
            .map_err(|e| TransformError::Sprite(e.to_string()))?;
        let view_box = Regex::new(r#"viewBox\s*=\s*"([^"]*)""#)
            .map_err(|e| TransformError::Sprite(e.to_string()))?;
        Ok(Self {
            dest: config.dest.clone(),
            file_name: config.file_name.clone(),
            open_tag,
            view_box,
        })
    }

    /// Extract a symbol from one SVG document, or None when the document
    /// has no recognizable `<svg>` envelope.
    fn symbol(&self, id: &str, content: &str) -> Option<String> {
        let open = self.open_tag.find(content)?;
        let close = content.rfind("</svg>")?;
        if close < open.end() {
            return None;
        }
        let inner = content[open.end()..close].trim();
        let view_box = self
            .view_box
            .captures(open.as_str())
            .map(|c| format!(" viewBox=\"{}\"", &c[1]))
            .unwrap_or_default();
        Some(format!("  <symbol id=\"{}\"{}>{}</symbol>", id, view_box, inner))
    }
}

impl AggregateTransform for SvgSprite {
    fn transform_all(
        &self,
        root: &Path,
        sources: &[PathBuf],
    ) -> Result<Vec<OutputFile>, TransformError> {
        let mut symbols = Vec::new();
        let mut seen = BTreeSet::new();

        for rel in sources {
            let id = match rel.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => continue,
            };
            // First occurrence wins on stem collisions across subdirectories
            if !seen.insert(id.clone()) {
                continue;
            }
            let content = fs::read_to_string(root.join(rel))?;
            if let Some(symbol) = self.symbol(&id, &content) {
                symbols.push((id, symbol));
            }
        }

        let mut svg = String::from(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" style=\"display:none\">\n",
        );
        let mut css = String::new();
        for (id, symbol) in &symbols {
            svg.push_str(symbol);
            svg.push('\n');
            css.push_str(&format!(
                ".icon-{id} {{ background-image: url(\"{file}#{id}\"); }}\n",
                id = id,
                file = self.file_name
            ));
        }
        svg.push_str("</svg>\n");

        let css_name = Path::new(&self.file_name).with_extension("css");
        Ok(vec![
            OutputFile::new(self.dest.join(&self.file_name), svg.into_bytes()),
            OutputFile::new(self.dest.join(css_name), css.into_bytes()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sprite() -> SvgSprite {
        SvgSprite::new(&SpriteConfig::default()).unwrap()
    }

    #[test]
    fn test_sprite_and_css_outputs() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "src/assets/img/svg/arrow.svg",
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><path d="M0 0h16"/></svg>"#,
        );

        let outputs = sprite()
            .transform_all(temp.path(), &[PathBuf::from("src/assets/img/svg/arrow.svg")])
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].rel, PathBuf::from("build/img/sprite.svg"));
        assert_eq!(outputs[1].rel, PathBuf::from("build/img/sprite.css"));

        let svg = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(svg.contains(r#"<symbol id="arrow" viewBox="0 0 16 16">"#), "{}", svg);
        assert!(svg.contains(r#"<path d="M0 0h16"/>"#));

        let css = String::from_utf8(outputs[1].bytes.clone()).unwrap();
        assert!(css.contains(".icon-arrow"));
        assert!(css.contains("sprite.svg#arrow"));
    }

    #[test]
    fn test_symbol_without_viewbox() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/img/svg/dot.svg", "<svg><circle r=\"1\"/></svg>");

        let outputs = sprite()
            .transform_all(temp.path(), &[PathBuf::from("src/assets/img/svg/dot.svg")])
            .unwrap();

        let svg = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(svg.contains("<symbol id=\"dot\">"), "{}", svg);
    }

    #[test]
    fn test_malformed_svg_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/img/svg/ok.svg", "<svg><g/></svg>");
        write(temp.path(), "src/assets/img/svg/bad.svg", "not svg at all");

        let outputs = sprite()
            .transform_all(
                temp.path(),
                &[
                    PathBuf::from("src/assets/img/svg/bad.svg"),
                    PathBuf::from("src/assets/img/svg/ok.svg"),
                ],
            )
            .unwrap();

        let svg = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(svg.contains("id=\"ok\""));
        assert!(!svg.contains("id=\"bad\""));
    }

    #[test]
    fn test_stem_collision_first_wins() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/img/svg/a/icon.svg", "<svg><g id=\"first\"/></svg>");
        write(temp.path(), "src/assets/img/svg/b/icon.svg", "<svg><g id=\"second\"/></svg>");

        let outputs = sprite()
            .transform_all(
                temp.path(),
                &[
                    PathBuf::from("src/assets/img/svg/a/icon.svg"),
                    PathBuf::from("src/assets/img/svg/b/icon.svg"),
                ],
            )
            .unwrap();

        let svg = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(svg.contains("first"));
        assert!(!svg.contains("second"));
    }

    #[test]
    fn test_empty_source_set() {
        let temp = TempDir::new().unwrap();
        let outputs = sprite().transform_all(temp.path(), &[]).unwrap();

        let svg = String::from_utf8(outputs[0].bytes.clone()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>\n"));
        assert!(outputs[1].bytes.is_empty());
    }
}
