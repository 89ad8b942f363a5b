//! Configuration schema types for `site.toml`
//!
//! Defines the stage map (sources, destinations, watch patterns) and the
//! global build settings, plus the validation rules applied before any
//! build runs.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source tree root
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output root
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Template stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Glob patterns for page templates
    #[serde(default = "default_template_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_out")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild (superset of sources:
    /// partials and blocks are watched but only pages are compiled)
    #[serde(default = "default_template_watch")]
    pub watch: Vec<String>,
    /// Glob patterns for partial templates registered before page rendering
    #[serde(default = "default_template_partials")]
    pub partials: Vec<String>,
    /// JSON file injected into the template context as `nav`
    #[serde(default = "default_nav_data")]
    pub data: PathBuf,
}

fn default_template_sources() -> Vec<String> {
    vec!["src/pages/*.tera".to_string()]
}

fn default_template_watch() -> Vec<String> {
    vec![
        "src/pages/*.tera".to_string(),
        "src/templates/*.tera".to_string(),
        "src/blocks/**/*.tera".to_string(),
    ]
}

fn default_template_partials() -> Vec<String> {
    vec!["src/templates/*.tera".to_string(), "src/blocks/**/*.tera".to_string()]
}

fn default_nav_data() -> PathBuf {
    PathBuf::from("src/assets/navigation.json")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            sources: default_template_sources(),
            dest: default_out(),
            watch: default_template_watch(),
            partials: default_template_partials(),
            data: default_nav_data(),
        }
    }
}

/// Style stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Glob patterns for SCSS entry points (not partials)
    #[serde(default = "default_style_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_style_dest")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild
    #[serde(default = "default_style_watch")]
    pub watch: Vec<String>,
    /// Extra directories searched for `@use` / `@import`
    #[serde(default = "default_style_load_paths")]
    pub load_paths: Vec<PathBuf>,
    /// Minify the compiled CSS
    #[serde(default)]
    pub minify: bool,
}

fn default_style_sources() -> Vec<String> {
    vec!["src/styles/style.scss".to_string()]
}

fn default_style_dest() -> PathBuf {
    PathBuf::from("build/css")
}

fn default_style_watch() -> Vec<String> {
    vec!["src/styles/**/*.scss".to_string(), "src/blocks/**/*.scss".to_string()]
}

fn default_style_load_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("src/styles"), PathBuf::from("src/blocks"), PathBuf::from("src")]
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            sources: default_style_sources(),
            dest: default_style_dest(),
            watch: default_style_watch(),
            load_paths: default_style_load_paths(),
            minify: false,
        }
    }
}

/// Script stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Glob patterns for script files, concatenated in declared order
    #[serde(default = "default_script_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_script_dest")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild
    #[serde(default = "default_script_watch")]
    pub watch: Vec<String>,
    /// Name of the concatenated bundle
    #[serde(default = "default_bundle_name")]
    pub bundle: String,
}

fn default_script_sources() -> Vec<String> {
    vec!["src/js/*.js".to_string()]
}

fn default_script_dest() -> PathBuf {
    PathBuf::from("build/js")
}

fn default_script_watch() -> Vec<String> {
    vec!["src/js/*.js".to_string(), "src/plugins/*.js".to_string()]
}

fn default_bundle_name() -> String {
    "scripts.js".to_string()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: default_script_sources(),
            dest: default_script_dest(),
            watch: default_script_watch(),
            bundle: default_bundle_name(),
        }
    }
}

/// A resized output variant for the image stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageVariant {
    /// Subdirectory the variant is written to (e.g. "@1x")
    pub subdir: String,
    /// Width as a percentage of the original
    pub width_percent: u32,
}

/// Image stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Glob patterns for raster images
    #[serde(default = "default_image_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_image_dest")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild
    #[serde(default = "default_image_watch")]
    pub watch: Vec<String>,
    /// Re-encode quality for lossy formats (1-100)
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output variants (defaults to @1x at 50% and @2x at 100%)
    #[serde(default = "default_image_variants")]
    pub variants: Vec<ImageVariant>,
}

fn default_image_sources() -> Vec<String> {
    vec![
        "src/assets/img/src/**/*.png".to_string(),
        "src/assets/img/src/**/*.jpg".to_string(),
        "src/assets/img/src/**/*.jpeg".to_string(),
        "src/assets/img/src/**/*.webp".to_string(),
    ]
}

fn default_image_dest() -> PathBuf {
    PathBuf::from("build/img")
}

fn default_image_watch() -> Vec<String> {
    vec!["src/assets/img/**/*".to_string()]
}

fn default_quality() -> u8 {
    50
}

fn default_image_variants() -> Vec<ImageVariant> {
    vec![
        ImageVariant { subdir: "@1x".to_string(), width_percent: 50 },
        ImageVariant { subdir: "@2x".to_string(), width_percent: 100 },
    ]
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: default_image_sources(),
            dest: default_image_dest(),
            watch: default_image_watch(),
            quality: default_quality(),
            variants: default_image_variants(),
        }
    }
}

/// Font stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// Glob patterns for font files
    #[serde(default = "default_font_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_font_dest")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild
    #[serde(default = "default_font_sources")]
    pub watch: Vec<String>,
}

fn default_font_sources() -> Vec<String> {
    vec!["src/assets/fonts/*".to_string()]
}

fn default_font_dest() -> PathBuf {
    PathBuf::from("build/fonts")
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            sources: default_font_sources(),
            dest: default_font_dest(),
            watch: default_font_sources(),
        }
    }
}

/// SVG sprite stage configuration (optional stage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Whether the sprite stage runs at all
    #[serde(default)]
    pub enabled: bool,
    /// Glob patterns for SVG sources
    #[serde(default = "default_sprite_sources")]
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    #[serde(default = "default_image_dest")]
    pub dest: PathBuf,
    /// Glob patterns that trigger a rebuild
    #[serde(default = "default_sprite_sources")]
    pub watch: Vec<String>,
    /// Name of the generated sprite file
    #[serde(default = "default_sprite_name")]
    pub file_name: String,
}

fn default_sprite_sources() -> Vec<String> {
    vec!["src/assets/img/svg/**/*.svg".to_string()]
}

fn default_sprite_name() -> String {
    "sprite.svg".to_string()
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: default_sprite_sources(),
            dest: default_image_dest(),
            watch: default_sprite_sources(),
            file_name: default_sprite_name(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

/// Dev server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the static server listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// Remote deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeployConfig {
    /// Remote target, `user@host` (overridable via SITEFORGE_DEPLOY_HOST)
    pub host: Option<String>,
    /// Path on the remote host
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    /// Exclude patterns passed through to the sync tool
    #[serde(default)]
    pub excludes: Vec<String>,
}

fn default_remote_path() -> String {
    "~/www".to_string()
}

/// Complete site.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Template stage
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Style stage
    #[serde(default)]
    pub styles: StylesConfig,
    /// Script stage
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Image stage
    #[serde(default)]
    pub images: ImagesConfig,
    /// Font stage
    #[serde(default)]
    pub fonts: FontsConfig,
    /// SVG sprite stage (disabled unless configured)
    #[serde(default)]
    pub sprite: SpriteConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Dev server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Deployment settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "styles.dest")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "site.toml: '{}' {}", self.field, self.message)
    }
}

/// What a stage writes under its destination directory.
///
/// A recursive claim owns the whole subtree; a flat claim owns only files
/// placed directly in the directory. Two claims conflict when their write
/// sets could intersect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestClaim {
    /// Stage field name, for error reporting
    pub stage: &'static str,
    /// Claimed directory
    pub dir: PathBuf,
    /// Whether the stage writes into subdirectories of `dir`
    pub recursive: bool,
}

impl DestClaim {
    /// Check whether two claims could write the same path.
    pub fn conflicts_with(&self, other: &DestClaim) -> bool {
        let a = normalize(&self.dir);
        let b = normalize(&other.dir);
        match (self.recursive, other.recursive) {
            // Two subtrees conflict when one contains the other
            (true, true) => a.starts_with(&b) || b.starts_with(&a),
            // A subtree conflicts with flat files living inside it
            (true, false) => b.starts_with(&a),
            (false, true) => a.starts_with(&b),
            // Flat claims conflict only on the exact same directory
            (false, false) => a == b,
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

impl SiteConfig {
    /// Validate the configuration and return any errors.
    ///
    /// Destination overlap between stages is rejected here, before any
    /// build runs: concurrent stage writers must target disjoint subpaths.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (field, sources) in [
            ("templates.sources", &self.templates.sources),
            ("styles.sources", &self.styles.sources),
            ("scripts.sources", &self.scripts.sources),
            ("images.sources", &self.images.sources),
            ("fonts.sources", &self.fonts.sources),
        ] {
            if sources.is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must contain at least one glob pattern".to_string(),
                });
            }
        }

        if self.sprite.enabled && self.sprite.sources.is_empty() {
            errors.push(ConfigValidationError {
                field: "sprite.sources".to_string(),
                message: "must contain at least one glob pattern".to_string(),
            });
        }

        if self.images.quality == 0 || self.images.quality > 100 {
            errors.push(ConfigValidationError {
                field: "images.quality".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }

        for (i, variant) in self.images.variants.iter().enumerate() {
            if variant.width_percent == 0 {
                errors.push(ConfigValidationError {
                    field: format!("images.variants[{}].width_percent", i),
                    message: "must be a positive percentage".to_string(),
                });
            }
            if variant.subdir.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("images.variants[{}].subdir", i),
                    message: "must be a non-empty directory name".to_string(),
                });
            }
        }

        let claims = self.dest_claims();
        for (i, a) in claims.iter().enumerate() {
            for b in claims.iter().skip(i + 1) {
                if a.stage != b.stage && a.conflicts_with(b) {
                    errors.push(ConfigValidationError {
                        field: format!("{}.dest", b.stage),
                        message: format!(
                            "overlaps destination of '{}' ({}); stage destinations must be disjoint",
                            a.stage,
                            a.dir.display()
                        ),
                    });
                }
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Destination claims of every enabled stage.
    pub fn dest_claims(&self) -> Vec<DestClaim> {
        let mut claims = vec![
            // Pages land directly in the output root, not in a subtree
            DestClaim { stage: "templates", dir: self.templates.dest.clone(), recursive: false },
            DestClaim { stage: "styles", dir: self.styles.dest.clone(), recursive: true },
            DestClaim { stage: "scripts", dir: self.scripts.dest.clone(), recursive: true },
            DestClaim { stage: "fonts", dir: self.fonts.dest.clone(), recursive: true },
        ];
        // Each image variant owns its own subtree so the sprite stage can
        // share build/img with flat files
        for variant in &self.images.variants {
            claims.push(DestClaim {
                stage: "images",
                dir: self.images.dest.join(&variant.subdir),
                recursive: true,
            });
        }
        if self.sprite.enabled {
            claims.push(DestClaim {
                stage: "sprite",
                dir: self.sprite.dest.clone(),
                recursive: false,
            });
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let toml = r#"
[project]
name = "test-site"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.name, "test-site");
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.out, PathBuf::from("build"));
        assert_eq!(config.styles.dest, PathBuf::from("build/css"));
        assert!(!config.sprite.enabled);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[project]
name = "full-site"
src = "source"
out = "dist"

[templates]
sources = ["source/pages/*.tera"]
dest = "dist"
data = "source/nav.json"

[styles]
sources = ["source/css/main.scss"]
dest = "dist/css"
minify = true

[scripts]
bundle = "app.js"
dest = "dist/js"

[images]
quality = 80
dest = "dist/img"

[fonts]
dest = "dist/fonts"

[sprite]
enabled = true
dest = "dist/img"

[watch]
debounce_ms = 200
clear_screen = true

[server]
port = 8080

[deploy]
host = "deploy@example.com"
remote_path = "/var/www/site"
excludes = ["*.map"]
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert!(config.styles.minify);
        assert_eq!(config.scripts.bundle, "app.js");
        assert_eq!(config.images.quality, 80);
        assert!(config.sprite.enabled);
        assert_eq!(config.watch.debounce_ms, 200);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.deploy.host.as_deref(), Some("deploy@example.com"));
        assert!(config.is_valid(), "{:?}", config.validate());
    }

    #[test]
    fn test_default_layout_is_disjoint() {
        let config: SiteConfig = toml::from_str("[project]\nname = \"t\"").unwrap();
        assert!(config.is_valid(), "{:?}", config.validate());
    }

    #[test]
    fn test_default_image_sources_cover_raster_formats() {
        let config = ImagesConfig::default();
        for ext in ["png", "jpg", "jpeg", "webp"] {
            assert!(
                config.sources.iter().any(|s| s.ends_with(&format!("*.{}", ext))),
                "missing {} in {:?}",
                ext,
                config.sources
            );
        }
    }

    #[test]
    fn test_default_layout_with_sprite_is_disjoint() {
        let toml = r#"
[project]
name = "t"

[sprite]
enabled = true
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        // Sprite writes flat files into build/img while image variants own
        // build/img/@1x and build/img/@2x
        assert!(config.is_valid(), "{:?}", config.validate());
    }

    #[test]
    fn test_validation_empty_name() {
        let config: SiteConfig = toml::from_str("[project]\nname = \"\"").unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.name"));
    }

    #[test]
    fn test_validation_empty_sources() {
        let toml = r#"
[project]
name = "t"

[styles]
sources = []
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "styles.sources"));
    }

    #[test]
    fn test_validation_bad_quality() {
        let toml = r#"
[project]
name = "t"

[images]
quality = 0
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "images.quality"));
    }

    #[test]
    fn test_validation_overlapping_dests() {
        let toml = r#"
[project]
name = "t"

[scripts]
dest = "build/css"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(
            errors.iter().any(|e| e.message.contains("disjoint")),
            "expected a disjointness error, got {:?}",
            errors
        );
    }

    #[test]
    fn test_validation_nested_dests() {
        let toml = r#"
[project]
name = "t"

[fonts]
dest = "build/css/fonts"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.message.contains("disjoint")));
    }

    #[test]
    fn test_dest_claim_conflicts() {
        let tree =
            |dir: &str| DestClaim { stage: "a", dir: PathBuf::from(dir), recursive: true };
        let flat =
            |dir: &str| DestClaim { stage: "b", dir: PathBuf::from(dir), recursive: false };

        assert!(tree("build/css").conflicts_with(&tree("build/css/nested")));
        assert!(tree("build/css").conflicts_with(&flat("build/css")));
        assert!(!tree("build/css").conflicts_with(&flat("build")));
        assert!(!flat("build").conflicts_with(&flat("build/img")));
        assert!(flat("./build").conflicts_with(&flat("build")));
    }
}
