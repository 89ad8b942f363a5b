//! Configuration loading and discovery for `site.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SiteConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse site.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output root
    pub out: Option<PathBuf>,
    /// Override source root
    pub src: Option<PathBuf>,
    /// Override image quality
    pub quality: Option<u8>,
    /// Override dev server port
    pub port: Option<u16>,
}

/// Find site.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find site.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join("site.toml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a site.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// stage layout (which mirrors the conventional `src/` project tree).
pub fn load_config(path: Option<&Path>) -> Result<SiteConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let mut config = match config_path {
        Some(p) => load_config_file(&p)?,
        None => default_config(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<SiteConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SiteConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no site.toml is found.
///
/// The project name falls back to the current directory name.
pub fn default_config() -> SiteConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    SiteConfig {
        project: super::schema::ProjectConfig {
            name: project_name,
            src: PathBuf::from("src"),
            out: PathBuf::from("build"),
        },
        templates: Default::default(),
        styles: Default::default(),
        scripts: Default::default(),
        images: Default::default(),
        fonts: Default::default(),
        sprite: Default::default(),
        watch: Default::default(),
        server: Default::default(),
        deploy: Default::default(),
    }
}

/// Apply environment-driven settings.
///
/// SITEFORGE_NAV_DATA points the template stage at a different data file;
/// SITEFORGE_DEPLOY_HOST supplies deploy credentials without committing
/// them to site.toml.
pub fn apply_env_overrides(config: &mut SiteConfig) {
    if let Ok(data) = env::var("SITEFORGE_NAV_DATA") {
        if !data.is_empty() {
            config.templates.data = PathBuf::from(data);
        }
    }
    if let Ok(host) = env::var("SITEFORGE_DEPLOY_HOST") {
        if !host.is_empty() {
            config.deploy.host = Some(host);
        }
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. Overriding the
/// output root rebases every stage destination that lived under the old one.
pub fn merge_cli_overrides(config: &mut SiteConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        let old_out = config.project.out.clone();
        config.project.out = out.clone();

        for dest in [
            &mut config.templates.dest,
            &mut config.styles.dest,
            &mut config.scripts.dest,
            &mut config.images.dest,
            &mut config.fonts.dest,
            &mut config.sprite.dest,
        ] {
            if let Ok(rest) = dest.clone().strip_prefix(&old_out) {
                *dest = out.join(rest);
            }
        }
    }

    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(quality) = overrides.quality {
        config.images.quality = quality;
    }

    if let Some(port) = overrides.port {
        config.server.port = port;
    }
}

/// Get the project root directory from a config file path.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}
