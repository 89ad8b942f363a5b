//! Configuration loading and schema for siteforge projects
//!
//! Projects are described by a `site.toml` at the project root. The schema
//! lives in [`schema`], discovery and loading in [`loader`].

pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, default_config, find_config, find_config_from, load_config,
    merge_cli_overrides, project_root, CliOverrides, ConfigError,
};
pub use schema::{
    ConfigValidationError, DeployConfig, DestClaim, FontsConfig, ImageVariant, ImagesConfig,
    ProjectConfig, ScriptsConfig, ServerConfig, SiteConfig, SpriteConfig, StylesConfig,
    TemplatesConfig, WatchConfig,
};
