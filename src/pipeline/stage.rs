//! Stage definitions.
//!
//! A stage is one named unit of the pipeline (templates, styles, scripts,
//! images, fonts, sprite) with its own source patterns, destination
//! directory, and watch-trigger patterns.

use crate::config::SiteConfig;
use glob::Pattern;
use std::path::{Path, PathBuf};

/// The fixed set of pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Page templates compiled to HTML
    Templates,
    /// SCSS compiled, prefixed, optionally minified
    Styles,
    /// Scripts concatenated into one bundle
    Scripts,
    /// Raster images resized and re-encoded
    Images,
    /// Fonts copied through
    Fonts,
    /// SVG sprite assembly (optional)
    Sprite,
}

impl StageKind {
    /// All stage kinds in declared base order.
    pub fn all() -> [StageKind; 6] {
        [
            StageKind::Templates,
            StageKind::Styles,
            StageKind::Scripts,
            StageKind::Images,
            StageKind::Fonts,
            StageKind::Sprite,
        ]
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Templates => write!(f, "templates"),
            StageKind::Styles => write!(f, "styles"),
            StageKind::Scripts => write!(f, "scripts"),
            StageKind::Images => write!(f, "images"),
            StageKind::Fonts => write!(f, "fonts"),
            StageKind::Sprite => write!(f, "sprite"),
        }
    }
}

/// A single pipeline stage resolved from configuration.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Which stage this is
    pub kind: StageKind,
    /// Glob patterns for source files, relative to the project root
    pub sources: Vec<String>,
    /// Destination directory, relative to the project root
    pub dest: PathBuf,
    /// Glob patterns whose changes trigger a rerun (may be a superset of
    /// `sources`, e.g. partial templates)
    pub watch: Vec<String>,
    /// Stages that must complete before this one in a full build
    pub depends_on: Vec<StageKind>,
}

impl Stage {
    /// Check whether a project-relative path belongs to this stage's
    /// watch set.
    pub fn matches_watch(&self, rel: &Path) -> bool {
        self.watch
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches_path(rel))
    }

    /// Check whether a project-relative path is one of this stage's
    /// sources. Watched non-source inputs (partials, SCSS modules) fail
    /// this check; their changes invalidate the whole stage.
    pub fn matches_source(&self, rel: &Path) -> bool {
        self.sources
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches_path(rel))
    }
}

/// Build the stage list from configuration.
///
/// The sprite stage is present only when enabled; styles depend on it
/// because compiled styles reference the generated sprite assets.
pub fn stages_from_config(config: &SiteConfig) -> Vec<Stage> {
    let mut stages = Vec::new();

    stages.push(Stage {
        kind: StageKind::Templates,
        sources: config.templates.sources.clone(),
        dest: config.templates.dest.clone(),
        watch: config.templates.watch.clone(),
        depends_on: vec![],
    });

    let style_deps = if config.sprite.enabled { vec![StageKind::Sprite] } else { vec![] };
    stages.push(Stage {
        kind: StageKind::Styles,
        sources: config.styles.sources.clone(),
        dest: config.styles.dest.clone(),
        watch: config.styles.watch.clone(),
        depends_on: style_deps,
    });

    stages.push(Stage {
        kind: StageKind::Scripts,
        sources: config.scripts.sources.clone(),
        dest: config.scripts.dest.clone(),
        watch: config.scripts.watch.clone(),
        depends_on: vec![],
    });

    stages.push(Stage {
        kind: StageKind::Images,
        sources: config.images.sources.clone(),
        dest: config.images.dest.clone(),
        watch: config.images.watch.clone(),
        depends_on: vec![],
    });

    stages.push(Stage {
        kind: StageKind::Fonts,
        sources: config.fonts.sources.clone(),
        dest: config.fonts.dest.clone(),
        watch: config.fonts.watch.clone(),
        depends_on: vec![],
    });

    if config.sprite.enabled {
        stages.push(Stage {
            kind: StageKind::Sprite,
            sources: config.sprite.sources.clone(),
            dest: config.sprite.dest.clone(),
            watch: config.sprite.watch.clone(),
            depends_on: vec![],
        });
    }

    stages
}

/// The ordered set of stages for one pipeline run.
#[derive(Debug, Default)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Create a plan from configuration.
    pub fn from_config(config: &SiteConfig) -> Self {
        Self { stages: stages_from_config(config) }
    }

    /// All stages in declared order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Look up a stage by kind.
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Stages owning a project-relative path, by watch-pattern match.
    pub fn stages_for_path(&self, rel: &Path) -> Vec<StageKind> {
        self.stages.iter().filter(|s| s.matches_watch(rel)).map(|s| s.kind).collect()
    }

    /// Get stages in build order (respecting dependencies).
    ///
    /// Returns stages sorted so that dependencies come before dependents;
    /// the sprite stage is hoisted ahead of styles when present. Returns an
    /// error if dependencies form a cycle.
    pub fn build_order(&self) -> Result<Vec<&Stage>, StageOrderError> {
        let mut result = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut visiting = std::collections::HashSet::new();

        for stage in &self.stages {
            self.visit_stage(stage, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit_stage<'a>(
        &'a self,
        stage: &'a Stage,
        visited: &mut std::collections::HashSet<StageKind>,
        visiting: &mut std::collections::HashSet<StageKind>,
        result: &mut Vec<&'a Stage>,
    ) -> Result<(), StageOrderError> {
        if visited.contains(&stage.kind) {
            return Ok(());
        }

        if visiting.contains(&stage.kind) {
            return Err(StageOrderError::CyclicDependency(stage.kind));
        }

        visiting.insert(stage.kind);

        for dep in &stage.depends_on {
            if let Some(dep_stage) = self.stages.iter().find(|s| s.kind == *dep) {
                self.visit_stage(dep_stage, visited, visiting, result)?;
            }
        }

        visiting.remove(&stage.kind);
        visited.insert(stage.kind);
        result.push(stage);

        Ok(())
    }
}

/// Error during stage order calculation.
#[derive(Debug)]
pub enum StageOrderError {
    /// Circular dependency detected
    CyclicDependency(StageKind),
}

impl std::fmt::Display for StageOrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOrderError::CyclicDependency(kind) => {
                write!(f, "Circular dependency detected involving stage '{}'", kind)
            }
        }
    }
}

impl std::error::Error for StageOrderError {}
