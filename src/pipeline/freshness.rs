//! In-memory freshness tracking for incremental rebuilds.
//!
//! The index records, per stage, the source modification time observed when
//! that source's artifacts were last written. A source is fresh when its
//! current mtime matches the recorded one. The index lives only for the
//! lifetime of the process; a new invocation always starts cold.

use super::stage::StageKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Per-stage map of source path to the mtime recorded at artifact write.
#[derive(Debug, Default)]
pub struct FreshnessIndex {
    entries: HashMap<StageKind, HashMap<PathBuf, SystemTime>>,
    /// When set, every source reports stale
    force: bool,
}

impl FreshnessIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index that treats everything as stale.
    pub fn forced() -> Self {
        Self { entries: HashMap::new(), force: true }
    }

    /// Record that a source's artifacts were written while the source had
    /// the given mtime.
    pub fn record(&mut self, stage: StageKind, source: &Path, mtime: SystemTime) {
        self.entries.entry(stage).or_default().insert(source.to_path_buf(), mtime);
    }

    /// Whether a source's artifacts are up to date.
    pub fn is_fresh(&self, stage: StageKind, source: &Path, current_mtime: SystemTime) -> bool {
        if self.force {
            return false;
        }
        self.entries
            .get(&stage)
            .and_then(|m| m.get(source))
            .map(|recorded| *recorded == current_mtime)
            .unwrap_or(false)
    }

    /// Whether every listed source is fresh. Aggregate stages rebuild unless
    /// this holds for their whole input set.
    pub fn all_fresh<'a, I>(&self, stage: StageKind, sources: I) -> bool
    where
        I: IntoIterator<Item = (&'a Path, SystemTime)>,
    {
        let mut saw_any = false;
        for (path, mtime) in sources {
            saw_any = true;
            if !self.is_fresh(stage, path, mtime) {
                return false;
            }
        }
        saw_any
    }

    /// Drop all records for one stage. Used when a watched input outside the
    /// source set changes (e.g. a shared partial).
    pub fn invalidate_stage(&mut self, stage: StageKind) {
        self.entries.remove(&stage);
    }

    /// Drop everything. Used after `clean`.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of recorded sources for a stage.
    pub fn recorded_count(&self, stage: StageKind) -> usize {
        self.entries.get(&stage).map_or(0, |m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_unrecorded_source_is_stale() {
        let index = FreshnessIndex::new();
        assert!(!index.is_fresh(StageKind::Styles, Path::new("a.scss"), t(100)));
    }

    #[test]
    fn test_record_then_fresh() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Styles, Path::new("a.scss"), t(100));
        assert!(index.is_fresh(StageKind::Styles, Path::new("a.scss"), t(100)));
    }

    #[test]
    fn test_mtime_change_goes_stale() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Styles, Path::new("a.scss"), t(100));
        assert!(!index.is_fresh(StageKind::Styles, Path::new("a.scss"), t(101)));
    }

    #[test]
    fn test_stages_partitioned() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Styles, Path::new("a.scss"), t(100));
        assert!(!index.is_fresh(StageKind::Templates, Path::new("a.scss"), t(100)));
    }

    #[test]
    fn test_forced_index_always_stale() {
        let mut index = FreshnessIndex::forced();
        index.record(StageKind::Fonts, Path::new("f.woff2"), t(50));
        assert!(!index.is_fresh(StageKind::Fonts, Path::new("f.woff2"), t(50)));
    }

    #[test]
    fn test_all_fresh() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Scripts, Path::new("a.js"), t(1));
        index.record(StageKind::Scripts, Path::new("b.js"), t(2));

        let inputs = [(Path::new("a.js"), t(1)), (Path::new("b.js"), t(2))];
        assert!(index.all_fresh(StageKind::Scripts, inputs.iter().map(|(p, m)| (*p, *m))));

        let touched = [(Path::new("a.js"), t(1)), (Path::new("b.js"), t(3))];
        assert!(!index.all_fresh(StageKind::Scripts, touched.iter().map(|(p, m)| (*p, *m))));
    }

    #[test]
    fn test_all_fresh_empty_set_is_stale() {
        let index = FreshnessIndex::new();
        assert!(!index.all_fresh(StageKind::Scripts, std::iter::empty()));
    }

    #[test]
    fn test_invalidate_stage() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Templates, Path::new("p.tera"), t(9));
        index.invalidate_stage(StageKind::Templates);
        assert!(!index.is_fresh(StageKind::Templates, Path::new("p.tera"), t(9)));
        assert_eq!(index.recorded_count(StageKind::Templates), 0);
    }

    #[test]
    fn test_clear_after_clean() {
        let mut index = FreshnessIndex::new();
        index.record(StageKind::Fonts, Path::new("f.woff2"), t(7));
        index.clear();
        assert_eq!(index.recorded_count(StageKind::Fonts), 0);
    }
}
