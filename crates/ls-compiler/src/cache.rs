//! Cache-aware rule loading
//!
//! The rule document is the source of truth. A snapshot of the parsed rules
//! is kept on disk and reused while its version matches the document's; any
//! cache problem falls back to parsing, and any document problem falls back
//! to an empty rule set.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ls_core::snapshot::{CacheSnapshot, SnapshotError};
use ls_core::types::{EngineFlags, ProviderSpec};
use ls_core::RuleSet;

use crate::builder::build_snapshot;
use crate::optimizer::optimize_providers;
use crate::parser::{parse_rule_document, peek_version};

/// Error type for cache reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid cache snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Stale cache: built for rules {cached}, document is {current}")]
    Stale { cached: String, current: String },
}

/// Where a loaded rule set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Cache,
    Document,
    Empty,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cache => "cache",
            Self::Document => "document",
            Self::Empty => "empty",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct LoadedRules {
    pub rules: RuleSet,
    pub source: RuleSource,
}

/// Read a cache file and return its provider specs, provided it was built
/// for `expected_version`.
pub fn read_cache(path: &Path, expected_version: &str) -> Result<Vec<ProviderSpec>, CacheError> {
    let bytes = fs::read(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = CacheSnapshot::load(&bytes)?;
    if snapshot.rules_version() != expected_version {
        return Err(CacheError::Stale {
            cached: snapshot.rules_version().to_string(),
            current: expected_version.to_string(),
        });
    }
    Ok(snapshot.to_specs()?)
}

/// Write snapshot bytes next to `path` and rename into place, so a reader
/// never sees a half-written cache.
pub fn write_cache(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

/// Load the rule set for `document`, going through the cache at
/// `cache_path` when one is given. Never fails.
pub fn load_rule_set(document: &str, cache_path: Option<&Path>, flags: EngineFlags) -> LoadedRules {
    let version = match peek_version(document) {
        Ok(version) => version,
        Err(err) => {
            log::warn!("rule document unusable, continuing without providers: {}", err);
            return empty(flags);
        }
    };

    if let Some(path) = cache_path {
        match read_cache(path, &version) {
            Ok(specs) => {
                log::info!("loaded rules {} from cache {}", version, path.display());
                return LoadedRules {
                    rules: RuleSet::compile(version, &specs, flags),
                    source: RuleSource::Cache,
                };
            }
            Err(CacheError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no rule cache at {}", path.display());
            }
            Err(err) => log::info!("rebuilding rule cache: {}", err),
        }
    }

    let mut doc = match parse_rule_document(document) {
        Ok(doc) => doc,
        Err(err) => {
            log::warn!("rule document unusable, continuing without providers: {}", err);
            return empty(flags);
        }
    };
    let stats = optimize_providers(&mut doc.providers);
    log::debug!(
        "rules {}: {} providers, {} -> {} patterns",
        doc.version,
        stats.providers_after,
        stats.rules_before,
        stats.rules_after
    );

    if let Some(path) = cache_path {
        let bytes = build_snapshot(&doc.version, &doc.providers);
        match write_cache(path, &bytes) {
            Ok(()) => log::info!("wrote rule cache {} ({} bytes)", path.display(), bytes.len()),
            Err(err) => log::warn!("could not write rule cache: {}", err),
        }
    }

    LoadedRules {
        rules: RuleSet::compile(doc.version, &doc.providers, flags),
        source: RuleSource::Document,
    }
}

fn empty(flags: EngineFlags) -> LoadedRules {
    LoadedRules {
        rules: RuleSet::empty(flags),
        source: RuleSource::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = r#"{"version": "1", "providers": {"a": {"urlPattern": "a\\.com", "rules": ["x"]}}}"#;
    const V2: &str = r#"{"version": "2", "providers": {"a": {"urlPattern": "a\\.com", "rules": ["x"]}, "b": {"urlPattern": "b\\.com"}}}"#;

    #[test]
    fn uses_cache_on_second_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.lsc");

        let first = load_rule_set(V1, Some(&path), EngineFlags::default());
        assert_eq!(first.source, RuleSource::Document);
        assert!(path.exists());

        let second = load_rule_set(V1, Some(&path), EngineFlags::default());
        assert_eq!(second.source, RuleSource::Cache);
        assert_eq!(second.rules.version(), "1");
        assert_eq!(second.rules.providers().len(), 1);
    }

    #[test]
    fn version_bump_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.lsc");

        load_rule_set(V1, Some(&path), EngineFlags::default());
        let bumped = load_rule_set(V2, Some(&path), EngineFlags::default());
        assert_eq!(bumped.source, RuleSource::Document);
        assert_eq!(bumped.rules.providers().len(), 2);

        assert!(matches!(read_cache(&path, "2"), Ok(specs) if specs.len() == 2));
        assert!(matches!(read_cache(&path, "1"), Err(CacheError::Stale { .. })));
    }

    #[test]
    fn corrupt_cache_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.lsc");
        fs::write(&path, b"garbage").unwrap();

        let loaded = load_rule_set(V1, Some(&path), EngineFlags::default());
        assert_eq!(loaded.source, RuleSource::Document);
        assert!(read_cache(&path, "1").is_ok());
    }

    #[test]
    fn unusable_document_gives_empty_rules() {
        let loaded = load_rule_set("{", None, EngineFlags::default());
        assert_eq!(loaded.source, RuleSource::Empty);
        assert!(loaded.rules.is_empty());

        let loaded = load_rule_set(r#"{"providers": {}}"#, None, EngineFlags::default());
        assert_eq!(loaded.source, RuleSource::Empty);
    }

    #[test]
    fn unwritable_cache_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("rules.lsc");

        let loaded = load_rule_set(V1, Some(&path), EngineFlags::default());
        assert_eq!(loaded.source, RuleSource::Document);
        assert_eq!(loaded.rules.providers().len(), 1);
    }
}
