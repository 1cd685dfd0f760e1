//! Immutable, versioned rule sets
//!
//! A `RuleSet` is built once and never mutated. Reloading builds a new one
//! and publishes it through [`SharedRuleSet`], which swaps the whole `Arc`
//! so concurrent cleaners keep the table they started with.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::provider::{PatternError, Provider};
use crate::types::{EngineFlags, ProviderSpec};

/// Compiled providers plus global flags.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    flags: EngineFlags,
    providers: Vec<Provider>,
    pattern_errors: Vec<PatternError>,
}

impl RuleSet {
    /// Compile a rule set. Invalid patterns are logged and skipped; this
    /// never fails.
    pub fn compile(version: impl Into<String>, specs: &[ProviderSpec], flags: EngineFlags) -> Self {
        let version = version.into();
        let mut pattern_errors = Vec::new();
        let providers: Vec<Provider> = specs
            .iter()
            .map(|spec| Provider::compile(spec, &mut pattern_errors))
            .collect();

        for err in &pattern_errors {
            log::warn!("{}", err);
        }
        log::debug!(
            "compiled rule set {} ({} providers, {} invalid patterns)",
            version,
            providers.len(),
            pattern_errors.len()
        );

        Self {
            version,
            flags,
            providers,
            pattern_errors,
        }
    }

    /// A rule set with no providers. The engine still runs the denylist
    /// and platform passes.
    pub fn empty(flags: EngineFlags) -> Self {
        Self {
            version: String::new(),
            flags,
            providers: Vec::new(),
            pattern_errors: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// Patterns that failed to compile while building this set.
    pub fn pattern_errors(&self) -> &[PatternError] {
        &self.pattern_errors
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Same providers, different global flags.
    pub fn with_flags(&self, flags: EngineFlags) -> Self {
        Self {
            flags,
            ..self.clone()
        }
    }
}

/// Atomically replaceable reference to the current rule set.
#[derive(Debug)]
pub struct SharedRuleSet {
    current: RwLock<Arc<RuleSet>>,
}

impl SharedRuleSet {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// The rule set in effect right now. Holding the returned `Arc` pins
    /// that version for the caller even across a concurrent swap.
    pub fn load(&self) -> Arc<RuleSet> {
        Arc::clone(&*self.current.read())
    }

    /// Publish a new rule set, returning the one it replaced.
    pub fn swap(&self, rules: RuleSet) -> Arc<RuleSet> {
        let next = Arc::new(rules);
        let mut guard = self.current.write();
        log::info!("rule set {} -> {}", guard.version(), next.version());
        std::mem::replace(&mut *guard, next)
    }

    /// Derive the next rule set from the current one while holding the
    /// write lock, so a concurrent `swap` is never lost.
    pub fn update<F>(&self, f: F) -> Arc<RuleSet>
    where
        F: FnOnce(&RuleSet) -> RuleSet,
    {
        let mut guard = self.current.write();
        let next = Arc::new(f(&**guard));
        std::mem::replace(&mut *guard, next)
    }
}
