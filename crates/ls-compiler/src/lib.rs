//! linkscrub Rule Compiler
//!
//! This crate turns a JSON provider document into a [`ls_core::RuleSet`],
//! and persists the parsed rules as an LSC cache snapshot keyed by the
//! document version.

pub mod parser;
pub mod optimizer;
pub mod builder;
pub mod cache;

pub use builder::build_snapshot;
pub use cache::{load_rule_set, CacheError, LoadedRules, RuleSource};
pub use optimizer::optimize_providers;
pub use parser::{parse_rule_document, peek_version, DocumentError, RuleDocument};

/// The provider document shipped with the crate.
pub const PACKAGED_RULES: &str = include_str!("../rules/providers.json");

/// Load the packaged rules, through the cache at `cache_path` if given.
pub fn load_packaged(cache_path: Option<&std::path::Path>, flags: ls_core::EngineFlags) -> LoadedRules {
    load_rule_set(PACKAGED_RULES, cache_path, flags)
}
