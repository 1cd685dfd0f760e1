//! linkscrub Core Library
//!
//! This crate provides the URL cleaning engine: given a shared link it
//! unwraps archive and redirect wrappers, strips tracking parameters and
//! canonicalizes a handful of platform URLs.
//!
//! # Architecture
//!
//! Cleaning runs against an immutable [`RuleSet`] of providers compiled from
//! a rule document (or from the binary cache snapshot of one). A rule set is
//! never mutated; reloading publishes a new one atomically, so any number of
//! threads can clean concurrently.
//!
//! # Modules
//!
//! - `archive`: Archive-snapshot unwrapping and shared-text URL extraction
//! - `cleaner`: The cleaning pipeline
//! - `denylist`: Provider-independent tracking parameter names
//! - `hash`: Murmur3 build ids and CRC32 for cache snapshots
//! - `platform`: Per-platform post-processing
//! - `provider`: Compiled provider rules
//! - `rules`: Immutable rule sets and atomic reload
//! - `snapshot`: LSC cache snapshot format and zero-copy loader
//! - `stripper`: Field and raw rule stripping for one provider
//! - `types`: Shared type definitions
//! - `url`: URL slicing and the transient parsed form

pub mod archive;
pub mod cleaner;
pub mod denylist;
pub mod hash;
pub mod platform;
pub mod provider;
pub mod rules;
pub mod snapshot;
pub mod stripper;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use archive::{extract_candidate, unwrap_archive};
pub use cleaner::{Cleaner, MAX_REENTRIES};
pub use provider::{PatternError, Provider};
pub use rules::{RuleSet, SharedRuleSet};
pub use snapshot::{CacheSnapshot, SnapshotError};
pub use types::{CleanerOptions, CleaningOutcome, EngineFlags, ProviderFlags, ProviderSpec};
