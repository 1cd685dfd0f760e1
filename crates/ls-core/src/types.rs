//! Core type definitions for linkscrub
//!
//! These types are shared by the cleaning engine, the rule compiler and the
//! cache snapshot format.

use serde::Deserialize;

// =============================================================================
// Engine Flags (global switches carried by a RuleSet)
// =============================================================================

bitflags::bitflags! {
    /// Global switches for a loaded rule set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineFlags: u16 {
        /// Complete providers cancel the whole URL
        const DOMAIN_BLOCKING = 1 << 0;
        /// Strip referral-marketing parameters too
        const REFERRAL_MARKETING = 1 << 1;
        /// Never rewrite localhost / intranet addresses
        const LOCAL_HOST_SKIPPING = 1 << 2;
        /// Log per-URL provider decisions at debug level
        const LOGGING = 1 << 3;
    }
}

impl Default for EngineFlags {
    fn default() -> Self {
        Self::DOMAIN_BLOCKING | Self::REFERRAL_MARKETING | Self::LOCAL_HOST_SKIPPING
    }
}

/// User-facing engine options.
///
/// Every field is optional when deserialized; missing fields keep the
/// defaults of [`EngineFlags::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CleanerOptions {
    pub domain_blocking_enabled: bool,
    pub referral_marketing_enabled: bool,
    pub local_host_skipping: bool,
    pub logging_enabled: bool,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        Self::from(EngineFlags::default())
    }
}

impl From<EngineFlags> for CleanerOptions {
    fn from(flags: EngineFlags) -> Self {
        Self {
            domain_blocking_enabled: flags.contains(EngineFlags::DOMAIN_BLOCKING),
            referral_marketing_enabled: flags.contains(EngineFlags::REFERRAL_MARKETING),
            local_host_skipping: flags.contains(EngineFlags::LOCAL_HOST_SKIPPING),
            logging_enabled: flags.contains(EngineFlags::LOGGING),
        }
    }
}

impl From<CleanerOptions> for EngineFlags {
    fn from(opts: CleanerOptions) -> Self {
        let mut flags = EngineFlags::empty();
        flags.set(EngineFlags::DOMAIN_BLOCKING, opts.domain_blocking_enabled);
        flags.set(EngineFlags::REFERRAL_MARKETING, opts.referral_marketing_enabled);
        flags.set(EngineFlags::LOCAL_HOST_SKIPPING, opts.local_host_skipping);
        flags.set(EngineFlags::LOGGING, opts.logging_enabled);
        flags
    }
}

// =============================================================================
// Provider Flags (bit flags for the cache provider table)
// =============================================================================

bitflags::bitflags! {
    /// Flags stored per provider.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProviderFlags: u16 {
        /// Any match cancels the URL when domain blocking is enabled
        const COMPLETE = 1 << 0;
    }
}

// =============================================================================
// Provider Spec
// =============================================================================

/// Uncompiled provider as it appears in a rule document or cache snapshot.
///
/// All patterns are kept as source strings; [`crate::provider::Provider`]
/// compiles them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderSpec {
    pub name: String,
    pub url_pattern: String,
    pub complete_provider: bool,
    pub rules: Vec<String>,
    pub raw_rules: Vec<String>,
    pub referral_marketing: Vec<String>,
    pub exceptions: Vec<String>,
    pub redirections: Vec<String>,
    /// Informational only; never consulted while cleaning.
    pub methods: Vec<String>,
}

impl ProviderSpec {
    pub fn flags(&self) -> ProviderFlags {
        if self.complete_provider {
            ProviderFlags::COMPLETE
        } else {
            ProviderFlags::empty()
        }
    }

    /// Total number of pattern strings carried by this provider.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
            + self.raw_rules.len()
            + self.referral_marketing.len()
            + self.exceptions.len()
            + self.redirections.len()
    }
}

// =============================================================================
// Cleaning Outcome
// =============================================================================

/// Result of running a URL through one stage of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleaningOutcome {
    /// Nothing was removed
    Unchanged(String),
    /// At least one parameter, segment or wrapper was removed
    Changed(String),
    /// A redirection rule extracted an embedded target; the pipeline must
    /// restart on it
    Redirected(String),
    /// The URL is suppressed entirely
    Cancelled,
}

impl CleaningOutcome {
    /// The URL carried by this outcome, `None` when cancelled.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Unchanged(url) | Self::Changed(url) | Self::Redirected(url) => Some(url),
            Self::Cancelled => None,
        }
    }

    /// Collapse into the string returned across the engine boundary.
    /// A cancelled URL becomes the empty string.
    pub fn into_string(self) -> String {
        match self {
            Self::Unchanged(url) | Self::Changed(url) | Self::Redirected(url) => url,
            Self::Cancelled => String::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short label for logging and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unchanged(_) => "unchanged",
            Self::Changed(_) => "changed",
            Self::Redirected(_) => "redirected",
            Self::Cancelled => "cancelled",
        }
    }
}
