//! Cleaning pipeline
//!
//! Every URL goes through here: archive unwrap, provider stripping and
//! redirection, the tracking denylist, then per-platform post-processing.
//! The only shared state is the current [`RuleSet`], pinned per call.

use std::sync::Arc;

use crate::archive::{extract_candidate, unwrap_archive};
use crate::denylist::strip_tracking;
use crate::platform::PlatformOptimizer;
use crate::rules::{RuleSet, SharedRuleSet};
use crate::stripper::strip_provider;
use crate::types::{CleaningOutcome, EngineFlags};
use crate::url::{has_scheme, is_local_host, looks_like_bare_domain, ParsedUrl};

/// Cap on pipeline re-entries through redirection rules and nested URLs.
pub const MAX_REENTRIES: usize = 10;

// =============================================================================
// Cleaner
// =============================================================================

/// The cleaning engine.
///
/// Cheap to share across threads; `clean` never blocks on anything except
/// the pointer read of the current rule set.
#[derive(Debug)]
pub struct Cleaner {
    rules: SharedRuleSet,
    platform: PlatformOptimizer,
}

impl Cleaner {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: SharedRuleSet::new(rules),
            platform: PlatformOptimizer::new(),
        }
    }

    /// The rule set calls are currently cleaned against.
    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules.load()
    }

    /// Replace the rule set. Calls already in flight finish on the old one.
    pub fn reload(&self, rules: RuleSet) -> Arc<RuleSet> {
        self.rules.swap(rules)
    }

    /// Keep the providers, change the global switches.
    pub fn set_flags(&self, flags: EngineFlags) {
        self.rules.update(|current| current.with_flags(flags));
    }

    /// Clean one URL. Returns the empty string when the URL is cancelled.
    pub fn clean(&self, input: &str) -> String {
        self.clean_outcome(input).into_string()
    }

    /// Clean one URL and report what happened. Never `Redirected`.
    pub fn clean_outcome(&self, input: &str) -> CleaningOutcome {
        let rules = self.rules.load();
        self.clean_at_depth(&rules, input, 0)
    }

    /// Clean the first URL found in shared text, or the text itself when it
    /// holds no http(s) URL.
    pub fn clean_text(&self, text: &str) -> String {
        self.clean_text_outcome(text).into_string()
    }

    /// [`Cleaner::clean_text`], reporting what happened.
    pub fn clean_text_outcome(&self, text: &str) -> CleaningOutcome {
        self.clean_outcome(extract_candidate(text).unwrap_or(text))
    }

    fn clean_at_depth(&self, rules: &RuleSet, input: &str, depth: usize) -> CleaningOutcome {
        let trimmed = input.trim();
        if !has_scheme(trimmed) {
            if looks_like_bare_domain(trimmed) {
                let outcome = self.clean_at_depth(rules, &format!("https://{trimmed}"), depth);
                return settle(input, outcome);
            }
            return CleaningOutcome::Unchanged(input.to_string());
        }

        let flags = rules.flags();
        let mut depth = depth;
        let mut current = trimmed.to_string();

        loop {
            if let Some(unwrapped) = unwrap_archive(&current) {
                log_decision(flags, format_args!("archive unwrap -> {}", unwrapped));
                if !has_scheme(&unwrapped) {
                    // embedded value may be a bare domain; it shrinks every pass
                    return settle(input, self.clean_at_depth(rules, &unwrapped, depth));
                }
                current = unwrapped;
            }

            let parsed = match ParsedUrl::parse(&current) {
                Some(parsed) => parsed,
                None => return settle(input, CleaningOutcome::Unchanged(current)),
            };
            if flags.contains(EngineFlags::LOCAL_HOST_SKIPPING) && is_local_host(parsed.host()) {
                return settle(input, CleaningOutcome::Unchanged(current));
            }

            match self.apply_providers(rules, &current) {
                CleaningOutcome::Redirected(target) => {
                    if depth >= MAX_REENTRIES {
                        log::warn!("redirection limit reached at {}", target);
                        current = target;
                        break;
                    }
                    depth += 1;
                    current = target;
                }
                CleaningOutcome::Cancelled => return CleaningOutcome::Cancelled,
                CleaningOutcome::Changed(url) | CleaningOutcome::Unchanged(url) => {
                    current = url;
                    break;
                }
            }
        }

        if let Some(stripped) = strip_tracking(&current) {
            current = stripped;
        }

        let optimized = self.platform.optimize(&current, |nested| {
            if depth >= MAX_REENTRIES {
                log::warn!("nested URL limit reached at {}", nested);
                return CleaningOutcome::Unchanged(nested.to_string());
            }
            self.clean_at_depth(rules, nested, depth + 1)
        });

        match optimized.url() {
            Some(url) => settle(input, CleaningOutcome::Unchanged(url.to_string())),
            None => CleaningOutcome::Cancelled,
        }
    }

    /// Run every matching provider in order.
    ///
    /// Redirection wins over everything else a provider declares; a complete
    /// provider cancels when domain blocking is on. Otherwise the provider's
    /// raw and field rules are stripped and the next provider sees the result.
    pub fn apply_providers(&self, rules: &RuleSet, url: &str) -> CleaningOutcome {
        let flags = rules.flags();
        let mut current = url.to_string();
        let mut changed = false;

        for provider in rules.providers() {
            if !provider.matches(&current) {
                continue;
            }

            if let Some(target) = provider.redirect_target(&current) {
                log_decision(flags, format_args!("{}: redirect -> {}", provider.name(), target));
                return CleaningOutcome::Redirected(target);
            }

            if provider.is_complete() && flags.contains(EngineFlags::DOMAIN_BLOCKING) {
                log_decision(flags, format_args!("{}: blocked", provider.name()));
                return CleaningOutcome::Cancelled;
            }

            if let CleaningOutcome::Changed(stripped) = strip_provider(provider, &current, flags) {
                current = stripped;
                changed = true;
            }
        }

        if changed {
            CleaningOutcome::Changed(current)
        } else {
            CleaningOutcome::Unchanged(current)
        }
    }
}

/// Label the final URL against what the caller passed in.
fn settle(input: &str, outcome: CleaningOutcome) -> CleaningOutcome {
    match outcome {
        CleaningOutcome::Cancelled => CleaningOutcome::Cancelled,
        other => {
            let url = other.into_string();
            if url == input {
                CleaningOutcome::Unchanged(url)
            } else {
                CleaningOutcome::Changed(url)
            }
        }
    }
}

fn log_decision(flags: EngineFlags, args: std::fmt::Arguments<'_>) {
    if flags.contains(EngineFlags::LOGGING) {
        log::debug!("{}", args);
    }
}
