//! Compiled providers
//!
//! A provider that fails to compile never takes the rule set down with it:
//! a bad `urlPattern` disables that provider, a bad individual rule is
//! dropped while the provider's other rules stay live.

use regex::{Regex, RegexBuilder};

use crate::types::{EngineFlags, ProviderSpec};
use crate::url::decode_nested;

/// Which list of a provider a pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternField {
    UrlPattern,
    Rule,
    RawRule,
    ReferralMarketing,
    Exception,
    Redirection,
}

impl PatternField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlPattern => "urlPattern",
            Self::Rule => "rules",
            Self::RawRule => "rawRules",
            Self::ReferralMarketing => "referralMarketing",
            Self::Exception => "exceptions",
            Self::Redirection => "redirections",
        }
    }
}

/// A single pattern that failed to compile.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider '{provider}': invalid {} pattern '{pattern}': {source}", .field.as_str())]
pub struct PatternError {
    pub provider: String,
    pub field: PatternField,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// A provider with every pattern compiled.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    /// `None` when the pattern failed to compile; the provider never matches.
    url_pattern: Option<Regex>,
    complete: bool,
    field_rules: Vec<Regex>,
    referral_rules: Vec<Regex>,
    raw_rules: Vec<Regex>,
    exceptions: Vec<Regex>,
    redirections: Vec<Regex>,
}

impl Provider {
    /// Compile a provider, collecting (not propagating) pattern errors.
    pub fn compile(spec: &ProviderSpec, errors: &mut Vec<PatternError>) -> Self {
        let url_pattern = match compile_pattern(PatternField::UrlPattern, &spec.url_pattern) {
            Ok(regex) => Some(regex),
            Err(source) => {
                errors.push(PatternError {
                    provider: spec.name.clone(),
                    field: PatternField::UrlPattern,
                    pattern: spec.url_pattern.clone(),
                    source,
                });
                None
            }
        };

        let field_rules = compile_list(&spec.name, PatternField::Rule, &spec.rules, errors);
        let referral_rules =
            compile_list(&spec.name, PatternField::ReferralMarketing, &spec.referral_marketing, errors);
        let raw_rules = compile_list(&spec.name, PatternField::RawRule, &spec.raw_rules, errors);
        let exceptions = compile_list(&spec.name, PatternField::Exception, &spec.exceptions, errors);
        let redirections = compile_list(&spec.name, PatternField::Redirection, &spec.redirections, errors);

        Self {
            name: spec.name.clone(),
            url_pattern,
            complete: spec.complete_provider,
            field_rules,
            referral_rules,
            raw_rules,
            exceptions,
            redirections,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// False when the url pattern failed to compile.
    pub fn is_enabled(&self) -> bool {
        self.url_pattern.is_some()
    }

    /// The pattern finds somewhere in the URL and no exception does.
    pub fn matches(&self, url: &str) -> bool {
        let pattern = match &self.url_pattern {
            Some(pattern) => pattern,
            None => return false,
        };
        pattern.is_match(url) && !self.exceptions.iter().any(|e| e.is_match(url))
    }

    /// Embedded target of the first redirection rule that captures,
    /// percent-decoded.
    pub fn redirect_target(&self, url: &str) -> Option<String> {
        self.redirections.iter().find_map(|redirection| {
            let captured = redirection.captures(url)?.get(1)?.as_str();
            if captured.is_empty() {
                return None;
            }
            Some(decode_nested(captured))
        })
    }

    /// Apply every raw rule to the full URL string.
    /// Returns `None` when nothing was substituted.
    pub fn apply_raw_rules(&self, url: &str) -> Option<String> {
        let mut current = url.to_string();
        let mut changed = false;
        for rule in &self.raw_rules {
            let replaced = rule.replace_all(&current, "");
            if replaced != current.as_str() {
                current = replaced.into_owned();
                changed = true;
            }
        }
        changed.then_some(current)
    }

    /// Field rules in declared order; referral-marketing rules follow when
    /// referral stripping is enabled.
    pub fn field_rules<'a>(&'a self, flags: EngineFlags) -> impl Iterator<Item = &'a Regex> + 'a {
        let referral: &[Regex] = if flags.contains(EngineFlags::REFERRAL_MARKETING) {
            &self.referral_rules
        } else {
            &[]
        };
        self.field_rules.iter().chain(referral.iter())
    }

    /// Does any active field rule match this parameter name?
    pub fn matches_field(&self, name: &str, flags: EngineFlags) -> bool {
        self.field_rules(flags).any(|rule| rule.is_match(name))
    }

    /// Number of live compiled rules (diagnostics).
    pub fn compiled_rule_count(&self) -> usize {
        self.field_rules.len()
            + self.referral_rules.len()
            + self.raw_rules.len()
            + self.exceptions.len()
            + self.redirections.len()
    }
}

fn compile_list(
    provider: &str,
    field: PatternField,
    patterns: &[String],
    errors: &mut Vec<PatternError>,
) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match compile_pattern(field, pattern) {
            Ok(regex) => Some(regex),
            Err(source) => {
                errors.push(PatternError {
                    provider: provider.to_string(),
                    field,
                    pattern: pattern.clone(),
                    source,
                });
                None
            }
        })
        .collect()
}

/// Compile one pattern case-insensitively. Field rules are anchored so they
/// must match a whole parameter name.
fn compile_pattern(field: PatternField, pattern: &str) -> Result<Regex, regex::Error> {
    let source = match field {
        PatternField::Rule | PatternField::ReferralMarketing => format!("^(?:{pattern})$"),
        _ => pattern.to_string(),
    };
    RegexBuilder::new(&source).case_insensitive(true).build()
}
