//! Field stripping for one matched provider
//!
//! Raw rules run over the whole URL string first, then the URL is re-parsed
//! and every query or fragment parameter whose name matches a field rule is
//! dropped.

use crate::provider::Provider;
use crate::types::{CleaningOutcome, EngineFlags};
use crate::url::ParsedUrl;

/// Strip one provider's raw and field rules from `url`.
///
/// Returns `Changed` when any substitution or removal altered the URL,
/// otherwise `Unchanged`.
pub fn strip_provider(provider: &Provider, url: &str, flags: EngineFlags) -> CleaningOutcome {
    let mut changed = false;
    let mut current = match provider.apply_raw_rules(url) {
        Some(stripped) => {
            changed = true;
            stripped
        }
        None => url.to_string(),
    };

    if let Some(mut parsed) = ParsedUrl::parse(&current) {
        if changed {
            parsed.normalize();
            current = parsed.to_string();
        }
        let removed = strip_fields(provider, &mut parsed, flags);
        if removed > 0 {
            if flags.contains(EngineFlags::LOGGING) {
                log::debug!("{}: removed {} parameter(s)", provider.name(), removed);
            }
            current = parsed.to_string();
            changed = true;
        }
    }

    if changed && current != url {
        CleaningOutcome::Changed(current)
    } else {
        CleaningOutcome::Unchanged(current)
    }
}

/// Remove query and fragment parameters whose names match a field rule.
/// Returns the number of parameters removed.
pub fn strip_fields(provider: &Provider, parsed: &mut ParsedUrl, flags: EngineFlags) -> usize {
    let removed_query = parsed.retain_query(|param| !provider.matches_field(&param.name, flags));
    let removed_fragment = parsed.retain_fragment(|param| !provider.matches_field(&param.name, flags));
    removed_query + removed_fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderSpec;

    fn compile(rules: &[&str], raw_rules: &[&str]) -> Provider {
        let spec = ProviderSpec {
            name: "test".to_string(),
            url_pattern: ".*".to_string(),
            rules: rules.iter().map(|r| r.to_string()).collect(),
            raw_rules: raw_rules.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        };
        Provider::compile(&spec, &mut Vec::new())
    }

    #[test]
    fn test_preserves_non_tracking_params() {
        let provider = compile(&["m_entstream_source", "hc_[a-z_%\\[\\]0-9]*"], &[]);
        let outcome = strip_provider(
            &provider,
            "https://www.facebook.com/story.php?story_fbid=12345&id=6789&m_entstream_source=timeline",
            EngineFlags::default(),
        );
        assert_eq!(
            outcome,
            CleaningOutcome::Changed("https://www.facebook.com/story.php?story_fbid=12345&id=6789".to_string())
        );
    }

    #[test]
    fn test_first_param_removed_leaves_no_artifact() {
        let provider = compile(&["utm_[a-z]+"], &[]);
        let outcome = strip_provider(
            &provider,
            "https://example.com/a?utm_source=x&id=1#utm_medium=y&keep",
            EngineFlags::default(),
        );
        assert_eq!(outcome, CleaningOutcome::Changed("https://example.com/a?id=1#keep".to_string()));
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        let provider = compile(&["x"], &[]);
        let outcome = strip_provider(&provider, "https://e.com/?a=1&x=2&a=3&b", EngineFlags::default());
        assert_eq!(outcome, CleaningOutcome::Changed("https://e.com/?a=1&a=3&b".to_string()));
    }

    #[test]
    fn test_unchanged_when_nothing_matches() {
        let provider = compile(&["gclid"], &[r"/ref=[^/?]*"]);
        let url = "https://example.com/path?q=rust";
        assert_eq!(
            strip_provider(&provider, url, EngineFlags::default()),
            CleaningOutcome::Unchanged(url.to_string())
        );
    }

    #[test]
    fn test_raw_rule_then_fields() {
        let provider = compile(&["tag"], &[r"/ref=[^/?]*"]);
        let outcome = strip_provider(
            &provider,
            "https://www.amazon.com/dp/B07PXRGG6Z/ref=cm_sw_r?tag=abc-20&th=1",
            EngineFlags::default(),
        );
        assert_eq!(
            outcome,
            CleaningOutcome::Changed("https://www.amazon.com/dp/B07PXRGG6Z?th=1".to_string())
        );
    }

    #[test]
    fn test_raw_rule_leftovers_normalized() {
        let provider = compile(&[], &["tracker=[^&]*"]);
        let flags = EngineFlags::default();
        assert_eq!(
            strip_provider(&provider, "https://e.com/p?tracker=1&b=2", flags),
            CleaningOutcome::Changed("https://e.com/p?b=2".to_string())
        );
        assert_eq!(
            strip_provider(&provider, "https://e.com/p?tracker=1", flags),
            CleaningOutcome::Changed("https://e.com/p".to_string())
        );
        assert_eq!(
            strip_provider(&provider, "https://e.com/p?a=1&tracker=1&b=2", flags),
            CleaningOutcome::Changed("https://e.com/p?a=1&b=2".to_string())
        );
    }
}
