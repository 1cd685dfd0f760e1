use std::collections::HashSet;

use ls_core::types::ProviderSpec;

pub struct OptimizeStats {
    pub providers_before: usize,
    pub providers_after: usize,
    pub duplicate_providers: usize,
    pub rules_before: usize,
    pub rules_after: usize,
    pub rules_deduped: usize,
    pub empty_rules: usize,
}

/// Drop repeated providers (first one wins), then repeated pattern strings
/// within each rule list, and empty ones from the field, raw and redirection
/// lists. Order is otherwise preserved.
pub fn optimize_providers(providers: &mut Vec<ProviderSpec>) -> OptimizeStats {
    let providers_before = providers.len();
    let rules_before: usize = providers.iter().map(ProviderSpec::rule_count).sum();

    let mut names: HashSet<String> = HashSet::new();
    let mut duplicate_providers = 0usize;
    providers.retain(|provider| {
        if names.insert(provider.name.clone()) {
            true
        } else {
            log::warn!("duplicate provider '{}' ignored", provider.name);
            duplicate_providers += 1;
            false
        }
    });

    let mut rules_deduped = 0usize;
    let mut empty_rules = 0usize;
    for provider in providers.iter_mut() {
        // empty exception and referral entries still match, so they stay
        for (list, drop_empty) in [
            (&mut provider.rules, true),
            (&mut provider.raw_rules, true),
            (&mut provider.referral_marketing, false),
            (&mut provider.exceptions, false),
            (&mut provider.redirections, true),
        ] {
            let (deduped, empty) = dedupe_list(list, drop_empty);
            rules_deduped += deduped;
            empty_rules += empty;
        }
    }

    let rules_after = providers.iter().map(ProviderSpec::rule_count).sum();

    OptimizeStats {
        providers_before,
        providers_after: providers.len(),
        duplicate_providers,
        rules_before,
        rules_after,
        rules_deduped,
        empty_rules,
    }
}

fn dedupe_list(list: &mut Vec<String>, drop_empty: bool) -> (usize, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped = 0usize;
    let mut empty = 0usize;
    list.retain(|rule| {
        if drop_empty && rule.is_empty() {
            empty += 1;
            false
        } else if seen.contains(rule) {
            deduped += 1;
            false
        } else {
            seen.insert(rule.clone());
            true
        }
    });
    (deduped, empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, rules: &[&str]) -> ProviderSpec {
        ProviderSpec {
            name: name.to_string(),
            url_pattern: format!("{name}\\.com"),
            rules: rules.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn dedupes_rules_in_order() {
        let mut providers = vec![provider("a", &["x", "y", "x", "", "z", "y"])];
        let stats = optimize_providers(&mut providers);
        assert_eq!(providers[0].rules, vec!["x", "y", "z"]);
        assert_eq!(stats.rules_before, 6);
        assert_eq!(stats.rules_after, 3);
        assert_eq!(stats.rules_deduped, 2);
        assert_eq!(stats.empty_rules, 1);
    }

    #[test]
    fn first_duplicate_provider_wins() {
        let mut providers = vec![provider("a", &["x"]), provider("b", &[]), provider("a", &["y"])];
        let stats = optimize_providers(&mut providers);
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].rules, vec!["x"]);
        assert_eq!(stats.duplicate_providers, 1);
        assert_eq!(stats.providers_after, 2);
    }

    #[test]
    fn same_rule_in_different_lists_is_kept() {
        let mut providers = vec![ProviderSpec {
            referral_marketing: vec!["tag".to_string()],
            ..provider("a", &["tag"])
        }];
        let stats = optimize_providers(&mut providers);
        assert_eq!(stats.rules_deduped, 0);
        assert_eq!(providers[0].referral_marketing, vec!["tag"]);
    }

    #[test]
    fn empty_exception_is_kept() {
        let mut providers = vec![ProviderSpec {
            exceptions: vec![String::new(), String::new()],
            redirections: vec![String::new()],
            ..provider("a", &["x"])
        }];
        let stats = optimize_providers(&mut providers);
        assert_eq!(providers[0].exceptions, vec![String::new()]);
        assert!(providers[0].redirections.is_empty());
        assert_eq!(stats.empty_rules, 1);
        assert_eq!(stats.rules_deduped, 1);
    }
}
