//! Rule document parser
//!
//! Reads the JSON provider document into [`ProviderSpec`]s. Provider order is
//! significant (it is the order the engine tries them), so the `providers`
//! object is read entry by entry rather than through a hash map.

use std::fmt;

use ls_core::types::ProviderSpec;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Error type for rule document parsing.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid rule document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rule document has no version")]
    MissingVersion,
}

/// A parsed rule document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDocument {
    pub version: String,
    pub providers: Vec<ProviderSpec>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    providers: OrderedProviders,
}

#[derive(Debug, Deserialize)]
struct VersionOnly {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawProvider {
    url_pattern: String,
    complete_provider: bool,
    rules: Vec<String>,
    raw_rules: Vec<String>,
    referral_marketing: Vec<String>,
    exceptions: Vec<String>,
    redirections: Vec<String>,
    methods: Vec<String>,
}

/// `providers` object entries in document order.
#[derive(Debug, Default)]
struct OrderedProviders(Vec<(String, RawProvider)>);

impl<'de> Deserialize<'de> for OrderedProviders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedProviders;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of providers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, provider)) = map.next_entry::<String, RawProvider>()? {
                    entries.push((name, provider));
                }
                Ok(OrderedProviders(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl RawProvider {
    fn into_spec(self, name: String) -> ProviderSpec {
        ProviderSpec {
            name,
            url_pattern: self.url_pattern,
            complete_provider: self.complete_provider,
            rules: self.rules,
            raw_rules: self.raw_rules,
            referral_marketing: self.referral_marketing,
            exceptions: self.exceptions,
            redirections: self.redirections,
            methods: self.methods,
        }
    }
}

fn require_version(version: Option<String>) -> Result<String, DocumentError> {
    match version {
        Some(version) if !version.trim().is_empty() => Ok(version.trim().to_string()),
        _ => Err(DocumentError::MissingVersion),
    }
}

/// Parse a rule document. Unknown keys are ignored and missing arrays
/// default to empty.
pub fn parse_rule_document(text: &str) -> Result<RuleDocument, DocumentError> {
    let raw: RawDocument = serde_json::from_str(text)?;
    let version = require_version(raw.version)?;
    let providers = raw
        .providers
        .0
        .into_iter()
        .map(|(name, provider)| provider.into_spec(name))
        .collect();
    Ok(RuleDocument { version, providers })
}

/// Read just the version of a rule document, skipping provider contents.
pub fn peek_version(text: &str) -> Result<String, DocumentError> {
    let raw: VersionOnly = serde_json::from_str(text)?;
    require_version(raw.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "version": "2024.06.1",
        "providers": {
            "zeta": { "urlPattern": "zeta\\.com", "rules": ["a", "b"] },
            "alpha": {
                "urlPattern": "alpha\\.com",
                "completeProvider": true,
                "rawRules": ["/ref=[^/?]*"],
                "referralMarketing": ["tag"],
                "exceptions": ["^https?://alpha\\.com/ok"],
                "redirections": ["alpha\\.com/r\\?u=([^&]+)"],
                "methods": ["GET"],
                "forceRedirection": true
            },
            "mid": { "urlPattern": "mid\\.com" }
        }
    }"#;

    #[test]
    fn test_parse_keeps_document_order() {
        let doc = parse_rule_document(DOC).unwrap();
        assert_eq!(doc.version, "2024.06.1");
        let names: Vec<&str> = doc.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_parse_fields_and_defaults() {
        let doc = parse_rule_document(DOC).unwrap();
        let alpha = &doc.providers[1];
        assert!(alpha.complete_provider);
        assert_eq!(alpha.raw_rules, vec!["/ref=[^/?]*"]);
        assert_eq!(alpha.referral_marketing, vec!["tag"]);
        assert_eq!(alpha.methods, vec!["GET"]);

        let mid = &doc.providers[2];
        assert!(!mid.complete_provider);
        assert!(mid.rules.is_empty());
        assert!(mid.redirections.is_empty());
    }

    #[test]
    fn test_missing_version() {
        assert!(matches!(
            parse_rule_document(r#"{"providers": {}}"#),
            Err(DocumentError::MissingVersion)
        ));
        assert!(matches!(
            parse_rule_document(r#"{"version": " ", "providers": {}}"#),
            Err(DocumentError::MissingVersion)
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_rule_document("{not json"), Err(DocumentError::Json(_))));
        assert!(matches!(
            parse_rule_document(r#"{"version": "1", "providers": []}"#),
            Err(DocumentError::Json(_))
        ));
    }

    #[test]
    fn test_peek_version() {
        assert_eq!(peek_version(DOC).unwrap(), "2024.06.1");
        assert!(peek_version(r#"{"providers": {}}"#).is_err());
    }
}
