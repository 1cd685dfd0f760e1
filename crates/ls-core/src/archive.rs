//! Archive-snapshot unwrapping and shared-text URL extraction
//!
//! `https://archive.ph/o/{hash}/{embeddedUrl}` style links are reduced to the
//! embedded URL's origin and path. Anything after `?` or `#` in the embedded
//! part is dropped, since trackers are often smuggled through the wrapper.

use crate::url::{decode_nested, extract_host, get_scheme_end, has_scheme, is_http_url};

/// Mirror domains of the archive-snapshot service.
const ARCHIVE_TLDS: &[&str] = &["today", "ph", "is", "fo", "li", "md", "vn"];

/// Characters trimmed from the end of a URL found in free text. Closing
/// brackets are handled separately by [`trim_trailing`].
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '>', '"', '\''];

fn is_archive_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    match host.strip_prefix("archive.") {
        Some(tld) => ARCHIVE_TLDS.contains(&tld),
        None => false,
    }
}

/// Recover the URL embedded in an archive-snapshot link.
/// Returns `None` when `input` is not such a link.
pub fn unwrap_archive(input: &str) -> Option<String> {
    if !is_http_url(input) {
        return None;
    }
    let host = extract_host(input)?;
    if !is_archive_host(host) {
        return None;
    }

    let scheme_end = get_scheme_end(input)?;
    let after_authority = scheme_end + input[scheme_end..].find('/')?;
    let rest = input[after_authority..].strip_prefix("/o/")?;

    let slash = rest.find('/')?;
    let hash = &rest[..slash];
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    let embedded = &rest[slash + 1..];
    if embedded.is_empty() {
        return None;
    }

    let embedded = if has_scheme(embedded) {
        embedded.to_string()
    } else {
        let decoded = decode_nested(embedded);
        if has_scheme(&decoded) {
            decoded
        } else {
            return Some(embedded.to_string());
        }
    };

    let end = embedded.find(|c| c == '?' || c == '#').unwrap_or(embedded.len());
    Some(embedded[..end].to_string())
}

/// Pick the first http(s) URL out of shared text (share-sheet payloads
/// often wrap the link in a title or message).
pub fn extract_candidate(text: &str) -> Option<&str> {
    text.split_whitespace().find_map(|token| {
        let lower = token.to_ascii_lowercase();
        let start = lower.find("https://").or_else(|| lower.find("http://"))?;
        let candidate = trim_trailing(&token[start..]);
        (candidate.len() > "https://".len()).then_some(candidate)
    })
}

/// Strip sentence punctuation, and closing brackets that have no opening
/// partner inside the URL.
fn trim_trailing(candidate: &str) -> &str {
    let mut end = candidate;
    while let Some(last) = end.chars().last() {
        let strip = match last {
            ')' => end.matches('(').count() < end.matches(')').count(),
            ']' => end.matches('[').count() < end.matches(']').count(),
            '}' => end.matches('{').count() < end.matches('}').count(),
            c => TRAILING_PUNCTUATION.contains(&c),
        };
        if !strip {
            break;
        }
        end = &end[..end.len() - last.len_utf8()];
    }
    end
}
