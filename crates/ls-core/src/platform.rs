//! Per-platform post-processing
//!
//! A fixed, ordered list of host families. The first family whose host
//! pattern matches handles the URL; its steps run in order. Every step except
//! search-redirect unwrapping is a pure `ParsedUrl -> ParsedUrl` rewrite.

use regex::{Regex, RegexBuilder};

use crate::denylist::strip_tracking;
use crate::types::CleaningOutcome;
use crate::url::{decode_nested, encode_component, is_http_url, ParsedUrl};

/// One post-processing step.
#[derive(Debug)]
enum Step {
    /// Redirect endpoint at `path` carrying a full URL in one of `params`.
    /// `preserved` names survive on the unwrapped target even if cleaning
    /// would drop them.
    SearchRedirect {
        path: &'static str,
        params: &'static [&'static str],
        preserved: &'static [&'static str],
    },
    /// Brief video paths to `/watch?v={id}`.
    YoutubeShortPath,
    /// Host rewrite for cosmetic subdomains.
    SubdomainTrim { pattern: Regex, replacement: &'static str },
    /// Tracking tokens embedded as path segments.
    PathTrackers(Vec<Regex>),
    /// Parameter the page needs to render completely.
    InjectParam {
        path_prefix: &'static str,
        name: &'static str,
        value: &'static str,
    },
    /// Parameter holding a whole secondary URL.
    NestedParam {
        path_prefix: &'static str,
        params: &'static [&'static str],
    },
}

#[derive(Debug)]
struct HostFamily {
    name: &'static str,
    host: Regex,
    steps: Vec<Step>,
}

/// The ordered host-family table.
#[derive(Debug)]
pub struct PlatformOptimizer {
    families: Vec<HostFamily>,
}

impl Default for PlatformOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformOptimizer {
    pub fn new() -> Self {
        let mut families = Vec::new();
        let mut family = |name: &'static str, host: &str, steps: Vec<Option<Step>>| {
            if let Some(host) = compile(host) {
                families.push(HostFamily {
                    name,
                    host,
                    steps: steps.into_iter().flatten().collect(),
                });
            }
        };

        family(
            "google",
            r"^(?:www\.)?google\.[a-z]{2,3}(?:\.[a-z]{2})?$",
            vec![Some(Step::SearchRedirect {
                path: "/url",
                params: &["url", "q"],
                preserved: &["resourcekey"],
            })],
        );
        family(
            "youtube",
            r"^(?:www\.|m\.)?youtube\.com$",
            vec![
                Some(Step::SearchRedirect {
                    path: "/redirect",
                    params: &["q"],
                    preserved: &[],
                }),
                trim(r"^m\.", "www."),
                Some(Step::YoutubeShortPath),
            ],
        );
        family("youtu.be", r"^youtu\.be$", vec![Some(Step::YoutubeShortPath)]);
        family(
            "facebook",
            r"^(?:(?:www|m|mbasic|web|l|lm)\.)?facebook\.com$",
            vec![
                Some(Step::SearchRedirect {
                    path: "/l.php",
                    params: &["u"],
                    preserved: &[],
                }),
                trim(r"^(?:m|mbasic|web)\.", "www."),
                Some(Step::NestedParam {
                    path_prefix: "/sharer",
                    params: &["u"],
                }),
            ],
        );
        family(
            "twitter",
            r"^(?:www\.|mobile\.|m\.)?(?:twitter|x)\.com$",
            vec![
                trim(r"^(?:mobile|m)\.", ""),
                Some(Step::NestedParam {
                    path_prefix: "/intent/tweet",
                    params: &["url"],
                }),
                Some(Step::NestedParam {
                    path_prefix: "/share",
                    params: &["url"],
                }),
            ],
        );
        family(
            "twimg",
            r"^pbs\.twimg\.com$",
            vec![Some(Step::InjectParam {
                path_prefix: "/media/",
                name: "name",
                value: "orig",
            })],
        );
        family(
            "wikipedia",
            r"^[a-z0-9-]+\.m\.wikipedia\.org$",
            vec![trim(r"\.m\.wikipedia\.org$", ".wikipedia.org")],
        );
        family(
            "reddit",
            r"^(?:(?:www|old|np|amp|m)\.)?reddit\.com$",
            vec![trim(r"^(?:np|amp|m)\.", "www.")],
        );
        family(
            "amazon",
            r"^(?:www\.|smile\.)?amazon\.(?:com|ca|de|fr|it|es|nl|se|pl|in|sg|ae|sa|com\.au|com\.br|com\.mx|com\.tr|co\.uk|co\.jp)$",
            vec![
                trim(r"^smile\.", "www."),
                path_trackers(&[r"/ref=[^/?#]*"]),
            ],
        );
        family(
            "linkedin",
            r"^(?:www\.)?linkedin\.com$",
            vec![
                Some(Step::NestedParam {
                    path_prefix: "/shareArticle",
                    params: &["url"],
                }),
                Some(Step::NestedParam {
                    path_prefix: "/sharing/share-offsite",
                    params: &["url"],
                }),
            ],
        );

        Self { families }
    }

    /// Run the first matching family's steps.
    ///
    /// `clean_nested` runs a URL through the whole cleaning pipeline; it is
    /// only called by search-redirect unwrapping.
    pub fn optimize<F>(&self, url: &str, clean_nested: F) -> CleaningOutcome
    where
        F: Fn(&str) -> CleaningOutcome,
    {
        let mut parsed = match ParsedUrl::parse(url) {
            Some(parsed) => parsed,
            None => return CleaningOutcome::Unchanged(url.to_string()),
        };
        let family = match self.families.iter().find(|f| f.host.is_match(parsed.host())) {
            Some(family) => family,
            None => return CleaningOutcome::Unchanged(url.to_string()),
        };

        for step in &family.steps {
            if let Step::SearchRedirect { path, params, preserved } = step {
                if let Some(outcome) = unwrap_search_redirect(&parsed, path, params, preserved, &clean_nested) {
                    log::debug!("{}: unwrapped redirect endpoint", family.name);
                    return outcome;
                }
                continue;
            }
            parsed = apply_step(step, parsed);
        }

        let optimized = parsed.to_string();
        if optimized != url {
            CleaningOutcome::Changed(optimized)
        } else {
            CleaningOutcome::Unchanged(optimized)
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::warn!("platform pattern '{}' failed to compile: {}", pattern, err);
            None
        }
    }
}

fn trim(pattern: &str, replacement: &'static str) -> Option<Step> {
    compile(pattern).map(|pattern| Step::SubdomainTrim { pattern, replacement })
}

fn path_trackers(patterns: &[&str]) -> Option<Step> {
    Some(Step::PathTrackers(patterns.iter().filter_map(|p| compile(p)).collect()))
}

fn apply_step(step: &Step, parsed: ParsedUrl) -> ParsedUrl {
    match step {
        Step::SearchRedirect { .. } => parsed,
        Step::YoutubeShortPath => canonicalize_youtube_path(parsed),
        Step::SubdomainTrim { pattern, replacement } => trim_subdomain(parsed, pattern, replacement),
        Step::PathTrackers(patterns) => strip_path_trackers(parsed, patterns),
        Step::InjectParam { path_prefix, name, value } => inject_param(parsed, path_prefix, name, value),
        Step::NestedParam { path_prefix, params } => clean_nested_params(parsed, path_prefix, params),
    }
}

/// Pull the nested URL out of a redirect endpoint and clean it through the
/// whole pipeline. `None` when this URL is not such an endpoint.
fn unwrap_search_redirect<F>(
    parsed: &ParsedUrl,
    path: &str,
    params: &[&str],
    preserved: &[&str],
    clean_nested: &F,
) -> Option<CleaningOutcome>
where
    F: Fn(&str) -> CleaningOutcome,
{
    if parsed.path() != path {
        return None;
    }
    let nested = params.iter().find_map(|name| {
        let decoded = decode_nested(parsed.query_value(name)?);
        is_http_url(&decoded).then_some(decoded)
    })?;

    let kept: Vec<(String, String)> = match ParsedUrl::parse(&nested) {
        Some(original) => original
            .query_params()
            .iter()
            .filter(|p| preserved.iter().any(|name| p.name.eq_ignore_ascii_case(name)))
            .filter_map(|p| Some((p.name.clone(), p.value.clone()?)))
            .collect(),
        None => Vec::new(),
    };

    let outcome = clean_nested(&nested);
    if kept.is_empty() {
        return Some(changed(outcome));
    }

    let cleaned = match outcome.url() {
        Some(url) => url.to_string(),
        None => return Some(CleaningOutcome::Cancelled),
    };
    let mut target = match ParsedUrl::parse(&cleaned) {
        Some(target) => target,
        None => return Some(CleaningOutcome::Changed(cleaned)),
    };
    for (name, value) in &kept {
        if target.query_value(name).is_none() {
            target.set_query_param(name, value);
        }
    }
    Some(CleaningOutcome::Changed(target.to_string()))
}

/// Unwrapping always changes the URL; keep `Cancelled` as is.
fn changed(outcome: CleaningOutcome) -> CleaningOutcome {
    match outcome {
        CleaningOutcome::Unchanged(url) | CleaningOutcome::Redirected(url) => CleaningOutcome::Changed(url),
        other => other,
    }
}

fn canonicalize_youtube_path(mut parsed: ParsedUrl) -> ParsedUrl {
    let id = if parsed.host().eq_ignore_ascii_case("youtu.be") {
        first_segment(parsed.path())
    } else {
        let path = parsed.path();
        path.strip_prefix("/shorts/")
            .or_else(|| path.strip_prefix("/live/"))
            .and_then(first_segment_of)
    };
    let id = match id {
        Some(id) => id.to_string(),
        None => return parsed,
    };

    parsed.set_host("www.youtube.com");
    parsed.set_path("/watch");
    parsed.retain_query(|p| p.name != "v");
    parsed.prepend_query_param("v", &id);
    parsed
}

fn first_segment(path: &str) -> Option<&str> {
    first_segment_of(path.strip_prefix('/')?)
}

fn first_segment_of(rest: &str) -> Option<&str> {
    let segment = rest.split('/').next()?;
    (!segment.is_empty()).then_some(segment)
}

fn trim_subdomain(mut parsed: ParsedUrl, pattern: &Regex, replacement: &str) -> ParsedUrl {
    let host = parsed.host().to_string();
    let trimmed = pattern.replace(&host, replacement);
    if trimmed != host.as_str() {
        let trimmed = trimmed.into_owned();
        parsed.set_host(&trimmed);
    }
    parsed
}

fn strip_path_trackers(mut parsed: ParsedUrl, patterns: &[Regex]) -> ParsedUrl {
    let mut path = parsed.path().to_string();
    for pattern in patterns {
        path = pattern.replace_all(&path, "").into_owned();
    }
    if path != parsed.path() {
        parsed.set_path(&path);
    }
    parsed
}

fn inject_param(mut parsed: ParsedUrl, path_prefix: &str, name: &str, value: &str) -> ParsedUrl {
    if parsed.path().starts_with(path_prefix) {
        parsed.set_query_param(name, value);
    }
    parsed
}

fn clean_nested_params(mut parsed: ParsedUrl, path_prefix: &str, params: &[&str]) -> ParsedUrl {
    if !parsed.path().starts_with(path_prefix) {
        return parsed;
    }
    for name in params {
        let cleaned = parsed
            .query_value(name)
            .map(decode_nested)
            .filter(|nested| is_http_url(nested))
            .and_then(|nested| strip_tracking(&nested));
        if let Some(cleaned) = cleaned {
            parsed.set_query_param(name, &encode_component(&cleaned));
        }
    }
    parsed
}
