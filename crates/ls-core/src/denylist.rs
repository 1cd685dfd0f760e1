//! Provider-independent tracking parameter denylist
//!
//! An explicit, enumerated set of parameter names. Matching is on names only
//! (ASCII case-insensitive), never on values, and never by pattern.

use crate::url::ParsedUrl;

/// UTM campaign parameters.
const UTM_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "utm_name",
    "utm_cid",
    "utm_reader",
    "utm_referrer",
    "utm_social",
    "utm_social-type",
    "utm_brand",
    "utm_place",
    "utm_pubreferrer",
    "utm_swu",
    "utm_viz_id",
];

/// Click identifiers appended by ad and social platforms.
const CLICK_ID_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "gclsrc",
    "dclid",
    "gbraid",
    "wbraid",
    "msclkid",
    "twclid",
    "ttclid",
    "yclid",
    "igshid",
    "igsh",
    "li_fat_id",
    "epik",
    "rb_clickid",
    "s_kwcid",
    "srsltid",
];

/// Email and marketing-automation identifiers.
const AD_NETWORK_PARAMS: &[&str] = &[
    "mc_cid",
    "mc_eid",
    "_hsenc",
    "_hsmi",
    "__hstc",
    "__hssc",
    "__hsfp",
    "hsctatracking",
    "mkt_tok",
    "oly_anon_id",
    "oly_enc_id",
    "vero_conv",
    "vero_id",
    "wickedid",
    "_openstat",
    "trk_contact",
    "trk_msg",
    "trk_module",
    "trk_sid",
    "cmpid",
];

/// Referral and share-session identifiers.
const REFERRAL_PARAMS: &[&str] = &[
    "si",
    "ref_src",
    "ref_url",
    "share_id",
    "sharing_id",
    "_branch_match_id",
    "_branch_referrer",
    "__twitter_impression",
    "ga_source",
    "ga_medium",
    "ga_campaign",
    "ga_content",
    "ga_term",
];

/// Is this parameter name on the denylist?
pub fn is_tracking_param(name: &str) -> bool {
    [UTM_PARAMS, CLICK_ID_PARAMS, AD_NETWORK_PARAMS, REFERRAL_PARAMS]
        .iter()
        .any(|list| list.iter().any(|p| p.eq_ignore_ascii_case(name)))
}

/// Remove every denylisted query parameter. Returns the number removed.
pub fn strip_tracking_params(parsed: &mut ParsedUrl) -> usize {
    parsed.retain_query(|param| !is_tracking_param(&param.name))
}

/// Denylist pass over a URL string. `None` when nothing was removed or the
/// string is not a URL.
pub fn strip_tracking(url: &str) -> Option<String> {
    let mut parsed = ParsedUrl::parse(url)?;
    if strip_tracking_params(&mut parsed) == 0 {
        return None;
    }
    Some(parsed.to_string())
}
