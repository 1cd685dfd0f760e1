use std::sync::Arc;

use ls_compiler::{load_packaged, load_rule_set, RuleSource};
use ls_core::{unwrap_archive, Cleaner, CleaningOutcome, EngineFlags};

fn packaged(flags: EngineFlags) -> Cleaner {
    let loaded = load_packaged(None, flags);
    assert_eq!(loaded.source, RuleSource::Document);
    Cleaner::new(loaded.rules)
}

const CORPUS: &[&str] = &[
    "https://www.google.com/url?sa=t&url=https%3A%2F%2Fexample.com",
    "https://www.google.com/search?q=rust&sxsrf=abc&ei=xyz&ved=0",
    "https://www.facebook.com/story.php?story_fbid=12345&id=6789&m_entstream_source=timeline",
    "https://l.facebook.com/l.php?u=https%3A%2F%2Fexample.com%2Fpage%3Ffbclid%3Dxyz&h=AT0",
    "https://www.amazon.com/dp/B07PXRGG6Z/ref=cm_sw_r_cp_api_glt_i_AB12CD34",
    "https://smile.amazon.de/dp/B0/ref=sr_1_1?keywords=x&qid=1&sr=8-1&tag=aff-21",
    "https://www.youtube.com/watch?v=dQw4w9WgXcQ&feature=share&si=abc",
    "https://youtu.be/dQw4w9WgXcQ?si=abc&t=42",
    "https://x.com/user/status/123?s=20&t=abcdef",
    "https://mobile.twitter.com/user/status/1?ref_src=twsrc",
    "https://en.m.wikipedia.org/wiki/Rust?utm_source=x",
    "https://www.reddit.com/r/rust/comments/abc/?share_id=xyz&utm_medium=android_app",
    "https://open.spotify.com/track/123?si=abcdef",
    "https://pbs.twimg.com/media/Fabc?format=jpg&name=small",
    "https://www.tiktok.com/@user/video/123?is_from_webapp=1&sender_device=pc&web_id=999",
    "https://archive.ph/o/AbC12/https://www.example.com/article?utm_source=x",
    "https://ad.doubleclick.net/ddm/clk/1;adurl=https%3A%2F%2Fshop.example%2Fitem%3Futm_source%3Ddc",
    "https://docs.rs/regex/latest/regex/#syntax",
    "example.com/?utm_campaign=x",
    "http://localhost:8080/?utm_source=x",
    "not a url",
    "https://пример.рф/?utm_source=x",
    "https://archive.ph/o/Ab12/www.example.com/a?utm_source=x",
    "https://youtu.be/abc?v=zzz",
    "https://en.wikipedia.org/wiki/Rust_(programming_language)",
];

#[test]
fn packaged_rules_compile_cleanly() {
    let loaded = load_packaged(None, EngineFlags::default());
    assert!(loaded.rules.pattern_errors().is_empty(), "{:?}", loaded.rules.pattern_errors());
    assert_eq!(loaded.rules.providers()[0].name(), "globalRules");
    assert!(loaded.rules.providers().len() > 10);
}

#[test]
fn cleaning_is_idempotent() {
    let cleaner = packaged(EngineFlags::default());
    for url in CORPUS {
        let once = cleaner.clean(url);
        assert_eq!(cleaner.clean(&once), once, "not idempotent for {url}");
    }
}

#[test]
fn documented_examples() {
    let cleaner = packaged(EngineFlags::default());
    assert_eq!(
        cleaner.clean("https://www.google.com/url?sa=t&url=https%3A%2F%2Fexample.com"),
        "https://example.com"
    );
    assert_eq!(
        cleaner.clean("https://www.facebook.com/story.php?story_fbid=12345&id=6789&m_entstream_source=timeline"),
        "https://www.facebook.com/story.php?story_fbid=12345&id=6789"
    );
    assert_eq!(
        cleaner.clean("https://www.amazon.com/dp/B07PXRGG6Z/ref=cm_sw_r_cp_api_glt_i_AB12CD34"),
        "https://www.amazon.com/dp/B07PXRGG6Z"
    );
}

#[test]
fn platform_examples() {
    let cleaner = packaged(EngineFlags::default());
    let cases = [
        ("https://youtu.be/dQw4w9WgXcQ?si=abc&t=42", "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
        ("https://x.com/user/status/123?s=20&t=abcdef", "https://x.com/user/status/123"),
        ("https://mobile.twitter.com/user/status/1?ref_src=twsrc", "https://twitter.com/user/status/1"),
        ("https://en.m.wikipedia.org/wiki/Rust?utm_source=x", "https://en.wikipedia.org/wiki/Rust"),
        ("https://smile.amazon.de/dp/B0/ref=sr_1_1?keywords=x&qid=1&sr=8-1&tag=aff-21", "https://www.amazon.de/dp/B0?keywords=x"),
        ("https://pbs.twimg.com/media/Fabc?format=jpg&name=small", "https://pbs.twimg.com/media/Fabc?format=jpg&name=orig"),
        ("https://l.facebook.com/l.php?u=https%3A%2F%2Fexample.com%2Fpage%3Ffbclid%3Dxyz&h=AT0", "https://example.com/page"),
        ("https://www.google.com/search?q=rust&sxsrf=abc&ei=xyz&ved=0", "https://www.google.com/search?q=rust"),
    ];
    for (input, expected) in cases {
        assert_eq!(cleaner.clean(input), expected, "{input}");
    }
}

#[test]
fn local_host_is_left_alone() {
    let cleaner = packaged(EngineFlags::default());
    assert_eq!(
        cleaner.clean_outcome("http://localhost/a?x=1"),
        CleaningOutcome::Unchanged("http://localhost/a?x=1".to_string())
    );
    assert_eq!(cleaner.clean("http://printer.local/?utm_source=x"), "http://printer.local/?utm_source=x");
}

#[test]
fn complete_provider_is_cancelled() {
    let cleaner = packaged(EngineFlags::default());
    assert_eq!(cleaner.clean("https://ad.doubleclick.net/ddm/clk/123;abc"), "");
    assert!(cleaner.clean_outcome("https://pagead2.googlesyndication.com/pagead/js").is_cancelled());

    // a redirection on the same provider takes precedence
    assert_eq!(
        cleaner.clean("https://ad.doubleclick.net/ddm/clk/1;adurl=https%3A%2F%2Fshop.example%2Fitem%3Futm_source%3Ddc"),
        "https://shop.example/item"
    );

    let permissive = packaged(EngineFlags::default() - EngineFlags::DOMAIN_BLOCKING);
    assert_eq!(
        permissive.clean("https://ad.doubleclick.net/ddm/clk/123;abc"),
        "https://ad.doubleclick.net/ddm/clk/123;abc"
    );
}

#[test]
fn referral_rules_follow_flag() {
    let url = "https://www.amazon.com/dp/B0?tag=aff-20";
    assert_eq!(packaged(EngineFlags::default()).clean(url), "https://www.amazon.com/dp/B0");
    let keep = packaged(EngineFlags::default() - EngineFlags::REFERRAL_MARKETING);
    assert_eq!(keep.clean(url), url);
}

#[test]
fn archive_unwrap_composes_with_cleaning() {
    let cleaner = packaged(EngineFlags::default());
    for wrapped in [
        "https://archive.ph/o/AbC12/https://www.example.com/article?utm_source=x",
        "https://archive.today/o/z9/https://www.youtube.com/watch?v=abc&si=1",
        "http://archive.is/o/k/https%3A%2F%2Fsmile.amazon.com%2Fdp%2FB0%2Fref%3Dx",
    ] {
        let unwrapped = unwrap_archive(wrapped).unwrap();
        assert_eq!(cleaner.clean(wrapped), cleaner.clean(&unwrapped), "{wrapped}");
    }
}

#[test]
fn malformed_rule_does_not_disable_others() {
    let document = r#"{
        "version": "broken-1",
        "providers": {
            "bad": { "urlPattern": "bad\\.example((", "rules": ["x"] },
            "half": { "urlPattern": "half\\.example", "rules": ["keep(", "drop"] },
            "good": { "urlPattern": "good\\.example", "rules": ["ref"] }
        }
    }"#;
    let loaded = load_rule_set(document, None, EngineFlags::default());
    assert_eq!(loaded.rules.pattern_errors().len(), 2);

    let cleaner = Cleaner::new(loaded.rules);
    assert_eq!(cleaner.clean("https://good.example/?ref=1&id=2"), "https://good.example/?id=2");
    assert_eq!(cleaner.clean("https://half.example/?drop=1&id=2"), "https://half.example/?id=2");
    assert_eq!(cleaner.clean("https://bad.example/?x=1"), "https://bad.example/?x=1");
}

#[test]
fn cached_rules_clean_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.lsc");

    let fresh = load_packaged(Some(&path), EngineFlags::default());
    assert_eq!(fresh.source, RuleSource::Document);
    let cached = load_packaged(Some(&path), EngineFlags::default());
    assert_eq!(cached.source, RuleSource::Cache);
    assert_eq!(cached.rules.version(), fresh.rules.version());

    let fresh = Cleaner::new(fresh.rules);
    let cached = Cleaner::new(cached.rules);
    for url in CORPUS {
        assert_eq!(fresh.clean(url), cached.clean(url), "{url}");
    }
}

#[test]
fn reload_while_cleaning() {
    let cleaner = Arc::new(packaged(EngineFlags::default()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cleaner = Arc::clone(&cleaner);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let out = cleaner.clean("https://example.com/?utm_source=x&id=1");
                    assert_eq!(out, "https://example.com/?id=1");
                }
            })
        })
        .collect();
    for _ in 0..10 {
        cleaner.reload(load_packaged(None, EngineFlags::default()).rules);
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn non_ascii_hosts_are_cleaned() {
    let cleaner = packaged(EngineFlags::default());
    assert_eq!(cleaner.clean("https://пример.рф/?utm_source=x"), "https://пример.рф/");
    assert_eq!(cleaner.clean("http://ÿ.local/?utm_source=x"), "http://ÿ.local/?utm_source=x");
}

#[test]
fn raw_rule_leftovers_are_normalized() {
    let document = r#"{
        "version": "raw-1",
        "providers": {
            "e": { "urlPattern": "^https?://e\\.com", "rawRules": ["tracker=[^&]*"] }
        }
    }"#;
    let cleaner = Cleaner::new(load_rule_set(document, None, EngineFlags::default()).rules);
    assert_eq!(cleaner.clean("https://e.com/p?tracker=1&b=2"), "https://e.com/p?b=2");
    assert_eq!(cleaner.clean("https://e.com/p?tracker=1"), "https://e.com/p");
}

#[test]
fn schemeless_archive_payload_is_idempotent() {
    let cleaner = packaged(EngineFlags::default());
    let once = cleaner.clean("https://archive.ph/o/Ab12/www.example.com/a?utm_source=x");
    assert_eq!(once, "https://www.example.com/a");
    assert_eq!(cleaner.clean(&once), once);
}

#[test]
fn shared_text_keeps_balanced_parentheses() {
    let cleaner = packaged(EngineFlags::default());
    assert_eq!(
        cleaner.clean_text("read https://en.wikipedia.org/wiki/Rust_(programming_language)?utm_source=x"),
        "https://en.wikipedia.org/wiki/Rust_(programming_language)"
    );
    assert_eq!(
        cleaner.clean_text("(https://en.wikipedia.org/wiki/Rust_(programming_language))"),
        "https://en.wikipedia.org/wiki/Rust_(programming_language)"
    );
}
