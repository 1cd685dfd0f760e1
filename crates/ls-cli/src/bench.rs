use std::path::PathBuf;
use std::time::Instant;

use ls_compiler::{load_packaged, load_rule_set};
use ls_core::{Cleaner, EngineFlags};

use crate::snapshot;

pub struct BenchOptions {
    pub rules: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub iterations: usize,
    pub flags: EngineFlags,
}

const BUDGET_LOAD_MS: f64 = 250.0;
const BUDGET_CLEAN_P50_US: f64 = 50.0;
const BUDGET_CLEAN_P99_US: f64 = 500.0;

const CORPUS: &[&str] = &[
    "https://www.google.com/url?sa=t&url=https%3A%2F%2Fexample.com",
    "https://www.google.com/search?q=rust&sxsrf=abc&ei=xyz&ved=0",
    "https://www.facebook.com/story.php?story_fbid=12345&id=6789&m_entstream_source=timeline",
    "https://l.facebook.com/l.php?u=https%3A%2F%2Fexample.com%2Fpage%3Ffbclid%3Dxyz&h=AT0",
    "https://www.amazon.com/dp/B07PXRGG6Z/ref=cm_sw_r_cp_api_glt_i_AB12CD34",
    "https://www.youtube.com/watch?v=dQw4w9WgXcQ&feature=share&si=abc",
    "https://youtu.be/dQw4w9WgXcQ?si=abc&t=42",
    "https://x.com/user/status/123?s=20&t=abcdef",
    "https://en.m.wikipedia.org/wiki/Rust?utm_source=x",
    "https://www.reddit.com/r/rust/comments/abc/?share_id=xyz&utm_medium=android_app",
    "https://archive.ph/o/AbC12/https://www.example.com/article?utm_source=x",
    "https://ad.doubleclick.net/ddm/clk/123;abc",
    "https://docs.rs/regex/latest/regex/#syntax",
    "https://example.com/plain/path",
];

pub fn run_bench(opts: BenchOptions) -> Result<(), String> {
    println!("Cleaning Latency Budget");
    println!("==================================================");

    let document = match &opts.rules {
        Some(path) => Some(snapshot::read_document(path)?),
        None => None,
    };

    println!("Loading rules...");
    let load_begin = Instant::now();
    let loaded = match &document {
        Some(document) => load_rule_set(document, opts.cache.as_deref(), opts.flags),
        None => load_packaged(opts.cache.as_deref(), opts.flags),
    };
    let load_ms = load_begin.elapsed().as_secs_f64() * 1000.0;
    println!(
        "Rules {} from {} ({} providers)",
        loaded.rules.version(),
        loaded.source,
        loaded.rules.providers().len()
    );
    let cleaner = Cleaner::new(loaded.rules);

    println!("Warming up...");
    for url in CORPUS {
        let _ = cleaner.clean(url);
    }

    println!("Measuring {} iterations over {} URLs...", opts.iterations, CORPUS.len());
    let latencies = measure_clean_latency(&cleaner, opts.iterations);
    let p50 = percentile(&latencies, 0.50);
    let p99 = percentile(&latencies, 0.99);

    println!();
    let mut all_passed = true;
    all_passed &= report_budget("Rule load", load_ms, BUDGET_LOAD_MS, "ms");
    all_passed &= report_budget("Clean p50", p50, BUDGET_CLEAN_P50_US, "us");
    all_passed &= report_budget("Clean p99", p99, BUDGET_CLEAN_P99_US, "us");
    println!("==================================================");

    if all_passed {
        println!("All budgets met");
        Ok(())
    } else {
        Err("Performance budget exceeded".to_string())
    }
}

fn report_budget(name: &str, actual: f64, limit: f64, unit: &str) -> bool {
    let passed = actual <= limit;
    let mark = if passed { "✓" } else { "✗" };
    println!("  {mark} {name:<12} {actual:>10.2} {unit} (budget {limit:.0} {unit})");
    passed
}

fn measure_clean_latency(cleaner: &Cleaner, iterations: usize) -> Vec<f64> {
    let mut latencies = Vec::with_capacity(iterations * CORPUS.len());

    for _ in 0..iterations {
        for url in CORPUS {
            let start = Instant::now();
            let _ = cleaner.clean(url);
            let elapsed = start.elapsed().as_secs_f64() * 1_000_000.0;
            latencies.push(elapsed);
        }
    }

    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    latencies
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&sorted, 0.50), 50.0);
        assert_eq!(percentile(&sorted, 0.99), 99.0);
        assert_eq!(percentile(&[], 0.99), 0.0);
        assert_eq!(percentile(&[7.0], 0.5), 7.0);
    }

    #[test]
    fn test_report_budget() {
        assert!(report_budget("x", 1.0, 2.0, "us"));
        assert!(!report_budget("x", 3.0, 2.0, "us"));
    }
}
