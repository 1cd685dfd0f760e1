use std::fs;
use std::path::Path;
use std::time::Instant;

use ls_compiler::{build_snapshot, optimize_providers, parse_rule_document};
use ls_core::snapshot::CacheSnapshot;

#[derive(Debug, Clone)]
pub struct CompileStats {
    pub version: String,
    pub providers_before: usize,
    pub providers_after: usize,
    pub rules_before: usize,
    pub rules_after: usize,
    pub rules_deduped: usize,
    pub empty_rules: usize,
    pub parse_ms: f64,
    pub total_ms: f64,
}

/// Parse, optimize and serialize a rule document, then check that the
/// result loads back.
pub fn compile_snapshot_bytes(input: &Path) -> Result<(Vec<u8>, CompileStats), String> {
    let start = Instant::now();
    let content = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;

    let mut doc = parse_rule_document(&content)
        .map_err(|e| format!("Invalid rule document '{}': {}", input.display(), e))?;
    let parse_time = start.elapsed();

    let optimize_stats = optimize_providers(&mut doc.providers);
    let snapshot_bytes = build_snapshot(&doc.version, &doc.providers);

    let snapshot = CacheSnapshot::load(&snapshot_bytes)
        .map_err(|e| format!("Generated snapshot failed validation: {}", e))?;
    let reloaded = snapshot
        .to_specs()
        .map_err(|e| format!("Generated snapshot failed validation: {}", e))?;
    if reloaded != doc.providers {
        return Err("Generated snapshot does not reproduce the rule document".to_string());
    }

    let stats = CompileStats {
        version: doc.version,
        providers_before: optimize_stats.providers_before,
        providers_after: optimize_stats.providers_after,
        rules_before: optimize_stats.rules_before,
        rules_after: optimize_stats.rules_after,
        rules_deduped: optimize_stats.rules_deduped,
        empty_rules: optimize_stats.empty_rules,
        parse_ms: parse_time.as_secs_f64() * 1000.0,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };

    Ok((snapshot_bytes, stats))
}

pub fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<(), String> {
    ls_compiler::cache::write_cache(path, bytes)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

pub fn read_snapshot(path: &Path) -> Result<Vec<u8>, String> {
    fs::read(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}

pub fn read_document(path: &Path) -> Result<String, String> {
    fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))
}
