//! linkscrub CLI
//!
//! Cleans URLs from the command line or stdin, and compiles and inspects LSC
//! rule cache snapshots.

mod bench;
mod config;
mod logging;
mod snapshot;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use ls_compiler::{load_packaged, load_rule_set};
use ls_core::snapshot::{CacheSnapshot, SectionId};
use ls_core::{Cleaner, EngineFlags};

use crate::config::{CliConfig, FlagOverrides};

#[derive(Parser)]
#[command(name = "linkscrub")]
#[command(about = "Strip tracking parameters and redirect wrappers from URLs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean URLs given as arguments, or one per line from stdin
    Clean {
        /// URLs or shared text; the first URL in each is cleaned
        inputs: Vec<String>,

        /// Print the outcome kind before each result
        #[arg(long)]
        explain: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Compile a rule document into an LSC cache snapshot
    Compile {
        /// Input rule document (JSON)
        #[arg(short, long)]
        input: String,

        /// Output snapshot file
        #[arg(short, long, default_value = "rules.lsc")]
        output: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate an LSC snapshot
    Validate {
        /// Snapshot file to validate
        #[arg(short, long)]
        input: String,
    },

    /// Dump snapshot info
    Info {
        /// Snapshot file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Check cleaning latency against the performance budget
    Bench {
        /// Passes over the built-in URL corpus
        #[arg(long, default_value_t = 1000)]
        iterations: usize,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// JSON config file with engine options and rule paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rule document to use instead of the packaged one
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Rule cache snapshot path
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Keep URLs matched by complete providers
    #[arg(long)]
    no_domain_blocking: bool,

    /// Keep referral-marketing parameters
    #[arg(long)]
    keep_referral: bool,

    /// Clean localhost and intranet URLs too
    #[arg(long)]
    no_localhost_skip: bool,

    /// Log provider decisions for each URL
    #[arg(long)]
    log_rules: bool,
}

struct EngineSetup {
    flags: EngineFlags,
    rules: Option<PathBuf>,
    cache: Option<PathBuf>,
}

impl EngineArgs {
    fn resolve(self) -> Result<EngineSetup, String> {
        let file = match &self.config {
            Some(path) => CliConfig::read(path)?,
            None => CliConfig::default(),
        };
        let flags = file.engine_flags(FlagOverrides {
            no_domain_blocking: self.no_domain_blocking,
            keep_referral: self.keep_referral,
            no_localhost_skip: self.no_localhost_skip,
            log_rules: self.log_rules,
        });
        Ok(EngineSetup {
            flags,
            rules: self.rules.or(file.rules),
            cache: self.cache.or(file.cache),
        })
    }
}

fn main() {
    let cli = Cli::parse();

    let log_rules = match &cli.command {
        Commands::Clean { engine, .. } | Commands::Bench { engine, .. } => engine.log_rules,
        _ => false,
    };
    logging::init_logging(log_rules);

    let result = match cli.command {
        Commands::Clean {
            inputs,
            explain,
            engine,
        } => engine.resolve().and_then(|setup| cmd_clean(&inputs, explain, setup)),
        Commands::Compile {
            input,
            output,
            verbose,
        } => cmd_compile(&input, &output, verbose),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input } => cmd_info(&input),
        Commands::Bench { iterations, engine } => engine.resolve().and_then(|setup| {
            bench::run_bench(bench::BenchOptions {
                rules: setup.rules,
                cache: setup.cache,
                iterations,
                flags: setup.flags,
            })
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn build_cleaner(setup: &EngineSetup) -> Result<Cleaner, String> {
    let loaded = match &setup.rules {
        Some(path) => {
            let document = snapshot::read_document(path)?;
            load_rule_set(&document, setup.cache.as_deref(), setup.flags)
        }
        None => load_packaged(setup.cache.as_deref(), setup.flags),
    };
    log::info!(
        "rules {} loaded from {} ({} providers)",
        loaded.rules.version(),
        loaded.source,
        loaded.rules.providers().len()
    );
    for err in loaded.rules.pattern_errors() {
        log::warn!("{}", err);
    }
    Ok(Cleaner::new(loaded.rules))
}

fn cmd_clean(inputs: &[String], explain: bool, setup: EngineSetup) -> Result<(), String> {
    let cleaner = build_cleaner(&setup)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut emit = |text: &str| -> Result<(), String> {
        let line = if explain {
            let outcome = cleaner.clean_text_outcome(text);
            format!("{}\t{}", outcome.kind(), outcome.url().unwrap_or(""))
        } else {
            cleaner.clean_text(text)
        };
        writeln!(out, "{}", line).map_err(|e| format!("Failed to write output: {}", e))
    };

    if inputs.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line.map_err(|e| format!("Failed to read stdin: {}", e))?;
            if line.trim().is_empty() {
                continue;
            }
            emit(&line)?;
        }
    } else {
        for input in inputs {
            emit(input)?;
        }
    }

    Ok(())
}

fn cmd_compile(input: &str, output: &str, verbose: bool) -> Result<(), String> {
    let (snapshot_bytes, stats) = snapshot::compile_snapshot_bytes(Path::new(input))?;

    if verbose {
        println!(
            "  {} - version {}, {} providers",
            Path::new(input).file_name().unwrap_or_default().to_string_lossy(),
            stats.version,
            stats.providers_before
        );
    }

    snapshot::write_snapshot(Path::new(output), &snapshot_bytes)?;

    println!("Compiled rules {} to '{}'", stats.version, output);
    println!("  Providers: {} -> {}", stats.providers_before, stats.providers_after);
    println!(
        "  Rules:     {} -> {} (dedupe removed {}, empty removed {})",
        stats.rules_before, stats.rules_after, stats.rules_deduped, stats.empty_rules
    );
    println!("  Size:      {} bytes ({:.1} KB)", snapshot_bytes.len(), snapshot_bytes.len() as f64 / 1024.0);
    println!("  Time:      {:.1}ms (parse: {:.1}ms)", stats.total_ms, stats.parse_ms);

    Ok(())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let bytes = snapshot::read_snapshot(Path::new(input))?;

    let snapshot = CacheSnapshot::load(&bytes)
        .map_err(|e| format!("Invalid snapshot: {}", e))?;
    let specs = snapshot
        .to_specs()
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    println!("Snapshot '{}' is valid", input);
    println!("  Format:      {}", snapshot.version);
    println!("  Rules:       {}", snapshot.rules_version());
    println!("  Providers:   {}", specs.len());
    println!("  Size:        {} bytes", bytes.len());

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let bytes = snapshot::read_snapshot(Path::new(input))?;

    let snapshot = CacheSnapshot::load(&bytes)
        .map_err(|e| format!("Invalid snapshot: {}", e))?;

    println!("Snapshot: {}", input);
    println!("  Magic:       LSC1");
    println!("  Format:      {}", snapshot.version);
    println!("  Build ID:    {:08x}", snapshot.build_id);
    println!("  Rules:       {}", snapshot.rules_version());
    println!("  Sections:    {}", snapshot.section_count());
    println!("  Total size:  {} bytes ({:.1} KB)", bytes.len(), bytes.len() as f64 / 1024.0);
    println!();

    println!("Sections:");
    for id in [SectionId::StrPool, SectionId::Providers, SectionId::RuleRefs] {
        if let Some(info) = snapshot.get_section_info(id) {
            println!("  {:<12} {:>8} bytes  crc {:08x}", format!("{:?}", id), info.length, info.crc32);
        }
    }
    println!();

    let specs = snapshot
        .to_specs()
        .map_err(|e| format!("Invalid snapshot: {}", e))?;
    let complete = specs.iter().filter(|spec| spec.complete_provider).count();
    let patterns: usize = specs.iter().map(|spec| spec.rule_count()).sum();

    println!("Providers:");
    println!("  Count:       {} ({} complete)", specs.len(), complete);
    println!("  Rule refs:   {}", snapshot.rule_ref_count());
    println!("  Patterns:    {}", patterns);
    println!("  String pool: {} bytes", snapshot.string_pool_len());

    Ok(())
}
