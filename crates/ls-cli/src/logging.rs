use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,linkscrub=info,ls_compiler=info";

/// Install the stderr subscriber. `log` records from the library crates are
/// forwarded into it. `RUST_LOG` overrides the default filter, and
/// `--log-rules` raises the whole engine to debug so provider decisions and
/// removals show up.
pub fn init_logging(log_rules: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_rules)));

    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: logging disabled: {e}");
    }
}

fn default_filter(log_rules: bool) -> String {
    if log_rules {
        format!("{DEFAULT_FILTER},ls_core=debug")
    } else {
        DEFAULT_FILTER.to_string()
    }
}
