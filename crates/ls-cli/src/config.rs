use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use ls_core::{CleanerOptions, EngineFlags};

/// Contents of a `--config` file. Every key is optional.
///
/// ```json
/// { "domainBlockingEnabled": false, "rules": "rules.json", "cache": "rules.lsc" }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub options: CleanerOptions,
    pub rules: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// Switches given on the command line. They win over the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagOverrides {
    pub no_domain_blocking: bool,
    pub keep_referral: bool,
    pub no_localhost_skip: bool,
    pub log_rules: bool,
}

impl CliConfig {
    pub fn parse(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| format!("Invalid config: {}", e))
    }

    pub fn read(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        Self::parse(&content)
    }

    pub fn engine_flags(&self, overrides: FlagOverrides) -> EngineFlags {
        let mut flags = EngineFlags::from(self.options);
        if overrides.no_domain_blocking {
            flags.remove(EngineFlags::DOMAIN_BLOCKING);
        }
        if overrides.keep_referral {
            flags.remove(EngineFlags::REFERRAL_MARKETING);
        }
        if overrides.no_localhost_skip {
            flags.remove(EngineFlags::LOCAL_HOST_SKIPPING);
        }
        if overrides.log_rules {
            flags.insert(EngineFlags::LOGGING);
        }
        flags
    }
}
