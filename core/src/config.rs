//! ChromaFlux configuration loading
//!
//! Loads configuration from `~/.config/chromaflux/config.toml` (or the path in
//! `CHROMAFLUX_CONFIG`). Every field has a default, so an absent file is not
//! an error.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::color::DEFAULT_KEY_DECIMALS;
use crate::commit::CommitScope;
use crate::document::DEFAULT_JSON_INDENT;
use crate::error::ChromaError;
use crate::error::Result;
use crate::grouping::GroupingOptions;

pub const DEFAULT_CONVERTER_TIMEOUT_SECS: u64 = 300;

const MAX_JSON_INDENT: usize = 16;
const MAX_KEY_DECIMALS: u32 = 12;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChromaConfig {
    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub edit: EditConfig,

    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub commit: CommitConfig,
}

/// External converter invocation
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConverterConfig {
    /// Executable to run
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before `-e`/`-i`
    #[serde(default)]
    pub args: Vec<String>,

    /// Per-invocation timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_program() -> String {
    "UEJSON.exe".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CONVERTER_TIMEOUT_SECS
}

/// Asset discovery and loading
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Case-insensitive file-name substrings that exclude an asset
    #[serde(default = "default_exclusions")]
    pub exclude_name_substrings: Vec<String>,

    /// Converter processes run at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_name_substrings: default_exclusions(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_exclusions() -> Vec<String> {
    vec!["moji".to_string()]
}

fn default_concurrency() -> usize {
    4
}

/// Editing defaults
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EditConfig {
    /// Propagate recolors to the opposite MIN/MAX entry
    #[serde(default)]
    pub sync_min_max: bool,
}

/// Grouping precision
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GroupingConfig {
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
        }
    }
}

impl GroupingConfig {
    pub fn options(&self) -> GroupingOptions {
        GroupingOptions {
            decimals: self.decimals,
        }
    }
}

fn default_decimals() -> u32 {
    DEFAULT_KEY_DECIMALS
}

/// Commit behavior
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CommitConfig {
    #[serde(default)]
    pub scope: CommitScope,

    /// Leave intermediate JSON files on disk after a successful rebuild
    #[serde(default)]
    pub keep_json: bool,

    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            scope: CommitScope::default(),
            keep_json: false,
            json_indent: default_json_indent(),
        }
    }
}

fn default_json_indent() -> usize {
    DEFAULT_JSON_INDENT
}

impl ChromaConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "CHROMAFLUX_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration from the resolved path, or defaults when the file
    /// does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::debug!(path = %path.display(), "config not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChromaError::config(format!("failed to read config at {}: {e}", path.display()))
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: ChromaConfig = toml::from_str(contents)
            .map_err(|e| ChromaError::config(format!("failed to parse config: {e}")))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("chromaflux")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.converter.program.trim().is_empty() {
            return Err(ChromaError::config("converter.program must not be empty"));
        }
        if self.converter.timeout_secs == 0 {
            return Err(ChromaError::config("converter.timeout_secs must be at least 1"));
        }
        if self.scan.concurrency == 0 {
            return Err(ChromaError::config("scan.concurrency must be at least 1"));
        }
        if self.grouping.decimals > MAX_KEY_DECIMALS {
            return Err(ChromaError::config(format!(
                "grouping.decimals must be at most {MAX_KEY_DECIMALS}"
            )));
        }
        if self.commit.json_indent > MAX_JSON_INDENT {
            return Err(ChromaError::config(format!(
                "commit.json_indent must be at most {MAX_JSON_INDENT}"
            )));
        }

        if self.scan.exclude_name_substrings.iter().any(|s| s.is_empty()) {
            tracing::warn!("empty exclusion substring matches every asset");
        }

        Ok(())
    }
}
