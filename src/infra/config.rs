//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. Default: config/dev.toml
//!
//! A missing or unparseable file falls back to built-in defaults with a
//! warning. The API credential is never part of the file; it comes from the
//! `ROLLCALL_API_KEY` environment variable or interactive entry and lives
//! only in session memory.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Instruction sent to the extraction service alongside each screenshot
const DEFAULT_INSTRUCTION: &str = "\
This image is a screenshot of a video-conference participant panel.
Extract only the participant names.

Rules:
- Output one name per line
- Strip trailing markers such as \"(host)\", \"(me)\", \"(guest)\"
- Ignore UI buttons such as \"Mute\" or \"Video\"
- Ignore icons and emoji
- If a name cannot be read, do not output it

Output format (names only, no commentary):
Jane Doe
John Smith
...";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout for the extraction call
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Override for the extraction instruction text
    #[serde(default)]
    pub instruction: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_api_timeout_ms(),
            max_tokens: default_max_tokens(),
            instruction: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_timeout_ms() -> u64 {
    30_000
}

fn default_max_tokens() -> u32 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    /// Names shorter than this (in characters) are dropped
    #[serde(default = "default_min_name_len")]
    pub min_name_len: usize,
    /// When true, duplicate names within one capture each count
    #[serde(default)]
    pub count_duplicates: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { min_name_len: default_min_name_len(), count_duplicates: false }
    }
}

fn default_min_name_len() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Directory for export files
    #[serde(default = "default_export_dir")]
    pub dir: String,
    /// Column delimiter in the export file
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { dir: default_export_dir(), delimiter: default_delimiter() }
    }
}

fn default_export_dir() -> String {
    "exports".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_server_port() }
    }
}

fn default_server_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Interval for logging the stats summary (seconds)
    #[serde(default = "default_stats_interval")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: default_stats_interval() }
    }
}

fn default_stats_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_model: String,
    api_timeout_ms: u64,
    api_max_tokens: u32,
    instruction: String,
    min_name_len: usize,
    count_duplicates: bool,
    export_dir: String,
    export_delimiter: String,
    server_port: u16,
    stats_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            api_base_url: toml_config.api.base_url,
            api_model: toml_config.api.model,
            api_timeout_ms: toml_config.api.timeout_ms,
            api_max_tokens: toml_config.api.max_tokens,
            instruction: toml_config
                .api
                .instruction
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            min_name_len: toml_config.normalizer.min_name_len,
            count_duplicates: toml_config.normalizer.count_duplicates,
            export_dir: toml_config.export.dir,
            export_delimiter: toml_config.export.delimiter,
            server_port: toml_config.server.port,
            stats_interval_secs: toml_config.stats.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_model(&self) -> &str {
        &self.api_model
    }

    pub fn api_timeout_ms(&self) -> u64 {
        self.api_timeout_ms
    }

    pub fn api_max_tokens(&self) -> u32 {
        self.api_max_tokens
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn min_name_len(&self) -> usize {
        self.min_name_len
    }

    pub fn count_duplicates(&self) -> bool {
        self.count_duplicates
    }

    pub fn export_dir(&self) -> &str {
        &self.export_dir
    }

    pub fn export_delimiter(&self) -> &str {
        &self.export_delimiter
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn stats_interval_secs(&self) -> u64 {
        self.stats_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the normalizer duplicate policy
    #[cfg(test)]
    pub fn with_count_duplicates(mut self, count_duplicates: bool) -> Self {
        self.count_duplicates = count_duplicates;
        self
    }

    /// Builder method for tests to set the minimum name length
    #[cfg(test)]
    pub fn with_min_name_len(mut self, min_name_len: usize) -> Self {
        self.min_name_len = min_name_len;
        self
    }

    /// Builder method for tests to set the export directory
    #[cfg(test)]
    pub fn with_export_dir(mut self, dir: &str) -> Self {
        self.export_dir = dir.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "https://api.openai.com/v1");
        assert_eq!(config.api_model(), "gpt-4o");
        assert_eq!(config.api_timeout_ms(), 30_000);
        assert_eq!(config.api_max_tokens(), 1000);
        assert_eq!(config.min_name_len(), 2);
        assert!(!config.count_duplicates());
        assert_eq!(config.export_dir(), "exports");
        assert_eq!(config.export_delimiter(), ",");
        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.stats_interval_secs(), 30);
    }

    #[test]
    fn test_default_instruction_mentions_one_name_per_line() {
        let config = Config::default();
        assert!(config.instruction().contains("one name per line"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "empty");
        assert_eq!(config.api_model(), "gpt-4o");
        assert_eq!(config.server_port(), 8080);
        assert_eq!(config.config_file(), "empty");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[api]
model = "gpt-4o-mini"
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "partial");
        assert_eq!(config.api_model(), "gpt-4o-mini");
        assert_eq!(config.api_base_url(), "https://api.openai.com/v1");
        assert_eq!(config.api_timeout_ms(), 30_000);
    }
}
