//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from, in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file never stops startup: defaults are used and a warning is logged.

use crate::money::DEFAULT_CURRENCY_SUFFIX;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MRR_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "MRR_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "royalties.db";

/// Default tax deduction applied when a report asks for it
pub const DEFAULT_TAX_PERCENT: f64 = 6.0;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub calculation: CalculationConfig,

    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Calculation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CalculationConfig {
    /// Percentage withheld when `apply_tax` is requested
    #[serde(default = "default_tax_percent")]
    pub tax_percent: f64,

    /// Suffix appended to amounts in summary blocks
    #[serde(default = "default_currency_suffix")]
    pub currency_suffix: String,
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            tax_percent: default_tax_percent(),
            currency_suffix: default_currency_suffix(),
        }
    }
}

/// Header synonyms appended after the built-in table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub synonyms: Vec<SynonymEntry>,
}

/// One `[[normalizer.synonyms]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SynonymEntry {
    /// Substring looked for (case-insensitive) in input headers
    pub header: String,
    /// Canonical field name the header maps to
    pub field: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tax_percent() -> f64 {
    DEFAULT_TAX_PERCENT
}

fn default_currency_suffix() -> String {
    DEFAULT_CURRENCY_SUFFIX.to_string()
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve and load the config file
    ///
    /// An explicitly named file (argument or `MRR_CONFIG`) must load. The default
    /// location degrades to built-in defaults when missing or broken.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(Path::new(&path));
        }

        let Some(path) = default_config_path() else {
            warn!("Could not determine config directory, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Ok(Self::default())
            }
        }
    }
}

/// Default configuration file path (`<config dir>/mrr/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mrr").join("config.toml"))
}

/// Compiled-in fallbacks for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("mrr"))
            .unwrap_or_else(|| PathBuf::from("./mrr_data"));

        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Root folder resolution: CLI argument, then `MRR_ROOT_FOLDER`, then TOML, then default
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.calculation.tax_percent, 6.0);
        assert_eq!(config.calculation.currency_suffix, "₽");
        assert!(config.normalizer.synonyms.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let config = TomlConfig::parse(
            r#"
            root_folder = "/srv/royalties"

            [logging]
            level = "debug"
            file = "/var/log/mrr.log"

            [calculation]
            tax_percent = 13.0
            currency_suffix = "EUR"

            [[normalizer.synonyms]]
            header = "Artist"
            field = "artist"

            [[normalizer.synonyms]]
            header = "Title"
            field = "track_name"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/royalties")));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/mrr.log")));
        assert_eq!(config.calculation.tax_percent, 13.0);
        assert_eq!(config.calculation.currency_suffix, "EUR");
        assert_eq!(
            config.normalizer.synonyms,
            vec![
                SynonymEntry { header: "Artist".into(), field: "artist".into() },
                SynonymEntry { header: "Title".into(), field: "track_name".into() },
            ]
        );
    }

    #[test]
    fn test_partial_calculation_section_keeps_other_defaults() {
        let config = TomlConfig::parse("[calculation]\ntax_percent = 0.0\n").unwrap();
        assert_eq!(config.calculation.tax_percent, 0.0);
        assert_eq!(config.calculation.currency_suffix, "₽");
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root_folder = [not toml").unwrap();

        let err = TomlConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = TomlConfig::resolve(Some(Path::new("/nonexistent/mrr/config.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
