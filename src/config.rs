/*!
 * Configuration support for the partitioning pipeline
 *
 * Settings come from built-in defaults, an optional TOML file and
 * `NPSPLIT_*` environment variables, in increasing priority.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::{PartitionError, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "NPSPLIT";

/// Configuration for a partitioning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Directory holding the input CSV files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory receiving the per-state files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Rows read per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Number of worker threads (None = available parallelism)
    #[serde(default)]
    pub parallel_threads: Option<usize>,

    /// Extension of files picked up from the input directory
    #[serde(default = "default_input_extension")]
    pub input_extension: String,

    /// Field delimiter for input and output files
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Remove existing state files before the run starts
    #[serde(default)]
    pub clean_output: bool,

    /// Whether to show progress bars during long operations
    #[serde(default = "default_enable_progress_bar")]
    pub enable_progress_bar: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            chunk_size: default_chunk_size(),
            parallel_threads: None,
            input_extension: default_input_extension(),
            delimiter: default_delimiter(),
            clean_output: false,
            enable_progress_bar: default_enable_progress_bar(),
        }
    }
}

// Default value functions for serde
fn default_input_dir() -> PathBuf {
    PathBuf::from("Final")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("states")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_input_extension() -> String {
    "csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_enable_progress_bar() -> bool {
    true
}

impl PartitionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from an optional TOML file layered under
    /// `NPSPLIT_*` environment variables
    ///
    /// Supported environment variables:
    /// - `NPSPLIT_INPUT_DIR`, `NPSPLIT_OUTPUT_DIR`: directory paths
    /// - `NPSPLIT_CHUNK_SIZE`: rows per chunk
    /// - `NPSPLIT_PARALLEL_THREADS`: number of workers
    /// - `NPSPLIT_INPUT_EXTENSION`: e.g. "csv"
    /// - `NPSPLIT_DELIMITER`: single ASCII character
    /// - `NPSPLIT_CLEAN_OUTPUT`, `NPSPLIT_ENABLE_PROGRESS_BAR`: "true" or "false"
    pub fn load_layered(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(PartitionError::file_not_found_with_suggestion(path.to_path_buf()));
            }
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        } else if let Some(path) = Self::default_config_path() {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| PartitionError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PartitionError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/npsplit/config.toml` on Unix-like systems
    /// or `%APPDATA%\npsplit\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "npsplit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PartitionError::configuration(
                "chunk_size must be greater than zero",
                Some("The default of 100000 rows works well for NPPES files"),
            ));
        }
        if self.parallel_threads == Some(0) {
            return Err(PartitionError::configuration(
                "parallel_threads must be greater than zero",
                Some("Leave parallel_threads unset to use all available cores"),
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(PartitionError::configuration(
                format!("delimiter '{}' is not a single ASCII character", self.delimiter),
                None,
            ));
        }
        // Quote and record terminators cannot double as field separators
        if matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(PartitionError::configuration(
                format!("delimiter {:?} conflicts with CSV quoting or line endings", self.delimiter),
                Some("Use ',' or another separator such as '|' or a tab"),
            ));
        }
        Ok(())
    }

    /// Delimiter as the byte the csv crate expects
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    /// Worker count for a run over `files` inputs
    pub fn worker_count(&self, files: usize) -> usize {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.parallel_threads
            .unwrap_or(available)
            .min(files.max(1))
            .max(1)
    }
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: PartitionConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: PartitionConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: PartitionConfig) -> Self {
        Self { config }
    }

    pub fn input_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.input_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set rows per chunk
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set number of parallel threads
    pub fn parallel_threads(mut self, threads: Option<usize>) -> Self {
        self.config.parallel_threads = threads;
        self
    }

    pub fn input_extension(mut self, extension: &str) -> Self {
        self.config.input_extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Remove existing state files before the run
    pub fn clean_output(mut self, clean: bool) -> Self {
        self.config.clean_output = clean;
        self
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PartitionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = PartitionConfig::default();
        assert_eq!(config.chunk_size, 100_000);
        assert_eq!(config.input_extension, "csv");
        assert_eq!(config.delimiter_byte(), b',');
        assert!(!config.clean_output);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .input_dir("in")
            .output_dir("out")
            .chunk_size(500)
            .parallel_threads(Some(4))
            .input_extension(".txt")
            .clean_output(true)
            .progress_bar(false)
            .build()
            .unwrap();

        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.parallel_threads, Some(4));
        assert_eq!(config.input_extension, "txt");
        assert!(config.clean_output);
        assert!(!config.enable_progress_bar);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(ConfigBuilder::new().chunk_size(0).build().is_err());
        assert!(ConfigBuilder::new().parallel_threads(Some(0)).build().is_err());
        assert!(ConfigBuilder::new().delimiter('§').build().is_err());
        for reserved in ['"', '\n', '\r'] {
            assert!(ConfigBuilder::new().delimiter(reserved).build().is_err(), "{reserved:?}");
        }
        assert!(ConfigBuilder::new().delimiter('|').build().is_ok());
        assert!(ConfigBuilder::new().delimiter('\t').build().is_ok());
    }

    #[test]
    fn test_worker_count_bounded_by_files() {
        let config = ConfigBuilder::new().parallel_threads(Some(8)).build().unwrap();
        assert_eq!(config.worker_count(3), 3);
        assert_eq!(config.worker_count(0), 1);
        assert_eq!(config.worker_count(20), 8);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("npsplit.toml");
        let config = ConfigBuilder::new().chunk_size(1234).clean_output(true).build().unwrap();

        config.save(&path).unwrap();
        assert_eq!(PartitionConfig::from_file(&path).unwrap(), config);
        assert_eq!(PartitionConfig::load_layered(Some(&path)).unwrap().chunk_size, 1234);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "output_dir = \"by_state\"\n").unwrap();

        let config = PartitionConfig::from_file(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("by_state"));
        assert_eq!(config.chunk_size, 100_000);
    }
}
