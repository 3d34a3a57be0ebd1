//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.grademate.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".grademate.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Grading defaults.
    #[serde(default)]
    pub grading: GradingConfig,

    /// Submission scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the grading backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u64 {
    300 // OCR over a full class can take minutes
}

/// Defaults for the `grade` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Weight of logic correctness versus textual similarity (0-1).
    #[serde(default = "default_logic_weight")]
    pub logic_weight: f64,

    /// Similarity at or above which a student is flagged (0-1).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum marks for the quiz.
    #[serde(default = "default_total")]
    pub total: f64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            logic_weight: default_logic_weight(),
            similarity_threshold: default_similarity_threshold(),
            total: default_total(),
        }
    }
}

fn default_logic_weight() -> f64 {
    0.7
}

fn default_similarity_threshold() -> f64 {
    0.3
}

fn default_total() -> f64 {
    100.0
}

/// Submission scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Maximum submissions per upload.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Image extensions to include.
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,

    /// Maximum image size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            extensions: default_image_extensions(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_files() -> usize {
    200
}

pub(crate) fn default_image_extensions() -> Vec<String> {
    vec!["png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include each student's OCR text in grading reports.
    #[serde(default = "default_true")]
    pub include_extracted_text: bool,

    /// Include per-student feedback in grading reports.
    #[serde(default = "default_true")]
    pub include_feedback: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_extracted_text: true,
            include_feedback: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Complement of a logic weight or similarity threshold, rounded to one decimal.
pub fn complementary_weight(value: f64) -> f64 {
    ((1.0 - value) * 10.0).round() / 10.0
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.grademate.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(ref token) = args.token {
            self.api.token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
    }

    /// Apply `grade` command overrides.
    ///
    /// Logic weight and similarity threshold sum to one: when only one is
    /// given, the other moves to its complement.
    pub fn merge_grading(
        &mut self,
        logic_weight: Option<f64>,
        similarity_threshold: Option<f64>,
        total: Option<f64>,
    ) {
        match (logic_weight, similarity_threshold) {
            (Some(w), Some(t)) => {
                self.grading.logic_weight = w;
                self.grading.similarity_threshold = t;
            }
            (Some(w), None) => {
                self.grading.logic_weight = w;
                self.grading.similarity_threshold = complementary_weight(w);
            }
            (None, Some(t)) => {
                self.grading.logic_weight = complementary_weight(t);
                self.grading.similarity_threshold = t;
            }
            (None, None) => {}
        }

        if let Some(total) = total {
            self.grading.total = total;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.grading.logic_weight, 0.7);
        assert_eq!(config.grading.similarity_threshold, 0.3);
        assert!(config.scanner.extensions.contains(&"png".to_string()));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[api]
base_url = "https://grading.example.edu"
token = "abc123"

[grading]
total = 20

[scanner]
max_files = 50
extensions = ["png"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.api.base_url, "https://grading.example.edu");
        assert_eq!(config.api.token.as_deref(), Some("abc123"));
        assert_eq!(config.api.timeout_seconds, 300);
        assert_eq!(config.grading.total, 20.0);
        assert_eq!(config.grading.logic_weight, 0.7);
        assert_eq!(config.scanner.max_files, 50);
        assert_eq!(config.scanner.extensions, vec!["png"]);
        assert!(config.report.include_feedback);
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            "[api]\ntimeout_seconds = 9\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.api.timeout_seconds, 9);

        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "[api\n").unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_merge_grading_keeps_weights_complementary() {
        let mut config = Config::default();
        config.merge_grading(Some(0.6), None, None);
        assert_eq!(config.grading.logic_weight, 0.6);
        assert_eq!(config.grading.similarity_threshold, 0.4);

        config.merge_grading(Some(0.9), Some(0.5), Some(10.0));
        assert_eq!(config.grading.similarity_threshold, 0.5);
        assert_eq!(config.grading.total, 10.0);

        config.merge_grading(None, Some(0.2), None);
        assert_eq!(config.grading.logic_weight, 0.8);
        assert_eq!(config.grading.similarity_threshold, 0.2);
        assert_eq!(config.grading.total, 10.0);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[grading]"));
        assert!(toml_str.contains("[scanner]"));
        assert!(!toml_str.contains("token"));
    }
}
