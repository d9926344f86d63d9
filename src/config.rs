use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Page layout used when rendering text into PDF, in points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfLayout {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Left edge of every text line
    #[serde(default = "default_left_margin")]
    pub left_margin: f32,
    /// Baseline of the first line on each page
    #[serde(default = "default_top")]
    pub top: f32,
    /// A page is full once the cursor would go below this
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin: f32,
    #[serde(default = "default_line_height")]
    pub line_height: f32,
}

fn default_font_size() -> f32 {
    12.0
}
fn default_left_margin() -> f32 {
    50.0
}
fn default_top() -> f32 {
    800.0
}
fn default_bottom_margin() -> f32 {
    50.0
}
fn default_line_height() -> f32 {
    15.0
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            left_margin: default_left_margin(),
            top: default_top(),
            bottom_margin: default_bottom_margin(),
            line_height: default_line_height(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upper bound on conversions running at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Append-only conversion log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub pdf: PdfLayout,
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_log_file() -> PathBuf {
    PathBuf::from("conversion_logs.txt")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            jpeg_quality: default_jpeg_quality(),
            log_file: default_log_file(),
            pdf: PdfLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load a config file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
        .map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Candidate config locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut tried: Vec<PathBuf> = Vec::new();
        if let Some(mut d) = dirs::data_dir() {
            d.push("fileconv");
            d.push("fileconv.toml");
            tried.push(d);
        }
        tried.push(PathBuf::from("fileconv.toml"));
        tried.push(PathBuf::from("fileconv.json"));
        tried
    }

    /// Load the first config found in [`AppConfig::search_paths`], falling
    /// back to built-in defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        for p in Self::search_paths() {
            if p.exists() {
                tracing::debug!(path = %p.display(), "loading config");
                return Self::load(&p);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.pdf.line_height <= 0.0 || self.pdf.font_size <= 0.0 {
            return Err(ConfigError::Invalid(
                "pdf line_height and font_size must be positive".into(),
            ));
        }
        if self.pdf.top <= self.pdf.bottom_margin {
            return Err(ConfigError::Invalid(
                "pdf top must be above bottom_margin".into(),
            ));
        }
        Ok(())
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_log_file(mut self, log_file: PathBuf) -> Self {
        self.log_file = log_file;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }
}
