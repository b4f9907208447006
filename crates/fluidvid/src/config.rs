use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::error::PreflightError;

/// Configuration for a FluidVid run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Directory where every artifact and the event log are written
    pub output_dir: PathBuf,
    /// Target heights in pixels, processed in this order
    pub sizes: Vec<u32>,
    /// Seek offset of the poster frame (ffmpeg time syntax)
    pub thumbnail_at: String,
    /// Per-job timeout in seconds; `None` waits for the tool indefinitely
    pub job_timeout_secs: Option<u64>,
    /// File name of the event log inside `output_dir`
    pub log_file: String,
    /// Dashboard renders per second
    pub refresh_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_dir: PathBuf::from("./output"),
            sizes: vec![480, 720, 1080],
            thumbnail_at: "00:00:01".to_string(),
            job_timeout_secs: None,
            log_file: "fluidvid.log".to_string(),
            refresh_hz: 5,
        }
    }

    /// Load configuration from a file, or return defaults if no path is given.
    ///
    /// Unlike a missing default, a path that was asked for must be readable.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::default_config());
        };

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        // TOML by extension, JSON otherwise
        let config: Config = if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce nonsense jobs
    pub fn validate(&self) -> Result<(), PreflightError> {
        if let Some(pos) = self.sizes.iter().position(|&h| h == 0) {
            return Err(PreflightError::InvalidConfig(format!(
                "sizes[{}] is 0; heights must be positive",
                pos
            )));
        }
        // scale=-2:H keeps the width even; yuv420p encoders need the height even too
        if let Some(&h) = self.sizes.iter().find(|&&h| h % 2 != 0) {
            return Err(PreflightError::InvalidConfig(format!(
                "height {} is odd; heights must be even",
                h
            )));
        }
        if let Some((pos, &h)) = self
            .sizes
            .iter()
            .enumerate()
            .find(|(pos, h)| self.sizes[..*pos].contains(*h))
        {
            return Err(PreflightError::InvalidConfig(format!(
                "sizes[{}] repeats height {}; outputs would overwrite each other",
                pos, h
            )));
        }
        if self.log_file.trim().is_empty() {
            return Err(PreflightError::InvalidConfig("log_file must not be empty".to_string()));
        }
        if self.refresh_hz == 0 {
            return Err(PreflightError::InvalidConfig("refresh_hz must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Absolute path of the event log
    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }
}
