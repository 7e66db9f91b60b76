use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};

/// Environment variable that overrides `service.base_url`.
pub const URL_ENV: &str = "FACEAUTH_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_id: i32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append log records to this file in addition to stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_base_url() -> String { "http://localhost:8000/api".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_image_bytes() -> u64 { 5 * 1024 * 1024 }
fn default_jpeg_quality() -> u8 { 90 }
fn default_frame_width() -> u32 { 640 }
fn default_frame_height() -> u32 { 480 }
fn default_frame_interval_ms() -> u64 { 50 }
fn default_warmup_frames() -> u32 { 5 }
fn default_ttl_ms() -> u64 { 4000 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            media: MediaConfig::default(),
            camera: CameraConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
            version: 1,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            frame_interval_ms: default_frame_interval_ms(),
            warmup_frames: default_warmup_frames(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { ttl_ms: default_ttl_ms() }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NotificationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl ClientConfig {
    /// Reads a config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config from an explicit path, then the user and system
    /// locations, then the defaults. `FACEAUTH_URL` wins over any file.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load(path)?
            }
            None => Self::load_first(&candidate_paths())?,
        };

        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.trim().is_empty() {
                log::debug!("Using service URL from {}", URL_ENV);
                config.service.base_url = url.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn load_first(paths: &[PathBuf]) -> Result<Self> {
        for path in paths {
            if path.exists() {
                log::info!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.base_url.trim().is_empty() {
            anyhow::bail!("service.base_url must not be empty");
        }
        if self.service.timeout_secs == 0 {
            anyhow::bail!("service.timeout_secs must be at least 1");
        }
        if self.media.max_image_bytes == 0 {
            anyhow::bail!("media.max_image_bytes must be at least 1");
        }
        if !(1..=100).contains(&self.media.jpeg_quality) {
            anyhow::bail!(
                "media.jpeg_quality must be between 1 and 100, got {}",
                self.media.jpeg_quality
            );
        }
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            anyhow::bail!(
                "camera frame size must be non-zero, got {}x{}",
                self.camera.frame_width,
                self.camera.frame_height
            );
        }
        if self.notifications.ttl_ms == 0 {
            anyhow::bail!("notifications.ttl_ms must be at least 1");
        }
        Ok(())
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("faceauth").join("config.json"));
    }
    paths.push(PathBuf::from("/etc/faceauth/config.json"));
    paths
}
