use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_UPLOAD_DIR: &str = "static/videos";
const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_DEVICE_FPS: u32 = 15;
const DEFAULT_DEVICE_WIDTH: u32 = 640;
const DEFAULT_DEVICE_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct CrashwatchConfigFile {
    http_addr: Option<String>,
    upload_dir: Option<String>,
    jpeg_quality: Option<u8>,
    detector: Option<DetectorConfigFile>,
    device: Option<DeviceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CrashwatchConfig {
    pub http_addr: String,
    pub upload_dir: String,
    pub jpeg_quality: u8,
    pub detector: DetectorSettings,
    pub device: DeviceSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Registry name of the backend to serve with ("stub", "tract").
    pub backend: String,
    /// Model weights for model-backed backends.
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl CrashwatchConfig {
    /// Load configuration: optional JSON file named by `CRASHWATCH_CONFIG`,
    /// then `CRASHWATCH_*` environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CRASHWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CrashwatchConfigFile) -> Self {
        Self {
            http_addr: file
                .http_addr
                .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            upload_dir: file
                .upload_dir
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            detector: DetectorSettings {
                backend: file
                    .detector
                    .as_ref()
                    .and_then(|d| d.backend.clone())
                    .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
                model_path: file.detector.and_then(|d| d.model_path),
            },
            device: DeviceSettings {
                target_fps: file
                    .device
                    .as_ref()
                    .and_then(|d| d.target_fps)
                    .unwrap_or(DEFAULT_DEVICE_FPS),
                width: file
                    .device
                    .as_ref()
                    .and_then(|d| d.width)
                    .unwrap_or(DEFAULT_DEVICE_WIDTH),
                height: file
                    .device
                    .and_then(|d| d.height)
                    .unwrap_or(DEFAULT_DEVICE_HEIGHT),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("CRASHWATCH_HTTP_ADDR") {
            if !addr.trim().is_empty() {
                self.http_addr = addr;
            }
        }
        if let Ok(dir) = std::env::var("CRASHWATCH_UPLOAD_DIR") {
            if !dir.trim().is_empty() {
                self.upload_dir = dir;
            }
        }
        if let Ok(quality) = std::env::var("CRASHWATCH_JPEG_QUALITY") {
            self.jpeg_quality = quality
                .parse()
                .map_err(|_| anyhow!("CRASHWATCH_JPEG_QUALITY must be an integer 1-100"))?;
        }
        if let Ok(backend) = std::env::var("CRASHWATCH_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("CRASHWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(fps) = std::env::var("CRASHWATCH_DEVICE_FPS") {
            self.device.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("CRASHWATCH_DEVICE_FPS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.upload_dir.trim().is_empty() {
            return Err(anyhow!("upload_dir must not be empty"));
        }
        if self.detector.backend.trim().is_empty() {
            return Err(anyhow!("detector backend must not be empty"));
        }
        if self.device.width == 0 || self.device.height == 0 {
            return Err(anyhow!("device capture geometry must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CrashwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
