// src/config.rs

//! Defines the configuration structures for a display session.
//!
//! The configuration describes the physical display the session drives, the
//! shape of the single target buffer handed to callers, and a few knobs for the
//! render thread. Every section has sensible defaults so an empty JSON object
//! (or no file at all) yields a usable headless setup.

use crate::display::types::{BufferDescription, BufferUsage, DisplayDescriptor, PixelFormat};
use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming a JSON file to load [`CONFIG`] from.
pub const CONFIG_PATH_ENV: &str = "DISPLAY_SESSION_CONFIG";

/// Process-wide configuration, loaded on first use.
///
/// Falls back to [`Config::default`] when `DISPLAY_SESSION_CONFIG` is unset or
/// the file cannot be parsed.
pub static CONFIG: Lazy<Config> = Lazy::new(|| match std::env::var_os(CONFIG_PATH_ENV) {
    Some(path) => match Config::load(Path::new(&path)) {
        Ok(config) => {
            info!("Config: Loaded from {:?}", path);
            config
        }
        Err(e) => {
            warn!("Config: {:#}. Using defaults.", e);
            Config::default()
        }
    },
    None => Config::default(),
});

// --- Top-Level Configuration Structure ---

/// Complete configuration for one display session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// The physical output this session drives.
    pub display: DisplayConfig,
    /// Shape of the target buffer handed out to callers.
    pub buffer: BufferConfig,
    /// Render thread settings.
    pub render: RenderConfig,
}

impl Config {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse display session config")
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Static capability metadata reported by `DisplaySession::info`.
    pub fn display_descriptor(&self) -> DisplayDescriptor {
        DisplayDescriptor {
            id: self.display.display_id,
            name: self.display.name.clone(),
            width_px: self.display.width_px,
            height_px: self.display.height_px,
            vendor_flags: self.display.vendor_flags,
        }
    }

    /// Description of the target buffer. Dimensions follow the display unless
    /// the buffer section overrides them.
    pub fn buffer_description(&self) -> BufferDescription {
        let width_px = self.buffer.width_px.unwrap_or(self.display.width_px);
        let height_px = self.buffer.height_px.unwrap_or(self.display.height_px);
        BufferDescription {
            width_px,
            height_px,
            layers: self.buffer.layers.max(1),
            format: self.buffer.format,
            usage: self.buffer.usage,
            stride_px: width_px,
        }
    }
}

// --- Display Configuration ---

/// Identity and geometry of the physical display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Identifier handed to the display proxy when acquiring the output.
    pub display_id: u64,
    /// Human readable name reported in the display descriptor.
    pub name: String,
    /// Output width in physical pixels.
    pub width_px: u32,
    /// Output height in physical pixels.
    pub height_px: u32,
    /// Opaque vendor bits passed through to callers.
    pub vendor_flags: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            display_id: 0,
            name: "headless".to_string(),
            width_px: 640,
            height_px: 480,
            vendor_flags: 0,
        }
    }
}

// --- Buffer Configuration ---

/// Shape of the single target buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Overrides the display width when set.
    pub width_px: Option<u32>,
    /// Overrides the display height when set.
    pub height_px: Option<u32>,
    /// Number of image layers in the buffer.
    pub layers: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            width_px: None,
            height_px: None,
            layers: 1,
            format: PixelFormat::Rgba8888,
            usage: BufferUsage::CPU_WRITE_OFTEN | BufferUsage::GPU_TEXTURE,
        }
    }
}

// --- Render Configuration ---

/// Render thread settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// OS-level name of the render thread.
    pub thread_name: String,
    /// Stack size in bytes for the render thread. Platform default when unset.
    pub stack_size: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            thread_name: "render".to_string(),
            stack_size: None,
        }
    }
}
