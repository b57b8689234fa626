//! Splitter configuration
//!
//! Built once per session and handed to every pipeline entry point. Can be
//! loaded from a TOML file; every field has a default.
//!
//! SPDX-FileCopyrightText: 2025 CyberDeco
//! SPDX-License-Identifier: MIT

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::planner::DEFAULT_PADDING;

/// Module namespace used for participant flags and the generated-tile marker.
pub const DEFAULT_MODULE_ID: &str = "bg-texture-size-fix";

fn default_module_id() -> String {
    DEFAULT_MODULE_ID.to_string()
}

fn default_tile_directory() -> String {
    tile_directory_for_world("world")
}

fn default_storage_source() -> String {
    "data".to_string()
}

fn default_padding() -> f64 {
    DEFAULT_PADDING
}

fn default_quality() -> u8 {
    98
}

fn default_dimension_tolerance() -> u32 {
    1
}

/// Storage directory for generated tiles of a given world.
#[must_use]
pub fn tile_directory_for_world(world_id: &str) -> String {
    format!("worlds/{world_id}/assets/bg-tiles")
}

/// Encoded image format for tile blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// Lossy JPEG at the configured quality
    #[default]
    Jpeg,
    /// Lossless WebP
    Webp,
    /// Lossless PNG
    Png,
}

impl TileFormat {
    /// File extension used in tile names
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Png => "png",
        }
    }

    /// MIME type passed to the storage service
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Png => "image/png",
        }
    }
}

/// Defaults written into every generated tile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileDefaults {
    pub anchor_x: f64,
    pub anchor_y: f64,
    /// Texture fit mode understood by the host
    pub fit: String,
    pub tint: String,
    pub alpha_threshold: f64,
    /// Sort/elevation order of generated tiles
    pub z: i32,
    pub alpha: f64,
    pub hidden: bool,
}

impl Default for TileDefaults {
    fn default() -> Self {
        Self {
            anchor_x: 0.5,
            anchor_y: 0.5,
            fit: "fill".to_string(),
            tint: "#ffffff".to_string(),
            alpha_threshold: 0.75,
            z: 0,
            alpha: 1.0,
            hidden: false,
        }
    }
}

/// Configuration for the background splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Namespace for participant flags and the generated marker
    #[serde(default = "default_module_id")]
    pub module_id: String,
    /// Directory (within `storage_source`) that receives tile blobs
    #[serde(default = "default_tile_directory")]
    pub tile_directory: String,
    /// Storage source name passed to the storage service
    #[serde(default = "default_storage_source")]
    pub storage_source: String,
    /// Fraction of the client limit a tile may use
    #[serde(default = "default_padding")]
    pub padding: f64,
    #[serde(default)]
    pub format: TileFormat,
    /// Encoder quality (1-100), only used by lossy formats
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Allowed image/scene size mismatch before warning, in pixels
    #[serde(default = "default_dimension_tolerance")]
    pub dimension_tolerance: u32,
    #[serde(default)]
    pub tile: TileDefaults,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            module_id: default_module_id(),
            tile_directory: default_tile_directory(),
            storage_source: default_storage_source(),
            padding: default_padding(),
            format: TileFormat::default(),
            quality: default_quality(),
            dimension_tolerance: default_dimension_tolerance(),
            tile: TileDefaults::default(),
        }
    }
}

impl SplitterConfig {
    /// Create a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the tile directory of `world_id`
    #[must_use]
    pub fn for_world(world_id: &str) -> Self {
        Self {
            tile_directory: tile_directory_for_world(world_id),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.module_id.trim().is_empty() {
            return Err(invalid("module_id must not be empty"));
        }
        if self.tile_directory.trim().is_empty() {
            return Err(invalid("tile_directory must not be empty"));
        }
        if !(self.padding > 0.0 && self.padding <= 1.0) {
            return Err(invalid(format!("padding must be in (0, 1], got {}", self.padding)));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(invalid(format!("quality must be 1-100, got {}", self.quality)));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&src).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded splitter config");
        Ok(config)
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Message prefix for user-visible notifications
    #[must_use]
    pub fn prefix(&self, message: impl std::fmt::Display) -> String {
        format!("{} | {message}", self.module_id)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}
