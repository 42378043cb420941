// SPDX-License-Identifier: GPL-3.0-only

//! User configuration handling
//!
//! Persisted as JSON under the user config directory. Every field has a
//! default so a missing or partial file still yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_MAX_DISTANCE, DEFAULT_MAX_LEFT_RIGHT, DEFAULT_MIN_DISTANCE, DEFAULT_UPDATE_INTERVAL,
};
use crate::errors::{AppError, AppResult};
use crate::export::EncodingFormat;
use crate::mesh::SceneMeshConfig;
use crate::sensor::DepthFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum tracked distance from the sensor, in meters
    pub min_distance: f32,
    /// Maximum tracked distance from the sensor, in meters
    pub max_distance: f32,
    /// Maximum left and right distance from the sensor, in meters;
    /// negative disables the bound
    pub max_left_right: f32,
    /// Whether to include the detected players in the scene mesh
    pub include_users: bool,
    /// Time interval between scene mesh updates, in seconds
    pub update_interval_secs: f32,
    /// Whether to update the mesh only when there are no players detected
    pub update_when_no_users: bool,
    /// Whether the mesh is facing the player
    pub mirrored: bool,
    /// Whether to keep a collision mesh in sync with the render mesh
    pub update_collider: bool,
    /// Output format for exported images (JPEG, PNG)
    pub image_format: EncodingFormat,
    /// Encoding of raw depth samples in captures
    pub depth_format: DepthFormat,
    /// Output directory for scene captures; None uses the platform default
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            max_left_right: DEFAULT_MAX_LEFT_RIGHT,
            include_users: false,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs_f32(),
            update_when_no_users: false,
            mirrored: true, // Default to mirrored (facing the player)
            update_collider: false,
            image_format: EncodingFormat::default(),
            depth_format: DepthFormat::default(),
            output_dir: None,
        }
    }
}

impl Config {
    /// Default config file path under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("depthmesh").join("config.json"))
    }

    /// Load the config from a file, falling back to defaults when the file
    /// does not exist
    pub fn load(path: &std::path::Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save the config as pretty-printed JSON
    pub fn save(&self, path: &std::path::Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data =
            serde_json::to_vec_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Scene mesh settings derived from this config
    pub fn scene_mesh_config(&self) -> SceneMeshConfig {
        SceneMeshConfig {
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            max_left_right: self.max_left_right,
            include_users: self.include_users,
            update_interval: std::time::Duration::from_secs_f32(
                self.update_interval_secs.max(0.0),
            ),
            update_when_no_users: self.update_when_no_users,
            mirrored: self.mirrored,
            update_collider: self.update_collider,
            ..SceneMeshConfig::default()
        }
    }

    /// Output directory for captures: configured, or ~/Pictures/depthmesh
    pub fn capture_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("depthmesh")
        })
    }
}
