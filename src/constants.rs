// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Body-index label meaning "no tracked user owns this pixel"
pub const NO_BODY_INDEX: u8 = 255;

/// Body-index label used when a requested user cannot be resolved.
/// Matches no pixel, so the user mesh collapses to empty instead of erroring.
pub const UNTRACKED_BODY_INDEX: u8 = 222;

/// Squared-distance threshold (m²) for the quad planarity/proximity test.
/// Four sample-block corners further apart than this straddle a depth
/// discontinuity (silhouette edges, object boundaries) and emit no quad.
pub const PROXIMITY_THRESHOLD_SQ: f32 = 0.01;

/// Squared-distance threshold (m²) for the user-mesh joint-proximity test
pub const JOINT_PROXIMITY_SQ: f32 = 0.01;

/// Depth values at or above this are invalid (millimeters)
pub const MAX_VALID_DEPTH_MM: u16 = 10_000;

/// Sample stride for the scene mesh (pixels per sampled cell, per direction)
pub const SCENE_SAMPLE_SIZE: usize = 2;

/// Sample stride for the user mesh
pub const USER_SAMPLE_SIZE: usize = 1;

/// Default minimum tracked distance from the sensor, in meters
pub const DEFAULT_MIN_DISTANCE: f32 = 1.0;

/// Default maximum tracked distance from the sensor, in meters
pub const DEFAULT_MAX_DISTANCE: f32 = 3.0;

/// Default maximum left/right distance from the sensor, in meters.
/// A negative value disables the horizontal bound.
pub const DEFAULT_MAX_LEFT_RIGHT: f32 = 2.0;

/// Default interval between scene mesh rebuilds
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// JPEG quality for exported textures and images
pub const JPEG_QUALITY: u8 = 92;

/// Capture file naming and format helpers
pub mod capture_files {
    /// File stem of depth grids inside a capture directory
    pub const DEPTH_STEM: &str = "depth";
    /// File stem of color images inside a capture directory
    pub const COLOR_STEM: &str = "color";
    /// File stem of body-index grids inside a capture directory
    pub const BODY_INDEX_STEM: &str = "bodyindex";
    /// Joint-positions sidecar file name
    pub const JOINTS_FILE: &str = "joints.json";
    /// Depth→RGB registration sidecar file name
    pub const REGISTRATION_FILE: &str = "registration.json";

    /// Check if an extension is a supported depth-grid format
    pub fn is_depth_extension(ext: &str) -> bool {
        matches!(ext, "png" | "bin" | "raw")
    }

    /// Check if an extension is a supported color-image format
    pub fn is_color_extension(ext: &str) -> bool {
        matches!(ext, "png" | "jpg" | "jpeg")
    }
}
