// SPDX-License-Identifier: GPL-3.0-only

//! Depth-to-RGB registration
//!
//! The depth and color cameras sit a few centimeters apart, so a depth
//! pixel maps to a depth-dependent color pixel. Registration tables (per
//! libfreenect) encode the mapping for 640x480 depth space; higher-res RGB
//! modes are handled by scaling the base coordinates.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::SensorError;

/// Registration data for depth-to-RGB alignment
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistrationData {
    /// Registration table: depth_width*depth_height [x_scaled, y] pairs
    pub registration_table: Vec<[i32; 2]>,
    /// Depth-to-RGB shift table: i32 values indexed by depth_mm
    pub depth_to_rgb_shift: Vec<i32>,
    /// Target offset from pad_info
    pub target_offset: u32,
    /// Scale factor for x values (typically 256)
    pub reg_x_val_scale: i32,
    /// X scale factor for high-res RGB (1.0 for 640, 2.0 for 1280)
    pub reg_scale_x: f32,
    /// Y scale factor for high-res RGB (same as X to maintain aspect ratio)
    pub reg_scale_y: f32,
    /// Y offset for high-res RGB (typically 0 for top-aligned crop)
    pub reg_y_offset: i32,
}

impl RegistrationData {
    /// Load registration tables from a JSON sidecar file
    pub fn load(path: &Path) -> Result<Self, SensorError> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| SensorError::DecodeFailed(e.to_string()))
    }

    /// Get registered RGB pixel coordinates for a depth pixel
    ///
    /// Applies the registration transform from depth space to RGB space,
    /// accounting for high-res scaling if needed.
    ///
    /// Returns None if the coordinates are out of bounds or registration
    /// data is invalid.
    pub fn rgb_coords(
        &self,
        x: u32,
        y: u32,
        depth_mm: u32,
        depth_width: u32,
        rgb_width: u32,
        rgb_height: u32,
    ) -> Option<(i32, i32)> {
        let reg_idx = (y * depth_width + x) as usize;
        if reg_idx >= self.registration_table.len() {
            return None;
        }

        let reg = self.registration_table[reg_idx];
        let clamped_depth_mm = depth_mm.min(10_000) as usize;

        if clamped_depth_mm >= self.depth_to_rgb_shift.len() {
            return None;
        }

        let shift = self.depth_to_rgb_shift[clamped_depth_mm];

        // Base coordinates are in 640x480 space
        let rgb_x_scaled = reg[0] + shift;
        let rgb_x_base = rgb_x_scaled / self.reg_x_val_scale;
        let rgb_y_base = reg[1] - self.target_offset as i32;

        // Scale to actual RGB resolution (for 1280x1024, scale by 2.0)
        let rgb_x = (rgb_x_base as f32 * self.reg_scale_x) as i32;
        let rgb_y = (rgb_y_base as f32 * self.reg_scale_y) as i32 + self.reg_y_offset;

        if rgb_x < 0 || rgb_x >= rgb_width as i32 || rgb_y < 0 || rgb_y >= rgb_height as i32 {
            return None;
        }

        Some((rgb_x, rgb_y))
    }
}

/// How depth pixels map to color-image coordinates
#[derive(Clone, Default)]
pub enum ColorMapping {
    /// Simple resolution scaling between the depth and color grids
    #[default]
    Scaled,
    /// Table-based registration with depth-dependent shift
    Registered(RegistrationData),
}

impl ColorMapping {
    /// Map a depth pixel to color-image coordinates, or None when the
    /// mapping falls outside the color frame
    pub fn color_coords(
        &self,
        x: u32,
        y: u32,
        depth_mm: u32,
        depth_width: u32,
        depth_height: u32,
        rgb_width: u32,
        rgb_height: u32,
    ) -> Option<(f32, f32)> {
        match self {
            ColorMapping::Scaled => {
                let cx = x as f32 * rgb_width as f32 / depth_width as f32;
                let cy = y as f32 * rgb_height as f32 / depth_height as f32;
                Some((cx.min(rgb_width as f32 - 1.0), cy.min(rgb_height as f32 - 1.0)))
            }
            ColorMapping::Registered(reg) => reg
                .rgb_coords(x, y, depth_mm, depth_width, rgb_width, rgb_height)
                .map(|(cx, cy)| (cx as f32, cy as f32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registration(depth_width: u32, depth_height: u32) -> RegistrationData {
        // Identity-ish table: x pre-scaled by 256, no depth shift
        let mut table = Vec::new();
        for y in 0..depth_height {
            for x in 0..depth_width {
                table.push([(x as i32) * 256, y as i32]);
            }
        }
        RegistrationData {
            registration_table: table,
            depth_to_rgb_shift: vec![0; 10_001],
            target_offset: 0,
            reg_x_val_scale: 256,
            reg_scale_x: 1.0,
            reg_scale_y: 1.0,
            reg_y_offset: 0,
        }
    }

    #[test]
    fn test_identity_registration() {
        let reg = test_registration(8, 8);
        assert_eq!(reg.rgb_coords(3, 5, 1000, 8, 8, 8), Some((3, 5)));
    }

    #[test]
    fn test_depth_shift_moves_x() {
        let mut reg = test_registration(8, 8);
        reg.depth_to_rgb_shift[2000] = 2 * 256;
        assert_eq!(reg.rgb_coords(3, 5, 2000, 8, 8, 8), Some((5, 5)));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let reg = test_registration(8, 8);
        // Shifting the last column off the frame yields None
        let mut reg2 = reg.clone();
        reg2.depth_to_rgb_shift[1500] = 256;
        assert_eq!(reg2.rgb_coords(7, 0, 1500, 8, 8, 8), None);
    }

    #[test]
    fn test_scaled_mapping_clamps() {
        let map = ColorMapping::Scaled;
        let (cx, cy) = map.color_coords(7, 7, 1000, 8, 8, 16, 16).unwrap();
        assert_eq!((cx, cy), (14.0, 14.0));
        let (cx, _) = map.color_coords(7, 0, 1000, 8, 8, 8, 8).unwrap();
        assert_eq!(cx, 7.0);
    }
}
