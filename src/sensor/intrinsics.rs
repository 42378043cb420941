// SPDX-License-Identifier: GPL-3.0-only

//! Kinect camera intrinsics and depth coefficients
//!
//! These constants are used across the reconstruction pipeline for:
//! - Unprojection from depth pixels to 3D space coordinates
//! - Scene export (LAS, GLTF)
//!
//! Reference resolution: 640x480 (medium resolution depth mode)

use glam::Vec3;

/// Focal length X (pixels) at 640x480 base resolution
pub const FX: f32 = 594.21;
/// Focal length Y (pixels) at 640x480 base resolution
pub const FY: f32 = 591.04;
/// Principal point X (pixels) at 640x480 base resolution
pub const CX: f32 = 339.5;
/// Principal point Y (pixels) at 640x480 base resolution
pub const CY: f32 = 242.7;

/// Disparity-to-depth coefficient A
/// Used in formula: depth_m = 1.0 / (raw * DEPTH_COEFF_A + DEPTH_COEFF_B)
pub const DEPTH_COEFF_A: f32 = -0.0030711;
/// Disparity-to-depth coefficient B
/// Used in formula: depth_m = 1.0 / (raw * DEPTH_COEFF_A + DEPTH_COEFF_B)
pub const DEPTH_COEFF_B: f32 = 3.3309495;

/// Base width for intrinsics calculation
pub const BASE_WIDTH: f32 = 640.0;
/// Base height for intrinsics calculation
pub const BASE_HEIGHT: f32 = 480.0;

/// Camera intrinsics for depth-to-3D unprojection
#[derive(Clone, Copy, Debug)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        // Kinect defaults for 640x480 base resolution
        Self {
            fx: FX,
            fy: FY,
            cx: CX,
            cy: CY,
            min_depth: 0.4,
            max_depth: 4.0,
        }
    }
}

impl CameraIntrinsics {
    /// Scale the base intrinsics to a different depth resolution
    pub fn scaled_for(width: u32, height: u32) -> Self {
        let sx = width as f32 / BASE_WIDTH;
        let sy = height as f32 / BASE_HEIGHT;
        Self {
            fx: FX * sx,
            fy: FY * sy,
            cx: CX * sx,
            cy: CY * sy,
            ..Self::default()
        }
    }

    /// Unproject a depth pixel to a 3D point - origin is at the camera.
    /// Y is flipped so that up is positive, matching the export convention.
    pub fn unproject(&self, px: f32, py: f32, depth_m: f32) -> Vec3 {
        Vec3::new(
            (px - self.cx) * depth_m / self.fx,
            -((py - self.cy) * depth_m / self.fy),
            depth_m,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unproject_principal_point() {
        let k = CameraIntrinsics::default();
        let p = k.unproject(CX, CY, 2.0);
        assert!(p.x.abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!((p.z - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaled_for_base_resolution_is_identity() {
        let k = CameraIntrinsics::scaled_for(640, 480);
        assert!((k.fx - FX).abs() < 1e-4);
        assert!((k.cy - CY).abs() < 1e-4);
    }

    #[test]
    fn test_unproject_y_up() {
        let k = CameraIntrinsics::default();
        // A pixel above the principal point (smaller py) maps to positive Y
        let p = k.unproject(CX, CY - 100.0, 2.0);
        assert!(p.y > 0.0);
    }
}
