// SPDX-License-Identifier: GPL-3.0-only

//! Scene capture pipeline
//!
//! Writes a reconstructed frame to disk as a set of artifacts:
//! - Depth image: raw 16-bit millimeters for PNG (replayable as a
//!   capture), 8-bit visualization for JPEG
//! - Color image (when the capture has one)
//! - Point cloud with color (LAS format)
//! - 3D mesh with texture (GLB format)

pub mod gltf;
pub mod las;

pub use gltf::export_mesh_glb;
pub use las::export_point_cloud_las;

use image::{GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::constants::JPEG_QUALITY;
use crate::mesh::MeshBuffer;
use crate::sensor::{CameraIntrinsics, DepthFormat, RegistrationData};

/// Output encoding for captured images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingFormat {
    /// JPEG (visualization-oriented, lossy)
    Jpeg,
    /// PNG (lossless; depth keeps its raw 16-bit values)
    #[default]
    Png,
}

impl EncodingFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }
}

/// A color frame to attach to exports
#[derive(Clone)]
pub struct ColorFrame {
    /// RGBA pixels
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Scene capture configuration
#[derive(Clone)]
pub struct SceneCaptureConfig {
    /// Output format for images (JPEG, PNG)
    pub image_format: EncodingFormat,
    /// Camera intrinsics for 3D unprojection
    pub intrinsics: CameraIntrinsics,
    /// Depth format (millimeters or disparity)
    pub depth_format: DepthFormat,
    /// Whether to mirror the output
    pub mirror: bool,
    /// Registration data for depth-to-RGB alignment (optional)
    pub registration: Option<RegistrationData>,
}

impl Default for SceneCaptureConfig {
    fn default() -> Self {
        Self {
            image_format: EncodingFormat::Png,
            intrinsics: CameraIntrinsics::default(),
            depth_format: DepthFormat::Millimeters,
            mirror: true,
            registration: None,
        }
    }
}

/// Result of scene capture
pub struct SceneCaptureResult {
    pub scene_dir: PathBuf,
    pub depth_path: PathBuf,
    pub color_path: Option<PathBuf>,
    pub pointcloud_path: PathBuf,
    pub mesh_path: PathBuf,
}

/// Capture and save a complete scene
///
/// Creates a timestamped directory containing:
/// - depth.{format} - Raw/visualized depth
/// - color.{format} - Color image (when present)
/// - pointcloud.las - Point cloud
/// - mesh.glb - Reconstructed mesh
pub async fn capture_scene(
    mesh: &MeshBuffer,
    depth_data: &[u16],
    depth_width: u32,
    depth_height: u32,
    color: Option<&ColorFrame>,
    output_dir: PathBuf,
    config: SceneCaptureConfig,
) -> Result<SceneCaptureResult, String> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let scene_dir = output_dir.join(format!("scene_{}", timestamp));
    tokio::fs::create_dir_all(&scene_dir)
        .await
        .map_err(|e| format!("Failed to create scene directory: {}", e))?;

    info!(scene_dir = %scene_dir.display(), "Creating scene capture");

    let ext = config.image_format.extension();

    // 1. Save depth image
    let depth_path = scene_dir.join(format!("depth.{}", ext));
    save_depth_image(depth_data, depth_width, depth_height, &depth_path, &config).await?;
    debug!(path = %depth_path.display(), "Saved depth image");

    // 2. Save color image
    let color_path = match color {
        Some(frame) => {
            let path = scene_dir.join(format!("color.{}", ext));
            save_color_image(frame, &path, &config).await?;
            debug!(path = %path.display(), "Saved color image");
            Some(path)
        }
        None => None,
    };

    // 3. Export point cloud as LAS
    let pointcloud_path = scene_dir.join("pointcloud.las");
    export_point_cloud_las(
        depth_data,
        depth_width,
        depth_height,
        color,
        &pointcloud_path,
        &config,
    )
    .await?;
    debug!(path = %pointcloud_path.display(), "Saved point cloud");

    // 4. Export mesh as GLB
    let mesh_path = scene_dir.join("mesh.glb");
    export_mesh_glb(mesh, color, &mesh_path).await?;
    debug!(path = %mesh_path.display(), "Saved mesh");

    info!(scene_dir = %scene_dir.display(), "Scene capture complete");

    Ok(SceneCaptureResult {
        scene_dir,
        depth_path,
        color_path,
        pointcloud_path,
        mesh_path,
    })
}

/// Save depth data to disk
///
/// PNG keeps the raw 16-bit values so the file round-trips as a capture;
/// JPEG gets an 8-bit visualization normalized to the tracked depth range
/// (closer = brighter).
pub async fn save_depth_image(
    depth_data: &[u16],
    width: u32,
    height: u32,
    path: &PathBuf,
    config: &SceneCaptureConfig,
) -> Result<(), String> {
    let depth_data = depth_data.to_vec();
    let path = path.clone();
    let format = config.image_format;
    let depth_format = config.depth_format;
    let (min_depth, max_depth) = (config.intrinsics.min_depth, config.intrinsics.max_depth);

    tokio::task::spawn_blocking(move || match format {
        EncodingFormat::Png => {
            let mm_data: Vec<u16> = depth_data
                .iter()
                .map(|&raw| depth_format.to_millimeters(raw))
                .collect();
            let img =
                image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(width, height, mm_data)
                    .ok_or("Failed to create 16-bit depth image")?;
            img.save(&path)
                .map_err(|e| format!("Failed to save depth PNG: {}", e))
        }
        EncodingFormat::Jpeg => {
            let mut gray_data = Vec::with_capacity((width * height) as usize);
            for &raw in &depth_data {
                let normalized = match depth_format.to_meters(raw) {
                    Some((depth_m, _)) => {
                        let t = 1.0 - (depth_m - min_depth) / (max_depth - min_depth);
                        (t.clamp(0.0, 1.0) * 255.0) as u8
                    }
                    // Invalid depth = black
                    None => 0u8,
                };
                gray_data.push(normalized);
            }

            let gray_image = GrayImage::from_raw(width, height, gray_data)
                .ok_or("Failed to create grayscale image")?;
            let rgb_image: RgbImage = image::DynamicImage::ImageLuma8(gray_image).into_rgb8();

            let mut buf = Vec::new();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            encoder
                .encode_image(&rgb_image)
                .map_err(|e| format!("Failed to encode depth JPEG: {}", e))?;
            std::fs::write(&path, buf).map_err(|e| format!("Failed to write depth JPEG: {}", e))
        }
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

/// Save a color frame to disk
pub async fn save_color_image(
    frame: &ColorFrame,
    path: &PathBuf,
    config: &SceneCaptureConfig,
) -> Result<(), String> {
    let frame = frame.clone();
    let path = path.clone();
    let format = config.image_format;

    tokio::task::spawn_blocking(move || {
        let rgba_image = RgbaImage::from_raw(frame.width, frame.height, frame.data)
            .ok_or("Failed to create RGBA image from color data")?;
        let rgb_image: RgbImage = image::DynamicImage::ImageRgba8(rgba_image).into_rgb8();

        match format {
            EncodingFormat::Jpeg => {
                let mut buf = Vec::new();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
                encoder
                    .encode_image(&rgb_image)
                    .map_err(|e| format!("Failed to encode JPEG: {}", e))?;
                std::fs::write(&path, buf).map_err(|e| format!("Failed to write JPEG: {}", e))
            }
            EncodingFormat::Png => rgb_image
                .save(&path)
                .map_err(|e| format!("Failed to save PNG: {}", e)),
        }
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("depthmesh-export-tests");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[tokio::test]
    async fn test_depth_png_roundtrips_raw_values() {
        let path = temp_path("depth_roundtrip.png");
        let depth = vec![2000u16; 16];
        let config = SceneCaptureConfig::default();

        save_depth_image(&depth, 4, 4, &path, &config).await.unwrap();

        let img = image::open(&path).unwrap();
        match img {
            image::DynamicImage::ImageLuma16(gray) => {
                assert_eq!(gray.get_pixel(0, 0).0[0], 2000);
            }
            other => panic!("expected 16-bit grayscale, got {:?}", other.color()),
        }
    }

    #[tokio::test]
    async fn test_depth_jpeg_visualization() {
        let path = temp_path("depth_vis.jpg");
        let depth = vec![2000u16; 16];
        let config = SceneCaptureConfig {
            image_format: EncodingFormat::Jpeg,
            ..Default::default()
        };

        save_depth_image(&depth, 4, 4, &path, &config).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_color_image_png() {
        let path = temp_path("color.png");
        let frame = ColorFrame {
            data: vec![128u8; 4 * 16],
            width: 4,
            height: 4,
        };
        let config = SceneCaptureConfig::default();

        save_color_image(&frame, &path, &config).await.unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 4);
    }
}
