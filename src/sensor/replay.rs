// SPDX-License-Identifier: GPL-3.0-only

//! File-backed sensor source
//!
//! Builds [`FrameSnapshot`]s from on-disk captures so the reconstruction
//! pipeline can run without hardware. A capture is either a single depth
//! file or a directory:
//!
//! - `depth*.png` — 16-bit grayscale depth frames (millimeters or raw
//!   disparity), or `depth*.bin`/`.raw` — little-endian u16 grids
//! - `color.png`/`color.jpg` — optional color frame
//! - `bodyindex.png`/`bodyindex.bin` — optional 8-bit body-index grid
//! - `joints.json` — optional tracked-user joints sidecar
//! - `registration.json` — optional depth→RGB registration tables

use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::{
    CameraIntrinsics, ColorMapping, DepthFormat, FrameSnapshot, JointType, RegistrationData,
    SensorSource, UserId,
};
use crate::constants::{NO_BODY_INDEX, capture_files};
use crate::errors::SensorError;

/// Options controlling how a capture is interpreted
#[derive(Clone, Debug)]
pub struct ReplayOptions {
    /// Encoding of the raw depth samples
    pub depth_format: DepthFormat,
    /// Camera intrinsics; None derives them from the depth resolution
    pub intrinsics: Option<CameraIntrinsics>,
    /// Grid dimensions for headerless `.bin`/`.raw` depth files
    pub raw_dimensions: (u32, u32),
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            depth_format: DepthFormat::Millimeters,
            intrinsics: None,
            raw_dimensions: (640, 480),
        }
    }
}

/// Tracked-user joints sidecar (`joints.json`)
#[derive(serde::Deserialize)]
struct JointsFile {
    /// Body-index label owned by the user
    body_index: u8,
    /// Joint name → sensor-space position
    joints: HashMap<String, [f32; 3]>,
}

/// A sensor source replaying on-disk captures
///
/// Frames are fully decoded up front; [`ReplaySource::advance`] steps to
/// the next frame (wrapping around) and bumps the snapshot revision so
/// consumers see it as a fresh frame.
pub struct ReplaySource {
    frames: Vec<FrameSnapshot>,
    color_image: Option<(Vec<u8>, u32, u32)>,
    user_body_index: Option<u8>,
    joints: HashMap<String, Vec3>,
    ticks: Mutex<u64>,
    world: Mat4,
}

impl ReplaySource {
    /// Open a capture file or directory
    pub fn open(path: &Path, options: &ReplayOptions) -> Result<Self, SensorError> {
        if path.is_dir() {
            Self::open_dir(path, options)
        } else if path.is_file() {
            Self::open_files(vec![path.to_path_buf()], None, None, None, None, options)
        } else {
            Err(SensorError::NoCaptureFound(path.display().to_string()))
        }
    }

    fn open_dir(dir: &Path, options: &ReplayOptions) -> Result<Self, SensorError> {
        let mut depth_paths = Vec::new();
        let mut color_path = None;
        let mut body_index_path = None;
        let mut joints_path = None;
        let mut registration_path = None;

        for entry in std::fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_lowercase();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase();

            if stem.starts_with(capture_files::DEPTH_STEM) && capture_files::is_depth_extension(&ext)
            {
                depth_paths.push(path);
            } else if stem == capture_files::COLOR_STEM && capture_files::is_color_extension(&ext) {
                color_path = Some(path);
            } else if stem == capture_files::BODY_INDEX_STEM
                && capture_files::is_depth_extension(&ext)
            {
                body_index_path = Some(path);
            } else if path.file_name().and_then(|n| n.to_str()) == Some(capture_files::JOINTS_FILE)
            {
                joints_path = Some(path);
            } else if path.file_name().and_then(|n| n.to_str())
                == Some(capture_files::REGISTRATION_FILE)
            {
                registration_path = Some(path);
            }
        }

        if depth_paths.is_empty() {
            return Err(SensorError::NoCaptureFound(dir.display().to_string()));
        }
        depth_paths.sort();

        Self::open_files(
            depth_paths,
            color_path,
            body_index_path,
            joints_path,
            registration_path,
            options,
        )
    }

    fn open_files(
        depth_paths: Vec<PathBuf>,
        color_path: Option<PathBuf>,
        body_index_path: Option<PathBuf>,
        joints_path: Option<PathBuf>,
        registration_path: Option<PathBuf>,
        options: &ReplayOptions,
    ) -> Result<Self, SensorError> {
        let color_image = match &color_path {
            Some(path) => Some(load_color_image(path)?),
            None => None,
        };

        let mapping = match &registration_path {
            Some(path) => {
                let reg = RegistrationData::load(path)?;
                debug!(path = %path.display(), "Loaded registration tables");
                ColorMapping::Registered(reg)
            }
            None => ColorMapping::Scaled,
        };

        let (user_body_index, joints) = match &joints_path {
            Some(path) => {
                let data = std::fs::read(path)?;
                let file: JointsFile = serde_json::from_slice(&data)
                    .map_err(|e| SensorError::DecodeFailed(e.to_string()))?;
                let joints = file
                    .joints
                    .into_iter()
                    .map(|(name, p)| (name, Vec3::from_array(p)))
                    .collect();
                (Some(file.body_index), joints)
            }
            None => (None, HashMap::new()),
        };

        let mut frames = Vec::with_capacity(depth_paths.len());
        for (i, path) in depth_paths.iter().enumerate() {
            let frame = load_frame(
                path,
                body_index_path.as_deref(),
                color_image.as_ref().map(|(_, w, h)| (*w, *h)),
                &mapping,
                options,
                i as u64 + 1,
            )?;
            frames.push(frame);
        }

        info!(
            frame_count = frames.len(),
            depth_width = frames[0].depth_width,
            depth_height = frames[0].depth_height,
            "Opened capture"
        );

        Ok(Self {
            frames,
            color_image,
            user_body_index,
            joints,
            ticks: Mutex::new(0),
            world: Mat4::IDENTITY,
        })
    }

    /// Set the sensor-to-world transform reported to consumers
    pub fn with_world_transform(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    /// Number of depth frames in the capture
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Color frame pixels as RGBA, if the capture has one
    pub fn color_rgba(&self) -> Option<(&[u8], u32, u32)> {
        self.color_image
            .as_ref()
            .map(|(data, w, h)| (data.as_slice(), *w, *h))
    }

    /// Step to the next frame (wrapping) and mark it as fresh
    pub fn advance(&self) {
        let mut ticks = self.ticks.lock().unwrap();
        *ticks += 1;
    }
}

impl SensorSource for ReplaySource {
    fn snapshot(&self) -> Option<FrameSnapshot> {
        let ticks = *self.ticks.lock().unwrap();
        let mut frame = self.frames[(ticks as usize) % self.frames.len()].clone();
        frame.revision = ticks + 1;
        Some(frame)
    }

    fn is_user_detected(&self) -> bool {
        self.snapshot().map(|s| s.any_user_pixels()).unwrap_or(false)
    }

    fn user_id_by_index(&self, player_index: usize) -> Option<UserId> {
        // Captures carry at most one tracked user
        if player_index == 0 && self.user_body_index.is_some() {
            Some(UserId(1))
        } else {
            None
        }
    }

    fn body_index_of_user(&self, user: UserId) -> Option<u8> {
        if user == UserId(1) {
            self.user_body_index
        } else {
            None
        }
    }

    fn joint_position(&self, user: UserId, joint: JointType) -> Vec3 {
        if user != UserId(1) {
            return Vec3::ZERO;
        }
        self.joints.get(joint.name()).copied().unwrap_or(Vec3::ZERO)
    }

    fn sensor_to_world(&self) -> Mat4 {
        self.world
    }
}

/// Decode one depth file into a complete frame snapshot
fn load_frame(
    depth_path: &Path,
    body_index_path: Option<&Path>,
    color_dims: Option<(u32, u32)>,
    mapping: &ColorMapping,
    options: &ReplayOptions,
    revision: u64,
) -> Result<FrameSnapshot, SensorError> {
    let (raw_depth, width, height) = load_depth_grid(depth_path, options)?;

    let body_index: Arc<[u8]> = match body_index_path {
        Some(path) => {
            let labels = load_body_index_grid(path)?;
            if labels.len() != raw_depth.len() {
                return Err(SensorError::GridSizeMismatch {
                    expected: raw_depth.len(),
                    actual: labels.len(),
                });
            }
            labels.into()
        }
        None => vec![NO_BODY_INDEX; raw_depth.len()].into(),
    };

    let intrinsics = options
        .intrinsics
        .unwrap_or_else(|| CameraIntrinsics::scaled_for(width, height));
    let (color_width, color_height) = color_dims.unwrap_or((width, height));

    let mut depth_mm = Vec::with_capacity(raw_depth.len());
    let mut space_coords = Vec::with_capacity(raw_depth.len());
    let mut color_coords = Vec::with_capacity(raw_depth.len());

    for y in 0..height {
        for x in 0..width {
            let raw = raw_depth[(y * width + x) as usize];
            match options.depth_format.to_meters(raw) {
                Some((depth_m, mm)) => {
                    depth_mm.push(mm.min(u16::MAX as u32) as u16);
                    space_coords.push(intrinsics.unproject(x as f32, y as f32, depth_m));
                    let coords = mapping.color_coords(
                        x,
                        y,
                        mm,
                        width,
                        height,
                        color_width,
                        color_height,
                    );
                    color_coords.push(match coords {
                        Some((cx, cy)) => Vec2::new(cx, cy),
                        None => Vec2::INFINITY,
                    });
                }
                None => {
                    depth_mm.push(0);
                    space_coords.push(Vec3::INFINITY);
                    color_coords.push(Vec2::INFINITY);
                }
            }
        }
    }

    Ok(FrameSnapshot {
        depth_width: width as usize,
        depth_height: height as usize,
        color_width: color_width as usize,
        color_height: color_height as usize,
        depth: depth_mm.into(),
        space_coords: space_coords.into(),
        color_coords: color_coords.into(),
        body_index,
        revision,
    })
}

/// Load a raw depth grid as u16 samples plus dimensions
fn load_depth_grid(path: &Path, options: &ReplayOptions) -> Result<(Vec<u16>, u32, u32), SensorError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match ext.as_str() {
        "png" => {
            let img = image::open(path).map_err(|e| SensorError::DecodeFailed(e.to_string()))?;
            match img {
                image::DynamicImage::ImageLuma16(gray) => {
                    let (w, h) = (gray.width(), gray.height());
                    Ok((gray.into_raw(), w, h))
                }
                other => Err(SensorError::UnsupportedFormat(format!(
                    "depth PNG must be 16-bit grayscale, got {:?}",
                    other.color()
                ))),
            }
        }
        "bin" | "raw" => {
            let bytes = std::fs::read(path)?;
            let (width, height) = options.raw_dimensions;
            let expected = (width * height) as usize;
            if bytes.len() != expected * 2 {
                return Err(SensorError::GridSizeMismatch {
                    expected,
                    actual: bytes.len() / 2,
                });
            }
            // pod_collect_to_vec copies, so source alignment doesn't matter
            let samples: Vec<u16> = bytemuck::pod_collect_to_vec(&bytes);
            Ok((samples, width, height))
        }
        other => Err(SensorError::UnsupportedFormat(format!(
            "depth file extension .{}",
            other
        ))),
    }
}

/// Load a body-index grid (8-bit labels)
fn load_body_index_grid(path: &Path) -> Result<Vec<u8>, SensorError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match ext.as_str() {
        "png" => {
            let img = image::open(path).map_err(|e| SensorError::DecodeFailed(e.to_string()))?;
            match img {
                image::DynamicImage::ImageLuma8(gray) => Ok(gray.into_raw()),
                other => Err(SensorError::UnsupportedFormat(format!(
                    "body-index PNG must be 8-bit grayscale, got {:?}",
                    other.color()
                ))),
            }
        }
        "bin" | "raw" => Ok(std::fs::read(path)?),
        other => Err(SensorError::UnsupportedFormat(format!(
            "body-index file extension .{}",
            other
        ))),
    }
}

/// Load a color image as RGBA bytes plus dimensions
fn load_color_image(path: &Path) -> Result<(Vec<u8>, u32, u32), SensorError> {
    let img = image::open(path).map_err(|e| SensorError::DecodeFailed(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    if w == 0 || h == 0 {
        warn!(path = %path.display(), "Color image is empty");
    }
    Ok((rgba.into_raw(), w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("depthmesh-replay-{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_depth_png(dir: &Path, name: &str, width: u32, height: u32, value: u16) {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
            width,
            height,
            vec![value; (width * height) as usize],
        )
        .unwrap();
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_open_png_capture() {
        let dir = temp_dir("png");
        write_depth_png(&dir, "depth_000.png", 8, 8, 2000);

        let source = ReplaySource::open(&dir, &ReplayOptions::default()).unwrap();
        assert_eq!(source.frame_count(), 1);

        let snap = source.snapshot().unwrap();
        assert_eq!(snap.depth_width, 8);
        assert_eq!(snap.depth_at(0), 2000);
        assert!(snap.space_at(0).is_finite());
        assert!(!snap.any_user_pixels());
    }

    #[test]
    fn test_invalid_depth_becomes_infinity() {
        let dir = temp_dir("invalid");
        write_depth_png(&dir, "depth.png", 4, 4, 0);

        let source = ReplaySource::open(&dir, &ReplayOptions::default()).unwrap();
        let snap = source.snapshot().unwrap();
        assert_eq!(snap.depth_at(5), 0);
        assert!(!snap.space_at(5).is_finite());
    }

    #[test]
    fn test_raw_grid_roundtrip() {
        let dir = temp_dir("raw");
        let samples: Vec<u16> = (0..16).map(|i| 1500 + i).collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.join("depth.bin"), bytes).unwrap();

        let options = ReplayOptions {
            raw_dimensions: (4, 4),
            ..Default::default()
        };
        let source = ReplaySource::open(&dir, &options).unwrap();
        let snap = source.snapshot().unwrap();
        assert_eq!(snap.depth_at(0), 1500);
        assert_eq!(snap.depth_at(15), 1515);
    }

    #[test]
    fn test_advance_bumps_revision_and_wraps() {
        let dir = temp_dir("advance");
        write_depth_png(&dir, "depth_000.png", 4, 4, 1500);
        write_depth_png(&dir, "depth_001.png", 4, 4, 2500);

        let source = ReplaySource::open(&dir, &ReplayOptions::default()).unwrap();
        let first = source.snapshot().unwrap();
        assert_eq!(first.revision, 1);
        assert_eq!(first.depth_at(0), 1500);

        source.advance();
        let second = source.snapshot().unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(second.depth_at(0), 2500);

        source.advance();
        let third = source.snapshot().unwrap();
        assert_eq!(third.revision, 3);
        assert_eq!(third.depth_at(0), 1500);
    }

    #[test]
    fn test_joints_sidecar() {
        let dir = temp_dir("joints");
        write_depth_png(&dir, "depth.png", 4, 4, 2000);
        std::fs::write(
            dir.join("joints.json"),
            r#"{"body_index":1,"joints":{"hand_left":[0.1,0.2,2.0]}}"#,
        )
        .unwrap();

        let source = ReplaySource::open(&dir, &ReplayOptions::default()).unwrap();
        let user = source.user_id_by_index(0).unwrap();
        assert_eq!(source.body_index_of_user(user), Some(1));
        assert_eq!(
            source.joint_position(user, JointType::HandLeft),
            Vec3::new(0.1, 0.2, 2.0)
        );
        // Untracked joints report the zero vector
        assert_eq!(source.joint_position(user, JointType::ThumbRight), Vec3::ZERO);
    }
}
