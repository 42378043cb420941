// SPDX-License-Identifier: GPL-3.0-only

//! Sensor frame snapshots and source abstraction
//!
//! The reconstruction code never talks to hardware. It consumes immutable
//! [`FrameSnapshot`] values handed out by a [`SensorSource`]: per-pixel
//! depth (millimeters), per-pixel 3D space coordinates, per-pixel
//! body-index labels, per-pixel color-image coordinates, and a revision
//! counter used to detect new frames without inspecting pixel contents.

pub mod depth;
pub mod frame_loop;
pub mod intrinsics;
pub mod registration;
pub mod replay;

use glam::{Mat4, Vec2, Vec3};
use std::sync::Arc;

pub use depth::DepthFormat;
pub use intrinsics::CameraIntrinsics;
pub use registration::{ColorMapping, RegistrationData};
pub use replay::ReplaySource;

/// Identifier of a tracked user, as reported by the body-tracking layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

/// Skeleton joints consumed by the reconstruction components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    SpineBase,
    HandLeft,
    HandRight,
    HandTipLeft,
    HandTipRight,
    ThumbLeft,
    ThumbRight,
}

impl JointType {
    /// The six hand-region joints used by the user-mesh proximity filter
    pub const HAND_JOINTS: [JointType; 6] = [
        JointType::HandLeft,
        JointType::HandRight,
        JointType::HandTipLeft,
        JointType::HandTipRight,
        JointType::ThumbLeft,
        JointType::ThumbRight,
    ];

    /// Joint name as used in capture sidecar files
    pub fn name(&self) -> &'static str {
        match self {
            JointType::SpineBase => "spine_base",
            JointType::HandLeft => "hand_left",
            JointType::HandRight => "hand_right",
            JointType::HandTipLeft => "hand_tip_left",
            JointType::HandTipRight => "hand_tip_right",
            JointType::ThumbLeft => "thumb_left",
            JointType::ThumbRight => "thumb_right",
        }
    }
}

/// One sensor frame as an immutable value
///
/// All grids are row-major `depth_width * depth_height` and Arc-backed, so
/// snapshots clone cheaply and the producer can never mutate a frame the
/// reconstruction is still reading.
#[derive(Clone)]
pub struct FrameSnapshot {
    pub depth_width: usize,
    pub depth_height: usize,
    pub color_width: usize,
    pub color_height: usize,
    /// Depth in millimeters, 0 = invalid
    pub depth: Arc<[u16]>,
    /// Sensor-space 3D point per depth pixel; infinite components mark
    /// invalid/unmappable pixels
    pub space_coords: Arc<[Vec3]>,
    /// Color-image pixel coordinates per depth pixel; infinite components
    /// mark pixels with no color mapping
    pub color_coords: Arc<[Vec2]>,
    /// Body-index label per depth pixel; 255 = no user
    pub body_index: Arc<[u8]>,
    /// Monotonic frame counter, bumped whenever the grids are rewritten
    pub revision: u64,
}

impl FrameSnapshot {
    /// Row-major pixel index
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.depth_width + x
    }

    /// Depth at a pixel, 0 when out of range
    #[inline]
    pub fn depth_at(&self, idx: usize) -> u16 {
        self.depth.get(idx).copied().unwrap_or(0)
    }

    /// Space coordinate at a pixel, infinity when out of range
    #[inline]
    pub fn space_at(&self, idx: usize) -> Vec3 {
        self.space_coords.get(idx).copied().unwrap_or(Vec3::INFINITY)
    }

    /// Color coordinate at a pixel, infinity when out of range
    #[inline]
    pub fn color_at(&self, idx: usize) -> Vec2 {
        self.color_coords.get(idx).copied().unwrap_or(Vec2::INFINITY)
    }

    /// Body-index label at a pixel, 255 when out of range
    #[inline]
    pub fn body_index_at(&self, idx: usize) -> u8 {
        self.body_index
            .get(idx)
            .copied()
            .unwrap_or(crate::constants::NO_BODY_INDEX)
    }

    /// Whether any pixel is owned by a tracked body
    pub fn any_user_pixels(&self) -> bool {
        self.body_index
            .iter()
            .any(|&b| b != crate::constants::NO_BODY_INDEX)
    }
}

impl std::fmt::Debug for FrameSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSnapshot")
            .field("depth_width", &self.depth_width)
            .field("depth_height", &self.depth_height)
            .field("color_width", &self.color_width)
            .field("color_height", &self.color_height)
            .field("revision", &self.revision)
            .finish()
    }
}

/// Provider of frame snapshots and body-tracking queries
///
/// Implemented by [`ReplaySource`] for on-disk captures and by test mocks.
/// Tracking queries default to "nothing tracked" so depth-only sources
/// only implement `snapshot`.
pub trait SensorSource: Send + Sync {
    /// The current frame, or None when no frame has been produced yet
    fn snapshot(&self) -> Option<FrameSnapshot>;

    /// Whether any user is currently detected
    fn is_user_detected(&self) -> bool {
        false
    }

    /// Resolve a player index (0 = first tracked player) to a user id
    fn user_id_by_index(&self, _player_index: usize) -> Option<UserId> {
        None
    }

    /// Body-index label owned by a user, if the user is tracked
    fn body_index_of_user(&self, _user: UserId) -> Option<u8> {
        None
    }

    /// Sensor-space joint position; the zero vector means "not tracked"
    fn joint_position(&self, _user: UserId, _joint: JointType) -> Vec3 {
        Vec3::ZERO
    }

    /// Transform from sensor space to world space
    fn sensor_to_world(&self) -> Mat4 {
        Mat4::IDENTITY
    }
}
