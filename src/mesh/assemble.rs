// SPDX-License-Identifier: GPL-3.0-only

//! Mesh assembler
//!
//! Converts a classification plus the frame grids into compacted
//! vertex/UV/triangle buffers. Vertex positions come either from overlay
//! projection through a configured camera (AR compositing over the color
//! background) or from the sensor-to-world transform, and are re-centered
//! on a reference origin. Winding order flips with the mirror flag so
//! front faces stay consistent when the X axis is negated.

use glam::{Mat4, Vec2, Vec3};

use super::MeshBuffer;
use super::classify::{ANCHOR, Classification};
use crate::sensor::FrameSnapshot;
use crate::sensor::intrinsics::{BASE_HEIGHT, BASE_WIDTH, CameraIntrinsics};

/// Screen-space viewport rectangle of an overlay camera, in pixels
#[derive(Clone, Copy, Debug)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Camera used to overlay the mesh over the color background
///
/// Screen coordinates follow the usual convention: origin at the bottom
/// left of the viewport, y up, z = distance from the camera in meters.
pub trait OverlayProjector: Send + Sync {
    /// The viewport the color background is rendered into
    fn viewport(&self) -> ViewportRect;

    /// Unproject a screen position (pixels + depth) to world space
    fn screen_to_world(&self, screen: Vec3) -> Vec3;
}

/// Pinhole overlay camera: viewport plus intrinsics plus pose
pub struct PinholeOverlayProjector {
    viewport: ViewportRect,
    intrinsics: CameraIntrinsics,
    camera_to_world: Mat4,
}

impl PinholeOverlayProjector {
    pub fn new(viewport: ViewportRect, intrinsics: CameraIntrinsics, camera_to_world: Mat4) -> Self {
        Self {
            viewport,
            intrinsics,
            camera_to_world,
        }
    }
}

impl OverlayProjector for PinholeOverlayProjector {
    fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    fn screen_to_world(&self, screen: Vec3) -> Vec3 {
        // Back from y-up screen coordinates to image coordinates, then
        // scale the viewport to the intrinsics' base resolution
        let ix = (screen.x - self.viewport.x) * BASE_WIDTH / self.viewport.width;
        let iy = (self.viewport.height - (screen.y - self.viewport.y)) * BASE_HEIGHT
            / self.viewport.height;
        let cam = self.intrinsics.unproject(ix, iy, screen.z);
        self.camera_to_world.transform_point3(cam)
    }
}

/// How texture coordinates are derived for each vertex
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UvSource {
    /// Mapped color-image coordinates, clamped to [0, 1] (scene mesh)
    ColorMap,
    /// Normalized grid position of the depth pixel (user mesh)
    GridPosition,
}

/// Assembly inputs shared by the scene and user meshes
pub struct AssembleParams<'a> {
    /// Whether the mesh faces the viewer; when false the X axis is
    /// negated and the winding order flips
    pub mirrored: bool,
    /// Reference origin subtracted from every vertex so the mesh is
    /// locally centered
    pub origin: Vec3,
    /// Sensor-space to world-space transform, applied when no overlay
    /// camera is configured
    pub sensor_to_world: Mat4,
    /// Overlay camera for AR compositing over the color background
    pub overlay: Option<&'a dyn OverlayProjector>,
    pub uv_source: UvSource,
}

/// Build compacted mesh buffers from a classified frame
///
/// A classification with zero anchors yields all-empty buffers; that is an
/// empty draw call, not an error.
pub fn assemble(
    snapshot: &FrameSnapshot,
    classification: &Classification,
    sample_size: usize,
    params: &AssembleParams<'_>,
) -> MeshBuffer {
    let mut vertices = Vec::with_capacity(classification.vertex_count);
    let mut uvs = Vec::with_capacity(classification.vertex_count);
    let mut triangles = Vec::with_capacity(6 * classification.quad_count);

    let sampled_width = classification.sampled_width;

    for y in 0..classification.sampled_height {
        for x in 0..sampled_width {
            let cell = y * sampled_width + x;
            if classification.vertex_type[cell] == 0 {
                continue;
            }

            let pixel = snapshot.index(x * sample_size, y * sample_size);
            let mut pos = snapshot.space_at(pixel);
            if !pos.is_finite() {
                continue;
            }

            let uv = match params.uv_source {
                UvSource::ColorMap => {
                    let c = snapshot.color_at(pixel);
                    if c.is_finite() {
                        Vec2::new(
                            (c.x / snapshot.color_width as f32).clamp(0.0, 1.0),
                            (c.y / snapshot.color_height as f32).clamp(0.0, 1.0),
                        )
                    } else {
                        Vec2::ZERO
                    }
                }
                UvSource::GridPosition => Vec2::new(
                    (x * sample_size) as f32 / snapshot.depth_width as f32,
                    (y * sample_size) as f32 / snapshot.depth_height as f32,
                ),
            };

            if let Some(projector) = params.overlay {
                let c = snapshot.color_at(pixel);
                let depth = snapshot.depth_at(pixel);

                if c.is_finite() && depth > 0 {
                    let rect = projector.viewport();
                    let x_scaled = c.x * rect.width / snapshot.color_width as f32;
                    let y_scaled = c.y * rect.height / snapshot.color_height as f32;

                    let screen = Vec3::new(
                        rect.x + x_scaled,
                        rect.y + rect.height - y_scaled,
                        depth as f32 / 1000.0,
                    );
                    pos = projector.screen_to_world(screen);
                }
            }

            if !params.mirrored {
                pos.x = -pos.x;
            }

            if params.overlay.is_none() {
                // Sensor space to world coordinates, when there is no
                // color overlay
                pos = params.sensor_to_world.transform_point3(pos);
            }

            vertices.push(pos - params.origin);
            uvs.push(uv);

            if classification.vertex_type[cell] == ANCHOR {
                let index = &classification.vertex_index;
                let (tl, tr, bl, br) = (
                    index[cell],
                    index[cell + 1],
                    index[cell + sampled_width],
                    index[cell + sampled_width + 1],
                );

                if params.mirrored {
                    triangles.extend_from_slice(&[tl, tr, bl, bl, tr, br]);
                } else {
                    triangles.extend_from_slice(&[tr, tl, br, br, tl, bl]);
                }
            }
        }
    }

    debug_assert_eq!(vertices.len(), classification.vertex_count);
    debug_assert_eq!(triangles.len(), 6 * classification.quad_count);

    MeshBuffer {
        vertices,
        uvs,
        triangles,
    }
}
