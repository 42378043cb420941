// SPDX-License-Identifier: GPL-3.0-only

//! Grid sampler and validity classifier
//!
//! Decides, per 2x2 sample block, whether a quad should be emitted, and
//! compacts the surviving cells into dense vertex-buffer indices. The
//! classification is rebuilt from scratch for every mesh update; there is
//! no persistent vertex identity across frames.
//!
//! Cell markings: 0 = excluded, 1 = shared corner of a neighboring valid
//! quad, 3 = top-left anchor of an emitted quad.

use glam::Vec3;

use crate::constants::{NO_BODY_INDEX, PROXIMITY_THRESHOLD_SQ};
use crate::sensor::FrameSnapshot;

/// Cell included as a shared quad corner
pub const CORNER: u8 = 1;
/// Cell anchoring an emitted quad (top-left corner)
pub const ANCHOR: u8 = 3;

/// Validity rules for the scene mesh
#[derive(Clone, Debug)]
pub struct SceneFilter {
    /// Minimum accepted depth, millimeters
    pub min_depth_mm: u16,
    /// Maximum accepted depth, millimeters
    pub max_depth_mm: u16,
    /// Horizontal bound in meters; negative disables the check
    pub max_left_right: f32,
    /// Whether pixels owned by tracked users stay in the scene mesh
    pub include_users: bool,
}

/// Validity rules for the user mesh
#[derive(Clone, Debug)]
pub struct UserFilter {
    /// Body-index label of the target user
    pub body_index: u8,
    /// Joint positions the block must be near (hands, fingertips, thumbs)
    pub joints: Vec<Vec3>,
    /// Squared proximity radius around each joint, m²
    pub joint_radius_sq: f32,
}

/// Result of classifying one frame
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub sampled_width: usize,
    pub sampled_height: usize,
    /// Per-cell marking (0 / CORNER / ANCHOR), row-major over the sampled grid
    pub vertex_type: Vec<u8>,
    /// Per-cell position in the compacted vertex buffer (valid where
    /// `vertex_type` is non-zero)
    pub vertex_index: Vec<u32>,
    /// Number of cells included in the vertex buffer
    pub vertex_count: usize,
    /// Number of anchor cells (one emitted quad each)
    pub quad_count: usize,
}

/// Classify sample blocks for the scene mesh
pub fn classify_scene(
    snapshot: &FrameSnapshot,
    sample_size: usize,
    filter: &SceneFilter,
) -> Classification {
    classify_blocks(
        snapshot,
        sample_size,
        |snapshot, pixel_index| scene_sample_valid(snapshot, pixel_index, filter),
        |_corners| true,
    )
}

/// Classify sample blocks for the user mesh
pub fn classify_user(
    snapshot: &FrameSnapshot,
    sample_size: usize,
    filter: &UserFilter,
) -> Classification {
    classify_blocks(
        snapshot,
        sample_size,
        |snapshot, pixel_index| user_sample_valid(snapshot, pixel_index, filter.body_index),
        |corners| close_to_any_joint(corners, &filter.joints, filter.joint_radius_sq),
    )
}

/// Shared block scan: corner validity, proximity test, marking, compaction
fn classify_blocks<V, B>(
    snapshot: &FrameSnapshot,
    sample_size: usize,
    sample_valid: V,
    block_ok: B,
) -> Classification
where
    V: Fn(&FrameSnapshot, usize) -> Option<Vec3>,
    B: Fn(&[Vec3; 4]) -> bool,
{
    let sampled_width = snapshot.depth_width / sample_size;
    let sampled_height = snapshot.depth_height / sample_size;
    let mut vertex_type = vec![0u8; sampled_width * sampled_height];

    // The outermost sampled row/column can be included as a corner but
    // never anchors a quad
    for y in 0..sampled_height.saturating_sub(1) {
        let row_index = y * sampled_width;

        for x in 0..sampled_width.saturating_sub(1) {
            let cell = row_index + x;

            let corners = [
                sample_valid(snapshot, pixel_of(snapshot, x, y, sample_size)),
                sample_valid(snapshot, pixel_of(snapshot, x + 1, y, sample_size)),
                sample_valid(snapshot, pixel_of(snapshot, x, y + 1, sample_size)),
                sample_valid(snapshot, pixel_of(snapshot, x + 1, y + 1, sample_size)),
            ];

            let [Some(p0), Some(p1), Some(p2), Some(p3)] = corners else {
                continue;
            };
            let corners = [p0, p1, p2, p3];

            if points_close(&corners, PROXIMITY_THRESHOLD_SQ) && block_ok(&corners) {
                vertex_type[cell] = ANCHOR;

                // Corner markings never downgrade an existing anchor
                for neighbor in [cell + 1, cell + sampled_width, cell + sampled_width + 1] {
                    if vertex_type[neighbor] == 0 {
                        vertex_type[neighbor] = CORNER;
                    }
                }
            }
        }
    }

    // Compaction: dense row-major indices for all included cells
    let mut vertex_index = vec![0u32; vertex_type.len()];
    let mut vertex_count = 0usize;
    let mut quad_count = 0usize;

    for (i, &ty) in vertex_type.iter().enumerate() {
        if ty != 0 {
            vertex_index[i] = vertex_count as u32;
            vertex_count += 1;
        }
        if ty == ANCHOR {
            quad_count += 1;
        }
    }

    Classification {
        sampled_width,
        sampled_height,
        vertex_type,
        vertex_index,
        vertex_count,
        quad_count,
    }
}

/// Full-resolution pixel index of a sampled cell's top-left pixel
#[inline]
fn pixel_of(snapshot: &FrameSnapshot, x: usize, y: usize, sample_size: usize) -> usize {
    y * sample_size * snapshot.depth_width + x * sample_size
}

/// Corner validity for the scene mesh: depth window, finite space
/// coordinates, optional horizontal bound, optional user exclusion
fn scene_sample_valid(
    snapshot: &FrameSnapshot,
    pixel_index: usize,
    filter: &SceneFilter,
) -> Option<Vec3> {
    let depth = snapshot.depth_at(pixel_index);
    let space = snapshot.space_at(pixel_index);

    let scene_pixel =
        filter.include_users || snapshot.body_index_at(pixel_index) == NO_BODY_INDEX;

    if scene_pixel
        && depth >= filter.min_depth_mm
        && depth <= filter.max_depth_mm
        && space.is_finite()
        && (filter.max_left_right < 0.0
            || (space.x >= -filter.max_left_right && space.x <= filter.max_left_right))
    {
        Some(space)
    } else {
        None
    }
}

/// Corner validity for the user mesh: pixel owned by the target user and
/// finite space coordinates
fn user_sample_valid(snapshot: &FrameSnapshot, pixel_index: usize, body_index: u8) -> Option<Vec3> {
    if body_index == NO_BODY_INDEX {
        return None;
    }

    let space = snapshot.space_at(pixel_index);
    if snapshot.body_index_at(pixel_index) == body_index && space.is_finite() {
        Some(space)
    } else {
        None
    }
}

/// Whether all points are pairwise within the squared-distance threshold
fn points_close(points: &[Vec3; 4], max_dist_sq: f32) -> bool {
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if points[i].distance_squared(points[j]) > max_dist_sq {
                return false;
            }
        }
    }
    true
}

/// Whether all points lie within the squared radius of at least one joint
fn close_to_any_joint(points: &[Vec3; 4], joints: &[Vec3], radius_sq: f32) -> bool {
    joints
        .iter()
        .any(|joint| points.iter().all(|p| p.distance_squared(*joint) <= radius_sq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::sync::Arc;

    /// Flat snapshot: every pixel at `depth_mm`, space coordinates packed
    /// tightly around the origin so the proximity test passes
    fn flat_snapshot(width: usize, height: usize, depth_mm: u16) -> FrameSnapshot {
        let n = width * height;
        let mut space = Vec::with_capacity(n);
        for y in 0..height {
            for x in 0..width {
                space.push(Vec3::new(
                    x as f32 * 0.001,
                    y as f32 * 0.001,
                    depth_mm as f32 / 1000.0,
                ));
            }
        }
        FrameSnapshot {
            depth_width: width,
            depth_height: height,
            color_width: width,
            color_height: height,
            depth: vec![depth_mm; n].into(),
            space_coords: space.into(),
            color_coords: vec![Vec2::ZERO; n].into(),
            body_index: vec![NO_BODY_INDEX; n].into(),
            revision: 1,
        }
    }

    fn scene_filter() -> SceneFilter {
        SceneFilter {
            min_depth_mm: 1000,
            max_depth_mm: 3000,
            max_left_right: -1.0,
            include_users: false,
        }
    }

    #[test]
    fn test_flat_grid_anchors_interior() {
        let snap = flat_snapshot(4, 4, 2000);
        let c = classify_scene(&snap, 2, &scene_filter());

        // 2x2 sampled grid: only (0,0) can anchor
        assert_eq!(c.sampled_width, 2);
        assert_eq!(c.quad_count, 1);
        assert_eq!(c.vertex_count, 4);
        assert_eq!(c.vertex_type[0], ANCHOR);
        assert_eq!(c.vertex_type[1], CORNER);
        assert_eq!(c.vertex_type[2], CORNER);
        assert_eq!(c.vertex_type[3], CORNER);
    }

    #[test]
    fn test_depth_out_of_range_excludes_block() {
        let snap = flat_snapshot(4, 4, 500);
        let c = classify_scene(&snap, 2, &scene_filter());
        assert_eq!(c.quad_count, 0);
        assert_eq!(c.vertex_count, 0);
    }

    #[test]
    fn test_infinite_space_coordinate_excludes_corner() {
        let mut snap = flat_snapshot(4, 4, 2000);
        let mut space: Vec<Vec3> = snap.space_coords.to_vec();
        space[0] = Vec3::INFINITY;
        snap.space_coords = Arc::from(space);

        let c = classify_scene(&snap, 2, &scene_filter());
        assert_eq!(c.quad_count, 0);
    }

    #[test]
    fn test_depth_discontinuity_rejected() {
        let mut snap = flat_snapshot(4, 4, 2000);
        let mut space: Vec<Vec3> = snap.space_coords.to_vec();
        // Pixel (2,2) sits 20cm behind its neighbors: depth in range but
        // not coplanar within 1cm
        space[2 * 4 + 2] = Vec3::new(0.002, 0.002, 2.2);
        snap.space_coords = Arc::from(space);

        let c = classify_scene(&snap, 2, &scene_filter());
        assert_eq!(c.quad_count, 0);
    }

    #[test]
    fn test_left_right_bound() {
        let mut snap = flat_snapshot(4, 4, 2000);
        let mut space: Vec<Vec3> = snap.space_coords.to_vec();
        for p in &mut space {
            p.x += 1.5;
        }
        snap.space_coords = Arc::from(space);

        let mut filter = scene_filter();
        filter.max_left_right = 1.0;
        assert_eq!(classify_scene(&snap, 2, &filter).quad_count, 0);

        // Negative bound disables the check
        filter.max_left_right = -1.0;
        assert_eq!(classify_scene(&snap, 2, &filter).quad_count, 1);
    }

    #[test]
    fn test_user_pixels_excluded_from_scene() {
        let mut snap = flat_snapshot(4, 4, 2000);
        snap.body_index = vec![1u8; 16].into();

        let c = classify_scene(&snap, 2, &scene_filter());
        assert_eq!(c.quad_count, 0);

        let mut filter = scene_filter();
        filter.include_users = true;
        assert_eq!(classify_scene(&snap, 2, &filter).quad_count, 1);
    }

    #[test]
    fn test_anchor_not_downgraded_by_neighbor_block() {
        // 6x6 grid sampled at 2 -> 3x3 sampled cells, blocks at (0,0),
        // (1,0), (0,1), (1,1); cell (1,1) anchors the last block but is a
        // corner of the three earlier ones
        let snap = flat_snapshot(6, 6, 2000);
        let c = classify_scene(&snap, 2, &scene_filter());

        assert_eq!(c.quad_count, 4);
        assert_eq!(c.vertex_type[1 * 3 + 1], ANCHOR);
    }

    #[test]
    fn test_compaction_is_dense_row_major() {
        let snap = flat_snapshot(4, 4, 2000);
        let c = classify_scene(&snap, 2, &scene_filter());

        let mut seen = vec![false; c.vertex_count];
        for (i, &ty) in c.vertex_type.iter().enumerate() {
            if ty != 0 {
                let idx = c.vertex_index[i] as usize;
                assert!(idx < c.vertex_count);
                assert!(!seen[idx], "duplicate compacted index {idx}");
                seen[idx] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_user_filter_requires_matching_body_index() {
        let mut snap = flat_snapshot(4, 4, 2000);
        snap.body_index = vec![2u8; 16].into();

        let joints = vec![Vec3::new(0.0, 0.0, 2.0)];
        let mut filter = UserFilter {
            body_index: 1,
            joints,
            joint_radius_sq: 0.01,
        };
        assert_eq!(classify_user(&snap, 1, &filter).quad_count, 0);

        filter.body_index = 2;
        let c = classify_user(&snap, 1, &filter);
        assert!(c.quad_count > 0);
    }

    #[test]
    fn test_user_filter_requires_joint_proximity() {
        let mut snap = flat_snapshot(4, 4, 2000);
        snap.body_index = vec![1u8; 16].into();

        let filter = UserFilter {
            body_index: 1,
            joints: vec![Vec3::new(5.0, 5.0, 5.0)],
            joint_radius_sq: 0.01,
        };
        assert_eq!(classify_user(&snap, 1, &filter).quad_count, 0);
    }

    #[test]
    fn test_no_body_index_sentinel_never_matches() {
        let snap = flat_snapshot(4, 4, 2000);
        let filter = UserFilter {
            body_index: NO_BODY_INDEX,
            joints: vec![Vec3::new(0.0, 0.0, 2.0)],
            joint_radius_sq: 0.01,
        };
        assert_eq!(classify_user(&snap, 1, &filter).quad_count, 0);
    }

    #[test]
    fn test_points_close_boundary() {
        let base = Vec3::new(0.0, 0.0, 2.0);
        let within = [base, base + Vec3::new(0.09, 0.0, 0.0), base, base];
        assert!(points_close(&within, 0.01));

        let beyond = [base, base + Vec3::new(0.11, 0.0, 0.0), base, base];
        assert!(!points_close(&beyond, 0.01));
    }

    #[test]
    fn test_idempotent_on_unchanged_snapshot() {
        let snap = flat_snapshot(8, 8, 2000);
        let a = classify_scene(&snap, 2, &scene_filter());
        let b = classify_scene(&snap, 2, &scene_filter());
        assert_eq!(a, b);
    }
}
