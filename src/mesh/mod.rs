// SPDX-License-Identifier: GPL-3.0-only

//! Mesh value types and the render-ready mesh object
//!
//! Reconstruction produces [`MeshBuffer`] values: plain vertex/UV/triangle
//! arrays replaced wholesale every update cycle, never patched
//! incrementally. [`RenderMesh`] is the render-ready form: it accepts a
//! full buffer replacement and recomputes per-vertex normals and bounds.

pub mod assemble;
pub mod classify;
pub mod reconstruct;

use glam::{Vec2, Vec3};

pub use assemble::{OverlayProjector, PinholeOverlayProjector, ViewportRect};
pub use classify::{Classification, SceneFilter, UserFilter};
pub use reconstruct::{
    SceneMeshConfig, SceneMeshReconstructor, UpdateOutcome, UserMeshConfig, UserMeshReconstructor,
};

/// Compacted mesh buffers: positions, texture coordinates, triangle indices
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffer {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle index triples into `vertices`
    pub triangles: Vec<u32>,
}

impl MeshBuffer {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Bounds of a point set; zero box for an empty set
    pub fn from_points(points: &[Vec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// A render-ready mesh: buffers plus recomputed normals and bounds
///
/// Buffer replacement is atomic from the consumer's point of view: either
/// the previous frame's mesh is visible, or the new one with fresh normals
/// and bounds.
#[derive(Clone, Debug, Default)]
pub struct RenderMesh {
    buffer: MeshBuffer,
    normals: Vec<Vec3>,
    bounds: Aabb,
}

impl RenderMesh {
    /// Replace all buffers and recompute normals and bounds
    pub fn replace_buffers(&mut self, buffer: MeshBuffer) {
        self.normals = compute_normals(&buffer);
        self.bounds = Aabb::from_points(&buffer.vertices);
        self.buffer = buffer;
    }

    pub fn buffer(&self) -> &MeshBuffer {
        &self.buffer
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Area-weighted per-vertex normals from triangle cross products
fn compute_normals(buffer: &MeshBuffer) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; buffer.vertices.len()];

    for tri in buffer.triangles.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let a = buffer.vertices[i0];
        let b = buffer.vertices[i1];
        let c = buffer.vertices[i2];
        // Cross product length encodes twice the triangle area, so larger
        // triangles contribute proportionally more
        let face = (b - a).cross(c - a);
        normals[i0] += face;
        normals[i1] += face;
        normals[i2] += face;
    }

    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}
