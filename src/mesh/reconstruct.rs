// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame mesh reconstruction drivers
//!
//! [`SceneMeshReconstructor`] rebuilds a static-scene mesh from each fresh
//! frame, under a staleness / rate-limit / users-present skip policy.
//! [`UserMeshReconstructor`] rebuilds a tracked user's hand-region mesh.
//! Both own their classification state, consume snapshots from an injected
//! [`SensorSource`], and replace the render mesh buffers wholesale.

use glam::Vec3;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::assemble::{AssembleParams, OverlayProjector, UvSource, assemble};
use super::classify::{SceneFilter, UserFilter, classify_scene, classify_user};
use super::{MeshBuffer, RenderMesh};
use crate::constants::{
    DEFAULT_MAX_DISTANCE, DEFAULT_MAX_LEFT_RIGHT, DEFAULT_MIN_DISTANCE, DEFAULT_UPDATE_INTERVAL,
    JOINT_PROXIMITY_SQ, NO_BODY_INDEX, SCENE_SAMPLE_SIZE, UNTRACKED_BODY_INDEX, USER_SAMPLE_SIZE,
};
use crate::sensor::{JointType, SensorSource};

/// Why an update tick did or did not rebuild the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Buffers were rebuilt and replaced
    Updated,
    /// The source has no frame yet
    NoData,
    /// The frame revision has not changed since the last rebuild
    Unchanged,
    /// The minimum update interval has not elapsed
    Throttled,
    /// Updates are configured to pause while users are detected
    UsersPresent,
}

/// Scene mesh settings
#[derive(Clone, Debug)]
pub struct SceneMeshConfig {
    /// Minimum tracked distance from the sensor, in meters
    pub min_distance: f32,
    /// Maximum tracked distance from the sensor, in meters
    pub max_distance: f32,
    /// Maximum left/right distance from the sensor, in meters; negative
    /// disables the bound
    pub max_left_right: f32,
    /// Whether to include detected users in the scene mesh
    pub include_users: bool,
    /// Minimum time between mesh rebuilds
    pub update_interval: Duration,
    /// Whether to rebuild only while no users are detected
    pub update_when_no_users: bool,
    /// Whether the mesh faces the viewer
    pub mirrored: bool,
    /// Pixels per direction in a sample
    pub sample_size: usize,
    /// Whether to keep a collision-mesh copy in sync
    pub update_collider: bool,
    /// World-space position the mesh is centered on
    pub mesh_position: Vec3,
}

impl Default for SceneMeshConfig {
    fn default() -> Self {
        Self {
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            max_left_right: DEFAULT_MAX_LEFT_RIGHT,
            include_users: false,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            update_when_no_users: false,
            mirrored: true,
            sample_size: SCENE_SAMPLE_SIZE,
            update_collider: false,
            mesh_position: Vec3::ZERO,
        }
    }
}

/// Static-scene mesh reconstruction
pub struct SceneMeshReconstructor {
    config: SceneMeshConfig,
    source: Arc<dyn SensorSource>,
    overlay: Option<Arc<dyn OverlayProjector>>,
    mesh: RenderMesh,
    collider: Option<MeshBuffer>,
    last_revision: Option<u64>,
    last_rebuild: Option<Instant>,
}

impl SceneMeshReconstructor {
    pub fn new(config: SceneMeshConfig, source: Arc<dyn SensorSource>) -> Self {
        Self {
            config,
            source,
            overlay: None,
            mesh: RenderMesh::default(),
            collider: None,
            last_revision: None,
            last_rebuild: None,
        }
    }

    /// Overlay the mesh over the color background through a camera
    pub fn with_overlay(mut self, overlay: Arc<dyn OverlayProjector>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Run one update tick against the current wall clock
    pub fn update(&mut self) -> UpdateOutcome {
        self.update_at(Instant::now())
    }

    /// Run one update tick at an explicit instant
    pub fn update_at(&mut self, now: Instant) -> UpdateOutcome {
        let Some(snapshot) = self.source.snapshot() else {
            return UpdateOutcome::NoData;
        };

        if self.last_revision == Some(snapshot.revision) {
            return UpdateOutcome::Unchanged;
        }

        // A throttled frame stays pending: the revision is only consumed
        // on rebuild
        if let Some(last) = self.last_rebuild
            && now.duration_since(last) < self.config.update_interval
        {
            return UpdateOutcome::Throttled;
        }

        if self.config.update_when_no_users && self.source.is_user_detected() {
            return UpdateOutcome::UsersPresent;
        }

        let filter = SceneFilter {
            min_depth_mm: (self.config.min_distance * 1000.0).round() as u16,
            max_depth_mm: (self.config.max_distance * 1000.0).round() as u16,
            max_left_right: self.config.max_left_right,
            include_users: self.config.include_users,
        };
        let classification = classify_scene(&snapshot, self.config.sample_size, &filter);

        let mut origin = self.config.mesh_position;
        if !self.config.mirrored {
            origin.x = -origin.x;
        }

        let buffer = assemble(
            &snapshot,
            &classification,
            self.config.sample_size,
            &AssembleParams {
                mirrored: self.config.mirrored,
                origin,
                sensor_to_world: self.source.sensor_to_world(),
                overlay: self.overlay.as_deref(),
                uv_source: UvSource::ColorMap,
            },
        );

        trace!(
            revision = snapshot.revision,
            vertices = buffer.vertex_count(),
            triangles = buffer.triangle_count(),
            "Rebuilt scene mesh"
        );

        if self.config.update_collider {
            self.collider = Some(buffer.clone());
        }
        self.mesh.replace_buffers(buffer);
        self.last_revision = Some(snapshot.revision);
        self.last_rebuild = Some(now);

        UpdateOutcome::Updated
    }

    pub fn mesh(&self) -> &RenderMesh {
        &self.mesh
    }

    /// Collision-mesh copy, present when `update_collider` is set and at
    /// least one rebuild has happened
    pub fn collider(&self) -> Option<&MeshBuffer> {
        self.collider.as_ref()
    }
}

/// User mesh settings
#[derive(Clone, Debug)]
pub struct UserMeshConfig {
    /// Index of the tracked player (0 = first player)
    pub player_index: usize,
    /// Whether the mesh faces the player
    pub mirrored: bool,
    /// Sensor position in the world, added to the user position
    pub origin_position: Vec3,
    /// Whether the z-movement should be inverted
    pub inverted_z: bool,
    /// Smooth factor for user movements; 0 disables smoothing
    pub smooth_factor: f32,
    /// Pixels per direction in a sample
    pub sample_size: usize,
    /// Whether to keep a collision-mesh copy in sync
    pub update_collider: bool,
    /// Joints the mesh is restricted to the vicinity of
    pub joints: Vec<JointType>,
    /// Squared proximity radius around each joint, m²
    pub joint_radius_sq: f32,
}

impl Default for UserMeshConfig {
    fn default() -> Self {
        Self {
            player_index: 0,
            mirrored: true,
            origin_position: Vec3::ZERO,
            inverted_z: false,
            smooth_factor: 0.0,
            sample_size: USER_SAMPLE_SIZE,
            update_collider: false,
            joints: JointType::HAND_JOINTS.to_vec(),
            joint_radius_sq: JOINT_PROXIMITY_SQ,
        }
    }
}

/// Tracked-user mesh reconstruction
///
/// Geometry is restricted to the vicinity of the configured joints (the
/// hands by default), not the full silhouette.
pub struct UserMeshReconstructor {
    config: UserMeshConfig,
    source: Arc<dyn SensorSource>,
    mesh: RenderMesh,
    collider: Option<MeshBuffer>,
    last_revision: Option<u64>,
    last_tick: Option<Instant>,
    user_position: Vec3,
    had_user: bool,
}

impl UserMeshReconstructor {
    pub fn new(config: UserMeshConfig, source: Arc<dyn SensorSource>) -> Self {
        Self {
            config,
            source,
            mesh: RenderMesh::default(),
            collider: None,
            last_revision: None,
            last_tick: None,
            user_position: Vec3::ZERO,
            had_user: false,
        }
    }

    /// Run one update tick against the current wall clock
    pub fn update(&mut self) -> UpdateOutcome {
        self.update_at(Instant::now())
    }

    /// Run one update tick at an explicit instant
    pub fn update_at(&mut self, now: Instant) -> UpdateOutcome {
        let Some(snapshot) = self.source.snapshot() else {
            return UpdateOutcome::NoData;
        };

        if self.last_revision == Some(snapshot.revision) {
            return UpdateOutcome::Unchanged;
        }

        let dt = self
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let user = self.source.user_id_by_index(self.config.player_index);

        // An unresolvable body index maps to a label that matches no
        // pixel, so the mesh collapses to empty instead of erroring
        let body_index = user
            .and_then(|u| self.source.body_index_of_user(u))
            .filter(|&b| b != NO_BODY_INDEX)
            .unwrap_or(UNTRACKED_BODY_INDEX);

        let joints: Vec<Vec3> = match user {
            Some(u) => self
                .config
                .joints
                .iter()
                .map(|&j| self.source.joint_position(u, j))
                .collect(),
            None => Vec::new(),
        };

        // Mesh origin follows the user's spine base
        let mut mesh_origin = user
            .map(|u| self.source.joint_position(u, JointType::SpineBase))
            .unwrap_or(Vec3::ZERO);
        if !self.config.mirrored {
            mesh_origin.x = 0.0;
        }
        let world_origin = self
            .source
            .sensor_to_world()
            .transform_point3(mesh_origin);

        let mut new_position = world_origin + self.config.origin_position;
        if self.config.inverted_z {
            new_position.z = -new_position.z;
        }

        self.user_position = if self.had_user && self.config.smooth_factor != 0.0 {
            self.user_position
                .lerp(new_position, (self.config.smooth_factor * dt).clamp(0.0, 1.0))
        } else {
            new_position
        };
        self.had_user = user.is_some();

        let filter = UserFilter {
            body_index,
            joints,
            joint_radius_sq: self.config.joint_radius_sq,
        };
        let classification = classify_user(&snapshot, self.config.sample_size, &filter);

        let buffer = assemble(
            &snapshot,
            &classification,
            self.config.sample_size,
            &AssembleParams {
                mirrored: self.config.mirrored,
                origin: world_origin,
                sensor_to_world: self.source.sensor_to_world(),
                overlay: None,
                uv_source: UvSource::GridPosition,
            },
        );

        debug!(
            revision = snapshot.revision,
            body_index,
            vertices = buffer.vertex_count(),
            triangles = buffer.triangle_count(),
            "Rebuilt user mesh"
        );

        if self.config.update_collider {
            self.collider = Some(buffer.clone());
        }
        self.mesh.replace_buffers(buffer);
        self.last_revision = Some(snapshot.revision);

        UpdateOutcome::Updated
    }

    pub fn mesh(&self) -> &RenderMesh {
        &self.mesh
    }

    pub fn collider(&self) -> Option<&MeshBuffer> {
        self.collider.as_ref()
    }

    /// Smoothed world-space position the mesh is centered on
    pub fn user_position(&self) -> Vec3 {
        self.user_position
    }
}
