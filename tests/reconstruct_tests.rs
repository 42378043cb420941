// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the reconstruction drivers and their skip policy

use depthmesh::constants::NO_BODY_INDEX;
use depthmesh::mesh::{
    SceneMeshConfig, SceneMeshReconstructor, UpdateOutcome, UserMeshConfig, UserMeshReconstructor,
};
use depthmesh::sensor::{FrameSnapshot, JointType, SensorSource, UserId};
use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Scripted sensor source for driving the reconstructors
#[derive(Default)]
struct MockSource {
    frame: Mutex<Option<FrameSnapshot>>,
    revision: AtomicU64,
    user_detected: AtomicBool,
    user_body_index: Mutex<Option<u8>>,
    joints: Mutex<HashMap<JointType, Vec3>>,
}

impl MockSource {
    fn set_frame(&self, frame: FrameSnapshot) {
        self.revision.store(frame.revision, Ordering::SeqCst);
        *self.frame.lock().unwrap() = Some(frame);
    }

    fn bump_revision(&self) {
        let next = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(frame) = self.frame.lock().unwrap().as_mut() {
            frame.revision = next;
        }
    }
}

impl SensorSource for MockSource {
    fn snapshot(&self) -> Option<FrameSnapshot> {
        self.frame.lock().unwrap().clone()
    }

    fn is_user_detected(&self) -> bool {
        self.user_detected.load(Ordering::SeqCst)
    }

    fn user_id_by_index(&self, player_index: usize) -> Option<UserId> {
        if player_index == 0 && self.user_body_index.lock().unwrap().is_some() {
            Some(UserId(42))
        } else {
            None
        }
    }

    fn body_index_of_user(&self, user: UserId) -> Option<u8> {
        if user == UserId(42) {
            *self.user_body_index.lock().unwrap()
        } else {
            None
        }
    }

    fn joint_position(&self, user: UserId, joint: JointType) -> Vec3 {
        if user != UserId(42) {
            return Vec3::ZERO;
        }
        self.joints
            .lock()
            .unwrap()
            .get(&joint)
            .copied()
            .unwrap_or(Vec3::ZERO)
    }

    fn sensor_to_world(&self) -> Mat4 {
        Mat4::IDENTITY
    }
}

fn flat_snapshot(width: usize, height: usize, depth_mm: u16, revision: u64) -> FrameSnapshot {
    let n = width * height;
    let mut space = Vec::with_capacity(n);
    let mut color = Vec::with_capacity(n);
    for y in 0..height {
        for x in 0..width {
            space.push(Vec3::new(
                x as f32 * 0.001,
                y as f32 * 0.001,
                depth_mm as f32 / 1000.0,
            ));
            color.push(Vec2::new(x as f32, y as f32));
        }
    }
    FrameSnapshot {
        depth_width: width,
        depth_height: height,
        color_width: width,
        color_height: height,
        depth: vec![depth_mm; n].into(),
        space_coords: space.into(),
        color_coords: color.into(),
        body_index: vec![NO_BODY_INDEX; n].into(),
        revision,
    }
}

fn scene_config() -> SceneMeshConfig {
    SceneMeshConfig {
        min_distance: 1.0,
        max_distance: 3.0,
        max_left_right: -1.0,
        update_interval: Duration::from_millis(100),
        ..Default::default()
    }
}

#[test]
fn no_snapshot_skips_without_error() {
    let source = Arc::new(MockSource::default());
    let mut reconstructor = SceneMeshReconstructor::new(scene_config(), source);

    assert_eq!(reconstructor.update(), UpdateOutcome::NoData);
    assert!(reconstructor.mesh().is_empty());
}

#[test]
fn fresh_frame_rebuilds_then_unchanged() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));

    let mut reconstructor = SceneMeshReconstructor::new(scene_config(), Arc::clone(&source) as _);

    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
    assert_eq!(reconstructor.mesh().buffer().vertex_count(), 4);
    assert_eq!(reconstructor.mesh().buffer().triangle_count(), 2);

    // Same revision: the rebuild is skipped and the mesh kept
    assert_eq!(reconstructor.update(), UpdateOutcome::Unchanged);
    assert_eq!(reconstructor.mesh().buffer().vertex_count(), 4);
}

#[test]
fn interval_throttles_but_keeps_frame_pending() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));

    let mut reconstructor = SceneMeshReconstructor::new(scene_config(), Arc::clone(&source) as _);

    let t0 = Instant::now();
    assert_eq!(reconstructor.update_at(t0), UpdateOutcome::Updated);

    source.bump_revision();
    assert_eq!(
        reconstructor.update_at(t0 + Duration::from_millis(50)),
        UpdateOutcome::Throttled
    );

    // The throttled frame is still pending once the interval elapses
    assert_eq!(
        reconstructor.update_at(t0 + Duration::from_millis(150)),
        UpdateOutcome::Updated
    );
}

#[test]
fn users_present_pauses_updates_when_configured() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));
    source.user_detected.store(true, Ordering::SeqCst);

    let mut config = scene_config();
    config.update_when_no_users = true;
    let mut reconstructor = SceneMeshReconstructor::new(config, Arc::clone(&source) as _);

    assert_eq!(reconstructor.update(), UpdateOutcome::UsersPresent);
    assert!(reconstructor.mesh().is_empty());

    source.user_detected.store(false, Ordering::SeqCst);
    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
}

#[test]
fn collider_tracks_render_mesh_when_enabled() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));

    let mut config = scene_config();
    config.update_collider = true;
    let mut reconstructor = SceneMeshReconstructor::new(config, Arc::clone(&source) as _);

    assert!(reconstructor.collider().is_none());
    reconstructor.update();

    let collider = reconstructor.collider().expect("collider follows rebuilds");
    assert_eq!(collider, reconstructor.mesh().buffer());
}

#[test]
fn collider_stays_disabled_by_default() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));

    let mut reconstructor = SceneMeshReconstructor::new(scene_config(), Arc::clone(&source) as _);
    reconstructor.update();
    assert!(reconstructor.collider().is_none());
}

#[test]
fn rebuild_on_new_revision_replaces_buffers() {
    let source = Arc::new(MockSource::default());
    source.set_frame(flat_snapshot(4, 4, 2000, 1));

    let mut reconstructor = SceneMeshReconstructor::new(scene_config(), Arc::clone(&source) as _);
    let t0 = Instant::now();
    assert_eq!(reconstructor.update_at(t0), UpdateOutcome::Updated);
    assert!(!reconstructor.mesh().is_empty());

    // The next frame moves everything out of the depth window
    source.set_frame(flat_snapshot(4, 4, 5000, 2));
    assert_eq!(
        reconstructor.update_at(t0 + Duration::from_millis(200)),
        UpdateOutcome::Updated
    );
    assert!(reconstructor.mesh().is_empty());
}

fn user_snapshot(revision: u64) -> FrameSnapshot {
    let mut snap = flat_snapshot(4, 4, 2000, revision);
    snap.body_index = vec![1u8; 16].into();
    snap
}

fn user_source() -> Arc<MockSource> {
    let source = Arc::new(MockSource::default());
    source.set_frame(user_snapshot(1));
    *source.user_body_index.lock().unwrap() = Some(1);
    source.joints.lock().unwrap().extend([
        (JointType::HandLeft, Vec3::new(0.0, 0.0, 2.0)),
        (JointType::SpineBase, Vec3::new(0.0, -0.3, 2.0)),
    ]);
    source
}

#[test]
fn user_mesh_builds_near_tracked_hand() {
    let source = user_source();
    let mut reconstructor =
        UserMeshReconstructor::new(UserMeshConfig::default(), Arc::clone(&source) as _);

    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
    assert!(!reconstructor.mesh().is_empty());

    // Vertices are re-centered on the spine base
    let bounds = reconstructor.mesh().bounds();
    assert!(bounds.center().y > 0.0);
}

#[test]
fn user_mesh_empty_when_no_user_resolved() {
    let source = user_source();
    *source.user_body_index.lock().unwrap() = None;

    let mut reconstructor =
        UserMeshReconstructor::new(UserMeshConfig::default(), Arc::clone(&source) as _);

    // Still a successful rebuild, just with empty buffers
    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
    assert!(reconstructor.mesh().is_empty());
}

#[test]
fn user_mesh_unchanged_until_new_frame() {
    let source = user_source();
    let mut reconstructor =
        UserMeshReconstructor::new(UserMeshConfig::default(), Arc::clone(&source) as _);

    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
    assert_eq!(reconstructor.update(), UpdateOutcome::Unchanged);

    source.bump_revision();
    assert_eq!(reconstructor.update(), UpdateOutcome::Updated);
}

#[test]
fn user_position_follows_spine_base() {
    let source = user_source();
    let config = UserMeshConfig {
        origin_position: Vec3::new(0.0, 0.0, 1.0),
        ..Default::default()
    };
    let mut reconstructor = UserMeshReconstructor::new(config, Arc::clone(&source) as _);

    reconstructor.update();
    let pos = reconstructor.user_position();
    assert!((pos.y - (-0.3)).abs() < 1e-6);
    assert!((pos.z - 3.0).abs() < 1e-6);
}

#[test]
fn user_mesh_respects_inverted_z() {
    let source = user_source();
    let config = UserMeshConfig {
        inverted_z: true,
        ..Default::default()
    };
    let mut reconstructor = UserMeshReconstructor::new(config, Arc::clone(&source) as _);

    reconstructor.update();
    assert!(reconstructor.user_position().z < 0.0);
}
