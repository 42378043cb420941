// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for reconstruction operations
//!
//! This module provides command-line functionality for:
//! - Inspecting captures
//! - One-shot reconstruction and scene export
//! - Continuous replay with live mesh rebuilds

use depthmesh::config::Config;
use depthmesh::constants::NO_BODY_INDEX;
use depthmesh::export::{ColorFrame, SceneCaptureConfig, capture_scene};
use depthmesh::mesh::{
    MeshBuffer, SceneMeshConfig, SceneMeshReconstructor, UpdateOutcome, UserMeshConfig,
    UserMeshReconstructor,
};
use depthmesh::sensor::frame_loop::{CaptureLoopController, LoopAction};
use depthmesh::sensor::replay::{ReplayOptions, ReplaySource};
use depthmesh::sensor::{CameraIntrinsics, DepthFormat, FrameSnapshot, SensorSource};
use futures::channel::mpsc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Load the config from an explicit path or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match Config::default_path() {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };
    Ok(Config::load(&path)?)
}

fn replay_options(config: &Config, disparity: bool) -> ReplayOptions {
    ReplayOptions {
        depth_format: if disparity {
            DepthFormat::Disparity16
        } else {
            config.depth_format
        },
        ..Default::default()
    }
}

/// Inspect a capture and print its contents
pub fn info(capture: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = ReplaySource::open(capture, &replay_options(config, false))?;

    println!("Capture: {}", capture.display());
    println!("  Frames: {}", source.frame_count());

    let snapshot = source.snapshot().ok_or("Capture has no frames")?;
    println!(
        "  Depth grid: {}x{}",
        snapshot.depth_width, snapshot.depth_height
    );
    println!(
        "  Color grid: {}x{}",
        snapshot.color_width, snapshot.color_height
    );

    if let Some((_, w, h)) = source.color_rgba() {
        println!("  Color image: {}x{}", w, h);
    } else {
        println!("  Color image: none");
    }

    let valid = snapshot.depth.iter().filter(|&&d| d > 0).count();
    let total = snapshot.depth.len();
    println!(
        "  Valid depth pixels: {} / {} ({:.1}%)",
        valid,
        total,
        100.0 * valid as f32 / total as f32
    );

    if let Some((min, max)) = depth_range(&snapshot) {
        println!("  Depth range: {}mm - {}mm", min, max);
    }

    let user_pixels = snapshot
        .body_index
        .iter()
        .filter(|&&b| b != NO_BODY_INDEX)
        .count();
    if user_pixels > 0 {
        println!("  User pixels: {}", user_pixels);
    }

    Ok(())
}

fn depth_range(snapshot: &FrameSnapshot) -> Option<(u16, u16)> {
    let mut range: Option<(u16, u16)> = None;
    for &d in snapshot.depth.iter().filter(|&&d| d > 0) {
        range = Some(match range {
            Some((min, max)) => (min.min(d), max.max(d)),
            None => (d, d),
        });
    }
    range
}

/// Reconstruct a mesh from a capture and export scene artifacts
pub fn reconstruct(
    capture: &Path,
    output: Option<PathBuf>,
    player: Option<usize>,
    disparity: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(ReplaySource::open(capture, &replay_options(config, disparity))?);
    let sensor: Arc<dyn SensorSource> = Arc::clone(&source) as Arc<dyn SensorSource>;

    let buffer: MeshBuffer = match player {
        Some(player_index) => {
            let user_config = UserMeshConfig {
                player_index,
                mirrored: config.mirrored,
                update_collider: config.update_collider,
                ..Default::default()
            };
            let mut reconstructor = UserMeshReconstructor::new(user_config, sensor);
            reconstructor.update();
            reconstructor.mesh().buffer().clone()
        }
        None => {
            let mut reconstructor =
                SceneMeshReconstructor::new(config.scene_mesh_config(), sensor);
            reconstructor.update();
            reconstructor.mesh().buffer().clone()
        }
    };

    println!(
        "Reconstructed mesh: {} vertices, {} triangles",
        buffer.vertex_count(),
        buffer.triangle_count()
    );

    if buffer.is_empty() {
        println!("Mesh is empty; nothing to export.");
        return Ok(());
    }

    let snapshot = source.snapshot().ok_or("Capture has no frames")?;
    let output_dir = output.unwrap_or_else(|| config.capture_dir());
    export_scene(&buffer, &snapshot, &source, output_dir, config)
}

/// Continuously replay a capture, rebuilding the mesh until Ctrl-C
pub fn watch(
    capture: &Path,
    interval: f32,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let replay = Arc::new(ReplaySource::open(capture, &replay_options(config, false))?);
    println!(
        "Replaying {} frame(s) every {:.0}ms; Ctrl-C to stop",
        replay.frame_count(),
        interval * 1000.0
    );

    // Producer thread: advance the replay and push fresh snapshots
    let (mut sender, mut receiver) = mpsc::channel::<FrameSnapshot>(8);
    let producer_replay = Arc::clone(&replay);
    let frame_interval = Duration::from_secs_f32(interval.max(0.001));
    let mut first = true;

    let producer = CaptureLoopController::start("replay-producer", move || {
        // The first tick replays frame 0 as-is
        if !first {
            producer_replay.advance();
        }
        first = false;

        let Some(snapshot) = producer_replay.snapshot() else {
            return LoopAction::Stop;
        };
        if sender.try_send(snapshot).is_err() {
            // Consumer is behind; drop the frame rather than block
            warn!("Dropping replay frame, consumer is behind");
        }

        std::thread::sleep(frame_interval);
        LoopAction::Continue
    });

    let channel_source = Arc::new(ChannelSource::default());
    let mut reconstructor = SceneMeshReconstructor::new(
        config.scene_mesh_config(),
        Arc::clone(&channel_source) as Arc<dyn SensorSource>,
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })?;

    let mut updates = 0u64;
    let mut skips = 0u64;

    while running.load(Ordering::SeqCst) {
        match receiver.try_next() {
            Ok(Some(snapshot)) => {
                channel_source.push(snapshot);
                match reconstructor.update() {
                    UpdateOutcome::Updated => {
                        updates += 1;
                        let mesh = reconstructor.mesh();
                        print!(
                            "\rframe {:>6}: {:>7} vertices, {:>7} triangles",
                            updates,
                            mesh.buffer().vertex_count(),
                            mesh.buffer().triangle_count()
                        );
                        use std::io::Write;
                        let _ = std::io::stdout().flush();
                    }
                    _ => skips += 1,
                }
            }
            Ok(None) => break,
            Err(_) => {
                // No frame available yet, wait a bit
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    producer.stop();
    println!();
    println!("Rebuilt {} mesh(es), skipped {} tick(s)", updates, skips);

    if let Some(output_dir) = output {
        let buffer = reconstructor.mesh().buffer().clone();
        if buffer.is_empty() {
            println!("Final mesh is empty; nothing to export.");
            return Ok(());
        }
        let snapshot = channel_source.snapshot().ok_or("No frame was replayed")?;
        export_scene(&buffer, &snapshot, &replay, output_dir, config)?;
    }

    Ok(())
}

/// Export scene artifacts for a reconstructed mesh
fn export_scene(
    buffer: &MeshBuffer,
    snapshot: &FrameSnapshot,
    replay: &ReplaySource,
    output_dir: PathBuf,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut intrinsics =
        CameraIntrinsics::scaled_for(snapshot.depth_width as u32, snapshot.depth_height as u32);
    intrinsics.min_depth = config.min_distance;
    intrinsics.max_depth = config.max_distance;

    let capture_config = SceneCaptureConfig {
        image_format: config.image_format,
        intrinsics,
        // Snapshot depth grids are already converted to millimeters
        depth_format: DepthFormat::Millimeters,
        mirror: config.mirrored,
        registration: None,
    };

    let color = replay.color_rgba().map(|(data, width, height)| ColorFrame {
        data: data.to_vec(),
        width,
        height,
    });

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(capture_scene(
        buffer,
        &snapshot.depth,
        snapshot.depth_width as u32,
        snapshot.depth_height as u32,
        color.as_ref(),
        output_dir,
        capture_config,
    ))?;

    println!("Scene saved to {}", result.scene_dir.display());
    println!("  Mesh:        {}", result.mesh_path.display());
    println!("  Point cloud: {}", result.pointcloud_path.display());
    println!("  Depth:       {}", result.depth_path.display());
    if let Some(color_path) = result.color_path {
        println!("  Color:       {}", color_path.display());
    }

    Ok(())
}

/// Sensor source fed by the watch channel: hands the latest received
/// snapshot to the reconstructor
#[derive(Default)]
struct ChannelSource {
    latest: Mutex<Option<FrameSnapshot>>,
}

impl ChannelSource {
    fn push(&self, snapshot: FrameSnapshot) {
        *self.latest.lock().unwrap() = Some(snapshot);
    }
}

impl SensorSource for ChannelSource {
    fn snapshot(&self) -> Option<FrameSnapshot> {
        self.latest.lock().unwrap().clone()
    }

    fn is_user_detected(&self) -> bool {
        self.snapshot().map(|s| s.any_user_pixels()).unwrap_or(false)
    }
}
