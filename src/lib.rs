// SPDX-License-Identifier: GPL-3.0-only

//! depthmesh - Depth-grid mesh reconstruction for Kinect-class sensors
//!
//! This library turns per-frame depth sensor data into triangulated,
//! textured meshes: a static-scene mesh bounded by a tracked depth window,
//! and a tracked-user mesh restricted to the vicinity of the user's hands.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`sensor`]: Frame snapshots, the sensor source abstraction, depth
//!   conversion, intrinsics, registration, and file-backed replay
//! - [`mesh`]: Sample-block classification, mesh assembly, and the
//!   per-frame reconstruction drivers
//! - [`export`]: Scene capture artifacts (GLB mesh, LAS point cloud,
//!   depth/color images)
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use depthmesh::mesh::{SceneMeshConfig, SceneMeshReconstructor};
//! use depthmesh::sensor::{ReplaySource, replay::ReplayOptions};
//! use std::sync::Arc;
//!
//! let source = ReplaySource::open(
//!     std::path::Path::new("capture/"),
//!     &ReplayOptions::default(),
//! )
//! .expect("capture exists");
//!
//! let mut reconstructor =
//!     SceneMeshReconstructor::new(SceneMeshConfig::default(), Arc::new(source));
//! reconstructor.update();
//! println!("{} triangles", reconstructor.mesh().buffer().triangle_count());
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod export;
pub mod mesh;
pub mod sensor;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, SensorError};
pub use mesh::{MeshBuffer, RenderMesh, SceneMeshReconstructor, UserMeshReconstructor};
pub use sensor::{FrameSnapshot, SensorSource};
