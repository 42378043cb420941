// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depthmesh::Config;
use depthmesh::export::EncodingFormat;
use depthmesh::sensor::DepthFormat;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(
        config.mirrored, true,
        "Mesh should face the player by default"
    );
    assert!(config.min_distance < config.max_distance);
    assert_eq!(config.depth_format, DepthFormat::Millimeters);
    assert_eq!(config.image_format, EncodingFormat::Png);
}

#[test]
fn test_config_roundtrip() {
    let dir = std::env::temp_dir().join("depthmesh-config-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");

    let mut config = Config::default();
    config.max_distance = 5.5;
    config.update_when_no_users = true;
    config.image_format = EncodingFormat::Jpeg;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let path = std::env::temp_dir().join("depthmesh-config-tests-does-not-exist.json");
    let config = Config::load(&path).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_config_file_fills_defaults() {
    let dir = std::env::temp_dir().join("depthmesh-config-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("partial.json");
    std::fs::write(&path, r#"{"max_distance": 6.0}"#).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.max_distance, 6.0);
    assert_eq!(config.min_distance, Config::default().min_distance);
}

#[test]
fn test_scene_mesh_config_mapping() {
    let mut config = Config::default();
    config.min_distance = 0.8;
    config.max_distance = 2.5;
    config.update_interval_secs = 0.25;
    config.update_collider = true;

    let scene = config.scene_mesh_config();
    assert_eq!(scene.min_distance, 0.8);
    assert_eq!(scene.max_distance, 2.5);
    assert_eq!(scene.update_interval, Duration::from_secs_f32(0.25));
    assert!(scene.update_collider);
}
