// SPDX-License-Identifier: GPL-3.0-only

//! LAS point cloud export
//!
//! Exports a depth grid as an uncompressed LAS point cloud. When a color
//! frame is present, points are colored through depth-to-RGB registration
//! (or simple resolution scaling when no registration tables exist).

use las::{Builder, Color, Point, Writer};
use std::path::PathBuf;
use tracing::{debug, info};

use super::{ColorFrame, SceneCaptureConfig};

/// Export a depth grid as a LAS point cloud file
pub async fn export_point_cloud_las(
    depth_data: &[u16],
    depth_width: u32,
    depth_height: u32,
    color: Option<&ColorFrame>,
    output_path: &PathBuf,
    config: &SceneCaptureConfig,
) -> Result<(), String> {
    let depth_data = depth_data.to_vec();
    let color = color.cloned();
    let output_path = output_path.clone();
    let config = config.clone();

    tokio::task::spawn_blocking(move || {
        export_las_sync(
            &depth_data,
            depth_width,
            depth_height,
            color.as_ref(),
            &output_path,
            &config,
        )
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

fn export_las_sync(
    depth_data: &[u16],
    depth_width: u32,
    depth_height: u32,
    color: Option<&ColorFrame>,
    output_path: &PathBuf,
    config: &SceneCaptureConfig,
) -> Result<(), String> {
    let intrinsics = &config.intrinsics;

    // Collect valid 3D points, with color when available
    let mut points: Vec<(f64, f64, f64, Option<(u16, u16, u16)>)> = Vec::new();

    for y in 0..depth_height {
        for x in 0..depth_width {
            let depth_idx = (y * depth_width + x) as usize;
            let raw = depth_data[depth_idx];

            let Some((depth_m, depth_mm)) = config.depth_format.to_meters(raw) else {
                continue;
            };

            if depth_m < intrinsics.min_depth || depth_m > intrinsics.max_depth {
                continue;
            }

            let rgb = match color {
                Some(frame) => {
                    let coords = match &config.registration {
                        Some(reg) => reg.rgb_coords(
                            x,
                            y,
                            depth_mm,
                            depth_width,
                            frame.width,
                            frame.height,
                        ),
                        None => {
                            // No registration - use simple mapping
                            let rx = (x as f32 * frame.width as f32 / depth_width as f32) as i32;
                            let ry = (y as f32 * frame.height as f32 / depth_height as f32) as i32;
                            Some((
                                rx.min(frame.width as i32 - 1),
                                ry.min(frame.height as i32 - 1),
                            ))
                        }
                    };

                    let Some((rgb_x, rgb_y)) = coords else {
                        // Registration out of bounds - skip this point
                        continue;
                    };

                    let rgb_idx = ((rgb_y as u32 * frame.width + rgb_x as u32) * 4) as usize;
                    let r = frame.data.get(rgb_idx).copied().unwrap_or(128) as u16 * 256;
                    let g = frame.data.get(rgb_idx + 1).copied().unwrap_or(128) as u16 * 256;
                    let b = frame.data.get(rgb_idx + 2).copied().unwrap_or(128) as u16 * 256;
                    Some((r, g, b))
                }
                None => None,
            };

            let mut p = intrinsics.unproject(x as f32, y as f32, depth_m);
            if config.mirror {
                p.x = -p.x;
            }

            points.push((p.x as f64, p.y as f64, p.z as f64, rgb));
        }
    }

    if points.is_empty() {
        return Err("No valid depth points to export".to_string());
    }

    info!(
        point_count = points.len(),
        colored = color.is_some(),
        path = %output_path.display(),
        "Exporting point cloud"
    );

    // Calculate bounds for the LAS header transforms
    let (min_x, max_x) = fold_bounds(points.iter().map(|p| p.0));
    let (min_y, max_y) = fold_bounds(points.iter().map(|p| p.1));
    let (min_z, max_z) = fold_bounds(points.iter().map(|p| p.2));

    let mut builder = Builder::from((1, 4)); // LAS 1.4
    builder.point_format.has_color = color.is_some();
    builder.point_format.is_compressed = false; // Uncompressed LAS

    // 1mm precision, centered offsets
    let scale = 0.001;
    builder.transforms = las::Vector {
        x: las::Transform {
            scale,
            offset: (min_x + max_x) / 2.0,
        },
        y: las::Transform {
            scale,
            offset: (min_y + max_y) / 2.0,
        },
        z: las::Transform {
            scale,
            offset: (min_z + max_z) / 2.0,
        },
    };

    let header = builder
        .into_header()
        .map_err(|e| format!("Failed to build LAS header: {}", e))?;

    let mut writer = Writer::from_path(output_path, header)
        .map_err(|e| format!("Failed to create LAS writer: {}", e))?;

    for (px, py, pz, rgb) in points {
        let mut point = Point::default();
        point.x = px;
        point.y = py;
        point.z = pz;
        point.color = rgb.map(|(r, g, b)| Color::new(r, g, b));

        writer
            .write_point(point)
            .map_err(|e| format!("Failed to write point: {}", e))?;
    }

    writer
        .close()
        .map_err(|e| format!("Failed to close LAS file: {}", e))?;

    debug!(path = %output_path.display(), "LAS export complete");

    Ok(())
}

fn fold_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::MAX, f64::MIN), |(min, max), v| {
        (min.min(v), max.max(v))
    })
}
