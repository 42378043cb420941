// SPDX-License-Identifier: GPL-3.0-only

//! GLTF mesh export
//!
//! Exports a reconstructed mesh as a GLB (binary glTF) file. When a color
//! frame is available it is embedded as a JPEG texture addressed by the
//! mesh UVs; otherwise the material falls back to a flat base color.

use std::path::PathBuf;
use tracing::{debug, info};

use super::ColorFrame;
use crate::constants::JPEG_QUALITY;
use crate::mesh::MeshBuffer;

/// Export mesh as GLB file, optionally textured with a color frame
pub async fn export_mesh_glb(
    mesh: &MeshBuffer,
    color: Option<&ColorFrame>,
    output_path: &PathBuf,
) -> Result<(), String> {
    let mesh = mesh.clone();
    let color = color.cloned();
    let output_path = output_path.clone();

    tokio::task::spawn_blocking(move || export_glb_sync(&mesh, color.as_ref(), &output_path))
        .await
        .map_err(|e| format!("Task join error: {}", e))?
}

pub(crate) fn export_glb_sync(
    mesh: &MeshBuffer,
    color: Option<&ColorFrame>,
    output_path: &PathBuf,
) -> Result<(), String> {
    if mesh.vertices.is_empty() || mesh.triangles.is_empty() {
        return Err("No valid mesh triangles generated".to_string());
    }

    let texture_data = match color {
        Some(frame) => Some(encode_texture_jpeg(frame)?),
        None => None,
    };

    info!(
        vertex_count = mesh.vertex_count(),
        triangle_count = mesh.triangle_count(),
        textured = texture_data.is_some(),
        path = %output_path.display(),
        "Exporting mesh"
    );

    build_glb_file(mesh, texture_data.as_deref(), output_path)
}

/// Encode a color frame as JPEG for embedding in GLB
fn encode_texture_jpeg(frame: &ColorFrame) -> Result<Vec<u8>, String> {
    use image::{ImageBuffer, Rgba};

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or("Failed to create image buffer")?;
    let rgb_img = image::DynamicImage::ImageRgba8(img).into_rgb8();

    let mut jpeg_data = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_data, JPEG_QUALITY);
    encoder
        .encode_image(&rgb_img)
        .map_err(|e| format!("Failed to encode JPEG: {}", e))?;

    debug!(
        jpeg_size = jpeg_data.len(),
        original_size = frame.data.len(),
        "Encoded texture as JPEG"
    );

    Ok(jpeg_data)
}

/// Build a GLB (binary glTF) file
fn build_glb_file(
    mesh: &MeshBuffer,
    texture_data: Option<&[u8]>,
    output_path: &PathBuf,
) -> Result<(), String> {
    let vertices_bytes: Vec<u8> = mesh
        .vertices
        .iter()
        .flat_map(|v| v.to_array().into_iter().flat_map(|f| f.to_le_bytes()))
        .collect();
    let uvs_bytes: Vec<u8> = mesh
        .uvs
        .iter()
        .flat_map(|uv| uv.to_array().into_iter().flat_map(|f| f.to_le_bytes()))
        .collect();
    let indices_bytes: Vec<u8> = mesh.triangles.iter().flat_map(|i| i.to_le_bytes()).collect();

    // Buffer layout: vertices | uvs | indices | texture
    let vertex_offset = 0usize;
    let vertex_len = vertices_bytes.len();
    let uv_offset = vertex_len;
    let uv_len = uvs_bytes.len();
    let index_offset = uv_offset + uv_len;
    let index_len = indices_bytes.len();
    let texture_offset = index_offset + index_len;
    let texture_len = texture_data.map(|t| t.len()).unwrap_or(0);
    let total_buffer_len = texture_offset + texture_len;

    // Pad to 4-byte alignment
    let padding = (4 - (total_buffer_len % 4)) % 4;
    let padded_buffer_len = total_buffer_len + padding;

    // Calculate min/max for vertices
    let mut min_pos = [f32::MAX; 3];
    let mut max_pos = [f32::MIN; 3];
    for v in &mesh.vertices {
        let p = v.to_array();
        for axis in 0..3 {
            min_pos[axis] = min_pos[axis].min(p[axis]);
            max_pos[axis] = max_pos[axis].max(p[axis]);
        }
    }

    let material = match texture_data {
        Some(_) => serde_json::json!({
            "pbrMetallicRoughness": {
                "baseColorTexture": {
                    "index": 0
                },
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            },
            "doubleSided": true
        }),
        None => serde_json::json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": [0.8, 0.8, 0.8, 1.0],
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0
            },
            "doubleSided": true
        }),
    };

    let mut gltf_json = serde_json::json!({
        "asset": {
            "generator": "depthmesh",
            "version": "2.0"
        },
        "scene": 0,
        "scenes": [{
            "nodes": [0]
        }],
        "nodes": [{
            "mesh": 0
        }],
        "meshes": [{
            "primitives": [{
                "attributes": {
                    "POSITION": 0,
                    "TEXCOORD_0": 1
                },
                "indices": 2,
                "material": 0,
                "mode": 4
            }]
        }],
        "materials": [material],
        "accessors": [
            {
                "bufferView": 0,
                "byteOffset": 0,
                "componentType": 5126,  // FLOAT
                "count": mesh.vertices.len(),
                "type": "VEC3",
                "min": min_pos,
                "max": max_pos
            },
            {
                "bufferView": 1,
                "byteOffset": 0,
                "componentType": 5126,  // FLOAT
                "count": mesh.uvs.len(),
                "type": "VEC2"
            },
            {
                "bufferView": 2,
                "byteOffset": 0,
                "componentType": 5125,  // UNSIGNED_INT
                "count": mesh.triangles.len(),
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            {
                "buffer": 0,
                "byteOffset": vertex_offset,
                "byteLength": vertex_len,
                "byteStride": 12,
                "target": 34962  // ARRAY_BUFFER
            },
            {
                "buffer": 0,
                "byteOffset": uv_offset,
                "byteLength": uv_len,
                "byteStride": 8,
                "target": 34962  // ARRAY_BUFFER
            },
            {
                "buffer": 0,
                "byteOffset": index_offset,
                "byteLength": index_len,
                "target": 34963  // ELEMENT_ARRAY_BUFFER
            }
        ],
        "buffers": [{
            "byteLength": padded_buffer_len
        }]
    });

    if texture_data.is_some() {
        let root = gltf_json.as_object_mut().expect("glTF root is an object");
        root.insert(
            "textures".into(),
            serde_json::json!([{ "sampler": 0, "source": 0 }]),
        );
        root.insert(
            "samplers".into(),
            serde_json::json!([{
                "magFilter": 9729,  // LINEAR
                "minFilter": 9987,  // LINEAR_MIPMAP_LINEAR
                "wrapS": 33071,     // CLAMP_TO_EDGE
                "wrapT": 33071      // CLAMP_TO_EDGE
            }]),
        );
        root.insert(
            "images".into(),
            serde_json::json!([{ "bufferView": 3, "mimeType": "image/jpeg" }]),
        );
        root["bufferViews"]
            .as_array_mut()
            .expect("bufferViews is an array")
            .push(serde_json::json!({
                "buffer": 0,
                "byteOffset": texture_offset,
                "byteLength": texture_len
                // No target for images
            }));
    }

    let json_string =
        serde_json::to_string(&gltf_json).map_err(|e| format!("Failed to serialize glTF: {}", e))?;
    let json_bytes = json_string.as_bytes();

    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;

    let total_length = 12 + 8 + padded_json_len + 8 + padded_buffer_len;

    let mut glb_data: Vec<u8> = Vec::with_capacity(total_length);

    // GLB Header
    glb_data.extend_from_slice(b"glTF"); // Magic
    glb_data.extend_from_slice(&2u32.to_le_bytes()); // Version
    glb_data.extend_from_slice(&(total_length as u32).to_le_bytes()); // Length

    // JSON chunk
    glb_data.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    glb_data.extend_from_slice(&0x4E4F534Au32.to_le_bytes()); // Chunk type "JSON"
    glb_data.extend_from_slice(json_bytes);
    glb_data.extend(std::iter::repeat_n(0x20u8, json_padding)); // Space padding

    // Binary chunk
    glb_data.extend_from_slice(&(padded_buffer_len as u32).to_le_bytes());
    glb_data.extend_from_slice(&0x004E4942u32.to_le_bytes()); // Chunk type "BIN\0"
    glb_data.extend_from_slice(&vertices_bytes);
    glb_data.extend_from_slice(&uvs_bytes);
    glb_data.extend_from_slice(&indices_bytes);
    if let Some(texture) = texture_data {
        glb_data.extend_from_slice(texture);
    }
    glb_data.extend(std::iter::repeat_n(0u8, padding)); // Null padding

    std::fs::write(output_path, glb_data)
        .map_err(|e| format!("Failed to write GLB file: {}", e))?;

    debug!(path = %output_path.display(), "GLB export complete");

    Ok(())
}
