// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary glTF (GLB) scene export
//!
//! Layout: `[header][JSON chunk][BIN chunk]`, all little-endian.
//! Header is magic `glTF`, version 2 and total length (3 x u32). Each chunk
//! is `length(u32) + type(u32) + payload`, padded to 4 bytes (JSON with
//! spaces, BIN with zeros).
//!
//! The scene has a single root node `scene` with one child node per mesh.
//! Child nodes carry `elementId`, `assetId` and `tolerance` in `extras`, and
//! the mesh origin as their `translation`; vertex data stays origin-relative.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use serde_json::{json, Value};

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// One mesh to place in the exported scene
#[derive(Debug, Clone, Copy)]
pub struct SceneMesh<'a> {
    pub element_id: &'a str,
    pub asset_id: &'a str,
    pub tolerance: f64,
    pub mesh: &'a Mesh,
}

/// Serialize meshes into one GLB blob
///
/// Output bytes depend only on the input, so equal scenes export identically.
pub fn export_glb(meshes: &[SceneMesh<'_>]) -> Result<Vec<u8>> {
    if meshes.is_empty() {
        return Err(Error::InvalidArgument("scene has no meshes".to_string()));
    }

    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::with_capacity(meshes.len() * 3);
    let mut accessors = Vec::with_capacity(meshes.len() * 3);
    let mut gltf_meshes = Vec::with_capacity(meshes.len());
    let mut nodes = Vec::with_capacity(meshes.len() + 1);

    nodes.push(json!({
        "name": "scene",
        "children": (1..=meshes.len()).collect::<Vec<_>>(),
    }));

    for (i, scene_mesh) in meshes.iter().enumerate() {
        let mesh = scene_mesh.mesh;
        mesh.validate()?;
        if mesh.triangle_count() == 0 {
            return Err(Error::Export(format!(
                "mesh for {} has no triangles",
                scene_mesh.element_id
            )));
        }

        let (min, max) = mesh.position_range();
        let base_view = buffer_views.len();

        let offset = bin.len();
        for f in &mesh.positions {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bin.len() - offset,
            "target": TARGET_ARRAY_BUFFER,
        }));

        let offset = bin.len();
        for f in &mesh.normals {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bin.len() - offset,
            "target": TARGET_ARRAY_BUFFER,
        }));

        let offset = bin.len();
        for idx in &mesh.indices {
            bin.extend_from_slice(&idx.to_le_bytes());
        }
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bin.len() - offset,
            "target": TARGET_ELEMENT_ARRAY_BUFFER,
        }));

        let base_accessor = accessors.len();
        accessors.push(json!({
            "bufferView": base_view,
            "componentType": COMPONENT_FLOAT,
            "count": mesh.vertex_count(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }));
        accessors.push(json!({
            "bufferView": base_view + 1,
            "componentType": COMPONENT_FLOAT,
            "count": mesh.vertex_count(),
            "type": "VEC3",
        }));
        accessors.push(json!({
            "bufferView": base_view + 2,
            "componentType": COMPONENT_UNSIGNED_INT,
            "count": mesh.indices.len(),
            "type": "SCALAR",
        }));

        gltf_meshes.push(json!({
            "name": scene_mesh.element_id,
            "primitives": [{
                "attributes": {
                    "POSITION": base_accessor,
                    "NORMAL": base_accessor + 1,
                },
                "indices": base_accessor + 2,
                "mode": 4,
            }],
        }));

        nodes.push(json!({
            "name": scene_mesh.element_id,
            "mesh": i,
            "translation": mesh.origin,
            "extras": {
                "elementId": scene_mesh.element_id,
                "assetId": scene_mesh.asset_id,
                "tolerance": scene_mesh.tolerance,
            },
        }));
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "bimq-geometry" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": nodes,
        "meshes": gltf_meshes,
        "accessors": accessors,
        "bufferViews": buffer_views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    let mut json_bytes =
        serde_json::to_vec(&document).map_err(|e| Error::Export(e.to_string()))?;
    let json_padding = (4 - json_bytes.len() % 4) % 4;
    json_bytes.resize(json_bytes.len() + json_padding, b' ');
    let bin_padding = (4 - bin.len() % 4) % 4;
    bin.resize(bin.len() + bin_padding, 0);

    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::Export(format!("scene of {total} bytes exceeds GLB limit")))?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());

    out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_bytes);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);

    Ok(out)
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::Export(format!("truncated GLB at byte {at}")))
}

/// Parse the JSON chunk of a GLB blob (header and chunk framing checked)
pub fn read_glb_json(bytes: &[u8]) -> Result<Value> {
    if read_u32(bytes, 0)? != GLB_MAGIC {
        return Err(Error::Export("missing glTF magic".to_string()));
    }
    let version = read_u32(bytes, 4)?;
    if version != GLB_VERSION {
        return Err(Error::Export(format!("unsupported GLB version {version}")));
    }
    let total = read_u32(bytes, 8)? as usize;
    if total != bytes.len() {
        return Err(Error::Export(format!(
            "header length {total} != blob length {}",
            bytes.len()
        )));
    }
    let json_len = read_u32(bytes, 12)? as usize;
    if read_u32(bytes, 16)? != CHUNK_JSON {
        return Err(Error::Export("first chunk is not JSON".to_string()));
    }
    let json = bytes
        .get(20..20 + json_len)
        .ok_or_else(|| Error::Export("truncated JSON chunk".to_string()))?;
    serde_json::from_slice(json).map_err(|e| Error::Export(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::Prism;
    use nalgebra::Point3;

    fn box_mesh(x: f64) -> Mesh {
        let prism = Prism::cuboid(Point3::new(x, 0.0, 0.0), 1.0, 2.0, 3.0).unwrap();
        Mesh::from_polygons(&prism.boundary().unwrap()).unwrap()
    }

    #[test]
    fn test_glb_framing() {
        let mesh = box_mesh(0.0);
        let glb = export_glb(&[SceneMesh {
            element_id: "2O2Fr$t4X7Zf8NOew3FLOH",
            asset_id: "asset-1",
            tolerance: 0.01,
            mesh: &mesh,
        }])
        .unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(glb.len() % 4, 0);
        assert_eq!(read_u32(&glb, 8).unwrap() as usize, glb.len());

        let doc = read_glb_json(&glb).unwrap();
        assert_eq!(doc["nodes"][0]["name"], "scene");
        assert_eq!(doc["nodes"][1]["extras"]["elementId"], "2O2Fr$t4X7Zf8NOew3FLOH");
        assert_eq!(doc["accessors"][2]["count"], 36);
        assert_eq!(doc["accessors"][0]["max"][2], 3.0);
        assert_eq!(doc["nodes"][1]["translation"], json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_multiple_meshes_share_buffer() {
        let (a, b) = (box_mesh(0.0), box_mesh(5.0));
        let scene = [
            SceneMesh { element_id: "a", asset_id: "1", tolerance: 0.01, mesh: &a },
            SceneMesh { element_id: "b", asset_id: "2", tolerance: 0.01, mesh: &b },
        ];
        let glb = export_glb(&scene).unwrap();
        let doc = read_glb_json(&glb).unwrap();
        assert_eq!(doc["nodes"][0]["children"], json!([1, 2]));
        assert_eq!(doc["bufferViews"].as_array().map(Vec::len), Some(6));
        // Same local extent, placed by node translation
        assert_eq!(doc["accessors"][3]["min"], doc["accessors"][0]["min"]);
        assert_eq!(doc["nodes"][2]["translation"], json!([5.0, 0.0, 0.0]));
        assert_eq!(export_glb(&scene).unwrap(), glb);
    }

    #[test]
    fn test_empty_scene_rejected() {
        assert!(matches!(export_glb(&[]), Err(Error::InvalidArgument(_))));
    }
}
