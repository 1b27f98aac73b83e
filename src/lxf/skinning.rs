//! Bone transform resolution
//!
//! Two stages touch the bone map. At load time, flex rest bones from
//! the primitive metadata are folded into the raw geometry (preflex).
//! At assembly time, flex parts resolve their scene bones per vertex;
//! rigid parts skip this entirely and place the whole object instead.

use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec3};

use super::geometry::GeometryChunk;
use super::primitive::FlexBone;

/// Fold the primitive's flex rest bones into the raw geometry in
/// place. Vertices are matched by bone list position; geometry without
/// a bone map belongs entirely to bone 0.
pub fn apply_preflex(chunk: &mut GeometryChunk, flex_bones: &[FlexBone]) {
    if flex_bones.is_empty() {
        return;
    }
    for (i, bone) in flex_bones.iter().enumerate() {
        let linear = glam::Mat3::from_mat4(bone.transform);
        for v in 0..chunk.positions.len() {
            if bone_index(chunk, v) == i {
                chunk.positions[v] = bone.transform.transform_point3(chunk.positions[v]);
                chunk.normals[v] = linear * chunk.normals[v];
            }
        }
    }
}

/// Resolve a flex part's scene bones per vertex, producing transformed
/// position and normal arrays. Normals take the linear part only.
pub fn resolve_flex(
    chunk: &GeometryChunk,
    bones: &[Mat4],
) -> Result<(Vec<Vec3>, Vec<Vec3>)> {
    let linears: Vec<glam::Mat3> = bones.iter().map(|m| glam::Mat3::from_mat4(*m)).collect();

    let mut positions = Vec::with_capacity(chunk.positions.len());
    let mut normals = Vec::with_capacity(chunk.normals.len());
    for v in 0..chunk.positions.len() {
        let b = bone_index(chunk, v);
        if b >= bones.len() {
            return Err(Error::CorruptBoneReference {
                vertex: v,
                bone: b,
                bone_count: bones.len(),
            });
        }
        positions.push(bones[b].transform_point3(chunk.positions[v]));
        normals.push(linears[b] * chunk.normals[v]);
    }
    Ok((positions, normals))
}

fn bone_index(chunk: &GeometryChunk, vertex: usize) -> usize {
    chunk
        .bone_map
        .as_ref()
        .map_or(0, |map| map[vertex] as usize)
}
