//! Recursive mesh splitting for vertex budgets
//!
//! Game targets cap meshes at 64k vertices. Oversized meshes are split
//! along the longest bounding-box axis at the vertex mean, whole
//! connected islands at a time, until every piece fits. A split that
//! peels off almost nothing means the geometry cannot be divided and
//! is reported as a typed error instead of recursing forever.

use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Aabb;

use super::{Mesh, Polygon};

pub const DEFAULT_MAX_VERTS: usize = 65536;
pub const DEFAULT_MIN_DIV_RATE: f32 = 0.1;

/// Split `mesh` into pieces of fewer than `max_verts` vertices each.
/// Returns the input untouched (as a single piece) when it already fits.
pub fn divide(mesh: Mesh, max_verts: usize, min_div_rate: f32) -> Result<Vec<Mesh>> {
    if mesh.positions.len() < max_verts {
        return Ok(vec![mesh]);
    }

    let total = mesh.positions.len();
    let axis = Aabb::from_points(&mesh.positions).longest_axis();
    let mean = mesh.positions.iter().map(|p| p[axis]).sum::<f32>() / total as f32;

    // Whole connected islands move together, matching how a selection
    // flood-fill would behave. An island moves when any of its vertices
    // falls below the split plane.
    let island = vertex_islands(&mesh);
    let mut island_moves = vec![false; total];
    for (v, p) in mesh.positions.iter().enumerate() {
        if p[axis] < mean {
            island_moves[island[v]] = true;
        }
    }

    let mut poly_moves = Vec::with_capacity(mesh.polygons.len());
    for poly in &mesh.polygons {
        let root = island[mesh.polygon_vertices(poly)[0] as usize];
        poly_moves.push(island_moves[root]);
    }

    let moved = extract(&mesh, &poly_moves, true);
    let kept = extract(&mesh, &poly_moves, false);

    let rate = moved.positions.len() as f32 / total as f32;
    let rate = rate.min(1.0 - rate);
    if rate < min_div_rate {
        return Err(Error::DivisionRateTooLow {
            rate,
            min_rate: min_div_rate,
        });
    }

    let mut out = divide(kept, max_verts, min_div_rate)?;
    out.extend(divide(moved, max_verts, min_div_rate)?);
    Ok(out)
}

/// Union-find over vertices connected by shared polygons. Returns the
/// root island id per vertex.
fn vertex_islands(mesh: &Mesh) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..mesh.positions.len()).collect();

    fn find(parent: &mut [usize], mut v: usize) -> usize {
        while parent[v] != v {
            parent[v] = parent[parent[v]];
            v = parent[v];
        }
        v
    }

    for poly in &mesh.polygons {
        let verts = mesh.polygon_vertices(poly);
        let first = find(&mut parent, verts[0] as usize);
        for &v in &verts[1..] {
            let root = find(&mut parent, v as usize);
            parent[root] = first;
        }
    }

    (0..mesh.positions.len())
        .map(|v| find(&mut parent, v))
        .collect()
}

/// Copy the polygons whose flag equals `want` into a fresh compact mesh.
fn extract(mesh: &Mesh, flags: &[bool], want: bool) -> Mesh {
    let mut out = Mesh::new();
    out.material_slots = mesh.material_slots.clone();
    if mesh.loop_uvs.is_some() {
        out.loop_uvs = Some(Vec::new());
    }
    for layer in &mesh.color_layers {
        out.color_layers.push(super::ColorLayer {
            name: layer.name.clone(),
            data: Vec::new(),
        });
    }

    let mut remap = vec![u32::MAX; mesh.positions.len()];
    for (pi, poly) in mesh.polygons.iter().enumerate() {
        if flags[pi] != want {
            continue;
        }
        let loop_start = out.loop_vertices.len() as u32;
        for l in poly.loops() {
            let v = mesh.loop_vertices[l] as usize;
            if remap[v] == u32::MAX {
                remap[v] = out.positions.len() as u32;
                out.positions.push(mesh.positions[v]);
                if v < mesh.normals.len() {
                    out.normals.push(mesh.normals[v]);
                }
            }
            out.loop_vertices.push(remap[v]);
            if let (Some(dst), Some(src)) = (&mut out.loop_uvs, &mesh.loop_uvs) {
                dst.push(src[l]);
            }
            for (dst, src) in out.color_layers.iter_mut().zip(&mesh.color_layers) {
                dst.data.push(src.data[l]);
            }
        }
        out.polygons.push(Polygon {
            loop_start,
            loop_len: poly.loop_len,
            material: poly.material,
            selected: poly.selected,
        });
    }
    out
}
