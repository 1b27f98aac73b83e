//! Topology operations: validation, triangulation, quad merging,
//! loose-geometry removal.

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::Result;

use super::{Mesh, Polygon};

/// Quad merge requires face normals to agree at least this much.
const COPLANAR_DOT: f32 = 0.9999;

/// Check that every polygon is a tri or a quad. Runs before any
/// hidden-surface processing; the mesh is untouched on failure.
pub fn validate(mesh: &Mesh) -> Result<()> {
    for (i, poly) in mesh.polygons.iter().enumerate() {
        if poly.len() < 3 || poly.len() > 4 {
            return Err(Error::InvalidTopology {
                polygon: i,
                vertex_count: poly.len(),
            });
        }
    }
    Ok(())
}

/// One rebuilt polygon described by old loop indices.
struct Rebuilt {
    material: u32,
    selected: bool,
    loops: Vec<u32>,
}

/// Replace the polygon/loop tables, carrying per-loop layers across.
fn rebuild(mesh: &mut Mesh, polys: Vec<Rebuilt>) {
    let old_loop_vertices = std::mem::take(&mut mesh.loop_vertices);
    let old_uvs = mesh.loop_uvs.take();
    let old_layers = std::mem::take(&mut mesh.color_layers);

    let total: usize = polys.iter().map(|p| p.loops.len()).sum();
    let mut loop_map = Vec::with_capacity(total);

    mesh.polygons.clear();
    mesh.loop_vertices.reserve(total);
    for p in polys {
        let loop_start = mesh.loop_vertices.len() as u32;
        for &l in &p.loops {
            mesh.loop_vertices.push(old_loop_vertices[l as usize]);
            loop_map.push(l);
        }
        mesh.polygons.push(Polygon {
            loop_start,
            loop_len: p.loops.len() as u32,
            material: p.material,
            selected: p.selected,
        });
    }

    if let Some(uvs) = old_uvs {
        mesh.loop_uvs = Some(loop_map.iter().map(|&l| uvs[l as usize]).collect());
    }
    mesh.color_layers = old_layers
        .into_iter()
        .map(|mut layer| {
            layer.data = loop_map.iter().map(|&l| layer.data[l as usize]).collect();
            layer
        })
        .collect();
}

/// Fan-split every quad into two triangles. Leaves the mesh in the
/// uniformly triangulated state exporters expect.
pub fn triangulate(mesh: &mut Mesh) {
    if mesh.polygons.iter().all(|p| !p.is_quad()) {
        return;
    }
    let mut out = Vec::with_capacity(mesh.polygons.len() * 2);
    for poly in &mesh.polygons {
        let start = poly.loop_start;
        for i in 1..poly.loop_len - 1 {
            out.push(Rebuilt {
                material: poly.material,
                selected: poly.selected,
                loops: vec![start, start + i, start + i + 1],
            });
        }
    }
    rebuild(mesh, out);
}

/// Greedily merge coplanar triangle pairs that share an edge and a
/// material slot into quads. Quads and unmatched triangles pass through.
pub fn tris_to_quads(mesh: &mut Mesh) {
    // Edge key (sorted vertex pair) -> polygons owning that edge
    let mut edge_map: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (pi, poly) in mesh.polygons.iter().enumerate() {
        if poly.len() != 3 {
            continue;
        }
        let v = mesh.polygon_vertices(poly);
        for i in 0..3 {
            let a = v[i];
            let b = v[(i + 1) % 3];
            let key = (a.min(b), a.max(b));
            edge_map.entry(key).or_default().push(pi);
        }
    }

    let mut merged_into: Vec<Option<usize>> = vec![None; mesh.polygons.len()];
    let mut consumed = vec![false; mesh.polygons.len()];

    for (pi, poly) in mesh.polygons.iter().enumerate() {
        if poly.len() != 3 || consumed[pi] || merged_into[pi].is_some() {
            continue;
        }
        let normal = mesh.polygon_normal(poly);
        let v = mesh.polygon_vertices(poly);

        'edges: for i in 0..3 {
            let a = v[i];
            let b = v[(i + 1) % 3];
            let key = (a.min(b), a.max(b));
            for &other in &edge_map[&key] {
                if other == pi || consumed[other] || merged_into[other].is_some() {
                    continue;
                }
                let other_poly = &mesh.polygons[other];
                if other_poly.material != poly.material {
                    continue;
                }
                if mesh.polygon_normal(other_poly).dot(normal) < COPLANAR_DOT {
                    continue;
                }
                merged_into[pi] = Some(other);
                consumed[other] = true;
                break 'edges;
            }
        }
    }

    let mut out = Vec::with_capacity(mesh.polygons.len());
    for (pi, poly) in mesh.polygons.iter().enumerate() {
        if consumed[pi] {
            continue;
        }
        let Some(other) = merged_into[pi] else {
            out.push(Rebuilt {
                material: poly.material,
                selected: poly.selected,
                loops: poly.loops().map(|l| l as u32).collect(),
            });
            continue;
        };

        // Rotate this triangle so the shared edge is its last two
        // corners, then splice the partner's opposite corner between
        // them, keeping winding.
        let other_poly = &mesh.polygons[other];
        let v = mesh.polygon_vertices(poly);
        let ov = mesh.polygon_vertices(other_poly);

        let mut quad = None;
        for i in 0..3 {
            let q = v[(i + 1) % 3];
            let r = v[(i + 2) % 3];
            if let Some(d_corner) = (0..3).find(|&j| ov[j] != q && ov[j] != r) {
                if ov.contains(&q) && ov.contains(&r) {
                    let p_loop = poly.loop_start + i as u32;
                    let q_loop = poly.loop_start + ((i + 1) % 3) as u32;
                    let r_loop = poly.loop_start + ((i + 2) % 3) as u32;
                    let d_loop = other_poly.loop_start + d_corner as u32;
                    quad = Some(vec![p_loop, q_loop, d_loop, r_loop]);
                    break;
                }
            }
        }

        match quad {
            Some(loops) => out.push(Rebuilt {
                material: poly.material,
                selected: poly.selected || other_poly.selected,
                loops,
            }),
            // Shared edge disappeared (degenerate partner), keep as is
            None => out.push(Rebuilt {
                material: poly.material,
                selected: poly.selected,
                loops: poly.loops().map(|l| l as u32).collect(),
            }),
        }
    }
    rebuild(mesh, out);
}

/// Delete the polygons whose index is flagged in `remove`.
pub fn delete_polygons(mesh: &mut Mesh, remove: &[bool]) {
    let out = mesh
        .polygons
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove[*i])
        .map(|(_, poly)| Rebuilt {
            material: poly.material,
            selected: poly.selected,
            loops: poly.loops().map(|l| l as u32).collect(),
        })
        .collect();
    rebuild(mesh, out);
}

/// Purge vertices no polygon references, compacting the vertex arrays.
pub fn delete_loose_vertices(mesh: &mut Mesh) {
    let mut used = vec![false; mesh.positions.len()];
    for &v in &mesh.loop_vertices {
        used[v as usize] = true;
    }

    let mut remap = vec![u32::MAX; mesh.positions.len()];
    let mut next = 0u32;
    for (i, &keep) in used.iter().enumerate() {
        if keep {
            remap[i] = next;
            next += 1;
        }
    }
    if next as usize == mesh.positions.len() {
        return;
    }

    let mut positions = Vec::with_capacity(next as usize);
    let mut normals = Vec::with_capacity(mesh.normals.len().min(next as usize));
    for (i, &keep) in used.iter().enumerate() {
        if keep {
            positions.push(mesh.positions[i]);
            if i < mesh.normals.len() {
                normals.push(mesh.normals[i]);
            }
        }
    }
    mesh.positions = positions;
    mesh.normals = normals;
    for v in &mut mesh.loop_vertices {
        *v = remap[*v as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Vec2, Vec3};

    fn unit_square_tris() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::Y,
        ];
        mesh.normals = vec![Vec3::Z; 4];
        mesh.add_polygon(&[0, 1, 2], 0);
        mesh.add_polygon(&[0, 2, 3], 0);
        mesh
    }

    #[test]
    fn test_validate_accepts_tris_and_quads() {
        let mesh = unit_square_tris();
        assert!(validate(&mesh).is_ok());
    }

    #[test]
    fn test_validate_rejects_pentagon() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![Vec3::ZERO; 5];
        mesh.add_polygon(&[0, 1, 2], 0);
        mesh.add_polygon(&[0, 1, 2, 3, 4], 0);
        let err = validate(&mesh).unwrap_err();
        match err {
            Error::InvalidTopology { polygon, vertex_count } => {
                assert_eq!(polygon, 1);
                assert_eq!(vertex_count, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tris_to_quads_merges_square() {
        let mut mesh = unit_square_tris();
        tris_to_quads(&mut mesh);
        assert_eq!(mesh.polygons.len(), 1);
        assert!(mesh.polygons[0].is_quad());
        // All four square corners present exactly once
        let mut verts: Vec<u32> =
            mesh.polygon_vertices(&mesh.polygons[0]).to_vec();
        verts.sort_unstable();
        assert_eq!(verts, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_tris_to_quads_respects_materials() {
        let mut mesh = unit_square_tris();
        mesh.polygons[1].material = 1;
        tris_to_quads(&mut mesh);
        assert_eq!(mesh.polygons.len(), 2);
    }

    #[test]
    fn test_tris_to_quads_respects_coplanarity() {
        let mut mesh = unit_square_tris();
        // Bend the square along its diagonal
        mesh.positions[3] = Vec3::new(0.0, 1.0, 0.5);
        tris_to_quads(&mut mesh);
        assert_eq!(mesh.polygons.len(), 2);
    }

    #[test]
    fn test_triangulate_round_trip() {
        let mut mesh = unit_square_tris();
        mesh.loop_uvs = Some(vec![
            Vec2::ZERO,
            Vec2::X,
            Vec2::ONE,
            Vec2::ZERO,
            Vec2::ONE,
            Vec2::Y,
        ]);
        tris_to_quads(&mut mesh);
        triangulate(&mut mesh);
        assert_eq!(mesh.polygons.len(), 2);
        assert!(mesh.polygons.iter().all(|p| p.len() == 3));
        assert_eq!(mesh.loop_uvs.as_ref().unwrap().len(), 6);
    }

    #[test]
    fn test_delete_polygons_and_loose_vertices() {
        let mut mesh = Mesh::new();
        mesh.positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(5.0, 5.0, 0.0),
            Vec3::new(6.0, 5.0, 0.0),
            Vec3::new(5.0, 6.0, 0.0),
        ];
        mesh.normals = vec![Vec3::Z; 6];
        mesh.add_polygon(&[0, 1, 2], 0);
        mesh.add_polygon(&[3, 4, 5], 0);

        delete_polygons(&mut mesh, &[false, true]);
        assert_eq!(mesh.polygons.len(), 1);
        assert_eq!(mesh.positions.len(), 6);

        delete_loose_vertices(&mut mesh);
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.normals.len(), 3);
        assert_eq!(mesh.polygon_vertices(&mesh.polygons[0]), &[0, 1, 2]);
    }
}
