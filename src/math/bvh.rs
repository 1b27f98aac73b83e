//! Bounding volume hierarchy over a triangle soup
//!
//! Built once per occluder set and queried with any-hit rays by the
//! occlusion baker. Uses a binned surface-area-heuristic split.

use crate::core::types::Vec3;
use super::aabb::Aabb;
use super::ray::Ray;

const BINS: usize = 16;
const LEAF_SIZE: u32 = 4;

#[derive(Clone, Copy, Debug)]
struct Node {
    aabb: Aabb,
    /// Child node index for interior nodes, first triangle for leaves
    left_first: u32,
    /// 0 for interior nodes
    tri_count: u32,
}

#[derive(Clone, Copy, Default)]
struct Bin {
    bounds: Aabb,
    count: u32,
}

/// Static BVH over triangles given as flat vertex triples.
pub struct Bvh {
    nodes: Vec<Node>,
    /// Triangle order after partitioning, indexes into `triangles`
    tri_order: Vec<u32>,
    triangles: Vec<[Vec3; 3]>,
}

impl Bvh {
    /// Build from a triangle list. An empty list yields a BVH that
    /// reports no hits.
    pub fn build(triangles: Vec<[Vec3; 3]>) -> Self {
        let tri_count = triangles.len();

        let mut tri_aabbs = Vec::with_capacity(tri_count);
        let mut tri_centers = Vec::with_capacity(tri_count);
        for tri in &triangles {
            let min = tri[0].min(tri[1]).min(tri[2]);
            let max = tri[0].max(tri[1]).max(tri[2]);

            // Pad degenerate axes so flat triangles still get volume
            let eps = 1e-5;
            let size = max - min;
            let pad = Vec3::new(
                if size.x < eps { eps } else { 0.0 },
                if size.y < eps { eps } else { 0.0 },
                if size.z < eps { eps } else { 0.0 },
            );
            let aabb = Aabb::new(min - pad * 0.5, max + pad * 0.5);
            tri_centers.push(aabb.center());
            tri_aabbs.push(aabb);
        }

        let mut bvh = Self {
            nodes: Vec::new(),
            tri_order: (0..tri_count as u32).collect(),
            triangles,
        };

        if tri_count == 0 {
            bvh.nodes.push(Node {
                aabb: Aabb::empty(),
                left_first: 0,
                tri_count: 0,
            });
            return bvh;
        }

        bvh.nodes.push(Node {
            aabb: Aabb::empty(),
            left_first: 0,
            tri_count: tri_count as u32,
        });
        bvh.update_bounds(0, &tri_aabbs);
        bvh.subdivide(0, &tri_aabbs, &tri_centers);
        bvh
    }

    /// Any-hit occlusion query: does any triangle block the ray within
    /// [0, max_t]?
    pub fn occluded(&self, ray: &Ray, max_t: f32) -> bool {
        // The empty root is stored with tri_count 0, which otherwise
        // reads as an interior node
        if self.triangles.is_empty() {
            return false;
        }
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            let Some((t_near, _)) = ray.intersects_aabb(&node.aabb) else {
                continue;
            };
            if t_near > max_t {
                continue;
            }

            if node.tri_count > 0 {
                for i in 0..node.tri_count {
                    let tri_id = self.tri_order[(node.left_first + i) as usize] as usize;
                    let tri = &self.triangles[tri_id];
                    if let Some(t) = ray.intersects_triangle(tri[0], tri[1], tri[2]) {
                        if t <= max_t {
                            return true;
                        }
                    }
                }
            } else {
                stack.push(node.left_first as usize);
                stack.push(node.left_first as usize + 1);
            }
        }
        false
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    fn update_bounds(&mut self, node_idx: usize, tri_aabbs: &[Aabb]) {
        let node = self.nodes[node_idx];
        let mut aabb = Aabb::empty();
        for i in 0..node.tri_count {
            let tri_id = self.tri_order[(node.left_first + i) as usize] as usize;
            aabb = aabb.merged(&tri_aabbs[tri_id]);
        }
        self.nodes[node_idx].aabb = aabb;
    }

    fn subdivide(&mut self, node_idx: usize, tri_aabbs: &[Aabb], tri_centers: &[Vec3]) {
        let node = self.nodes[node_idx];
        if node.tri_count <= LEAF_SIZE {
            return;
        }

        let axis = node.aabb.longest_axis();
        let split_min = node.aabb.min[axis];
        let split_len = node.aabb.size()[axis];
        if split_len < 1e-6 {
            return;
        }

        let first = node.left_first as usize;
        let count = node.tri_count as usize;
        let scale = BINS as f32 / split_len;
        let bin_of = |pos: f32| (((pos - split_min) * scale) as usize).min(BINS - 1);

        let mut bins = [Bin::default(); BINS];
        for i in 0..count {
            let tri_id = self.tri_order[first + i] as usize;
            let bin = bin_of(tri_centers[tri_id][axis]);
            bins[bin].count += 1;
            bins[bin].bounds = bins[bin].bounds.merged(&tri_aabbs[tri_id]);
        }

        // Prefix/suffix sweeps for the SAH cost of every split plane
        let mut left_area = [0.0f32; BINS];
        let mut left_count = [0u32; BINS];
        let mut acc = Aabb::empty();
        let mut sum = 0;
        for i in 0..BINS {
            sum += bins[i].count;
            acc = acc.merged(&bins[i].bounds);
            left_area[i] = acc.area();
            left_count[i] = sum;
        }

        let mut right_area = [0.0f32; BINS];
        let mut right_count = [0u32; BINS];
        acc = Aabb::empty();
        sum = 0;
        for i in (0..BINS).rev() {
            sum += bins[i].count;
            acc = acc.merged(&bins[i].bounds);
            right_area[i] = acc.area();
            right_count[i] = sum;
        }

        let mut best_cost = f32::INFINITY;
        let mut best_split = usize::MAX;
        for i in 0..BINS - 1 {
            if left_count[i] == 0 || right_count[i + 1] == 0 {
                continue;
            }
            let cost = left_area[i] * left_count[i] as f32
                + right_area[i + 1] * right_count[i + 1] as f32;
            if cost < best_cost {
                best_cost = cost;
                best_split = i;
            }
        }
        if best_split == usize::MAX {
            return;
        }

        // Partition triangle order around the chosen plane
        let mut i = first;
        let mut j = first + count;
        while i < j {
            let tri_id = self.tri_order[i] as usize;
            if bin_of(tri_centers[tri_id][axis]) <= best_split {
                i += 1;
            } else {
                j -= 1;
                self.tri_order.swap(i, j);
            }
        }

        let left_len = i - first;
        if left_len == 0 || left_len == count {
            return;
        }

        let left_child = self.nodes.len();
        self.nodes.push(Node {
            aabb: Aabb::empty(),
            left_first: first as u32,
            tri_count: left_len as u32,
        });
        self.nodes.push(Node {
            aabb: Aabb::empty(),
            left_first: i as u32,
            tri_count: (count - left_len) as u32,
        });
        self.nodes[node_idx].left_first = left_child as u32;
        self.nodes[node_idx].tri_count = 0;

        self.update_bounds(left_child, tri_aabbs);
        self.update_bounds(left_child + 1, tri_aabbs);
        self.subdivide(left_child, tri_aabbs, tri_centers);
        self.subdivide(left_child + 1, tri_aabbs, tri_centers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_at_z(z: f32) -> Vec<[Vec3; 3]> {
        vec![
            [
                Vec3::new(-1.0, -1.0, z),
                Vec3::new(1.0, -1.0, z),
                Vec3::new(1.0, 1.0, z),
            ],
            [
                Vec3::new(-1.0, -1.0, z),
                Vec3::new(1.0, 1.0, z),
                Vec3::new(-1.0, 1.0, z),
            ],
        ]
    }

    #[test]
    fn test_empty_bvh_no_hits() {
        let bvh = Bvh::build(Vec::new());
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(!bvh.occluded(&ray, f32::INFINITY));
    }

    #[test]
    fn test_occluded_by_plane() {
        let bvh = Bvh::build(quad_at_z(2.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(bvh.occluded(&ray, f32::INFINITY));
        // Behind the plane, looking away
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Z);
        assert!(!bvh.occluded(&ray, f32::INFINITY));
    }

    #[test]
    fn test_max_t_limits_hit() {
        let bvh = Bvh::build(quad_at_z(10.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(!bvh.occluded(&ray, 5.0));
        assert!(bvh.occluded(&ray, 15.0));
    }

    #[test]
    fn test_many_triangles_partitioned() {
        let mut tris = Vec::new();
        for i in 0..64 {
            tris.extend(quad_at_z(i as f32 + 1.0));
        }
        let bvh = Bvh::build(tris);
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z);
        assert!(bvh.occluded(&ray, f32::INFINITY));
        let ray = Ray::new(Vec3::new(5.0, 5.0, 0.0), Vec3::Z);
        assert!(!bvh.occluded(&ray, f32::INFINITY));
    }
}
