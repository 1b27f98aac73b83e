//! Binary brick geometry decoder
//!
//! Per-part `.g`, `.g1`, `.g2`… chunks: little-endian u32 magic, vertex
//! and index counts, option flags, then positions, normals, optional
//! texture coordinates, faces, optional skip blocks and an optional
//! per-vertex bone table. Any truncated read fails the whole chunk.

use crate::core::error::Error;
use crate::core::types::{Result, Vec2, Vec3};

/// Little-endian magic tag at the start of every geometry chunk.
pub const GEOMETRY_MAGIC: u32 = 1_111_961_649;

/// Both low option bits set means texture coordinates follow normals.
const OPT_UVS: u32 = 3;
/// Bits 4 and 5 set means two variable-length blocks to skip after the
/// face list.
const OPT_SKIP_BLOCKS: u32 = 48;

/// One decoded geometry chunk.
#[derive(Debug, Clone)]
pub struct GeometryChunk {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Option<Vec<Vec2>>,
    pub faces: Vec<[u32; 3]>,
    /// Per-vertex bone index, absent for unskinned geometry
    pub bone_map: Option<Vec<u32>>,
}

impl GeometryChunk {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cur = Cursor { data, offset: 0 };

        let magic = cur.read_u32()?;
        if magic != GEOMETRY_MAGIC {
            return Err(Error::Format(format!(
                "bad geometry magic {magic:#010x}"
            )));
        }

        let vertex_count = cur.read_u32()? as usize;
        let index_count = cur.read_u32()? as usize;
        if index_count % 3 != 0 {
            return Err(Error::Format(format!(
                "index count {index_count} not divisible by 3"
            )));
        }
        let face_count = index_count / 3;
        let options = cur.read_u32()?;

        let mut positions = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            positions.push(cur.read_vec3()?);
        }
        let mut normals = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            normals.push(cur.read_vec3()?);
        }

        let uvs = if options & OPT_UVS == OPT_UVS {
            let mut uvs = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                uvs.push(Vec2::new(cur.read_f32()?, cur.read_f32()?));
            }
            Some(uvs)
        } else {
            None
        };

        let mut faces = Vec::with_capacity(face_count);
        for _ in 0..face_count {
            let face = [cur.read_u32()?, cur.read_u32()?, cur.read_u32()?];
            for &v in &face {
                if v as usize >= vertex_count {
                    return Err(Error::Format(format!(
                        "face references vertex {v} of {vertex_count}"
                    )));
                }
            }
            faces.push(face);
        }

        if options & OPT_SKIP_BLOCKS == OPT_SKIP_BLOCKS {
            let n = cur.read_u32()? as usize;
            cur.skip(n * 4 + index_count * 4)?;
            let n = cur.read_u32()? as usize;
            cur.skip(3 * n * 4 + index_count * 4)?;
        }

        // A bone table is only present when its length exceeds both
        // counts; small values here belong to other trailing data and
        // mean the geometry is unskinned.
        let bone_len = cur.read_u32()? as usize;
        let bone_map = if bone_len > vertex_count || bone_len > face_count {
            let table_start = cur.offset;
            cur.skip(bone_len)?;
            let mut map = Vec::with_capacity(vertex_count);
            for _ in 0..vertex_count {
                let entry_offset = cur.read_u32()? as usize;
                map.push(cur.read_u32_at(table_start + entry_offset + 4)?);
            }
            Some(map)
        } else {
            None
        };

        Ok(Self {
            positions,
            normals,
            uvs,
            faces,
            bone_map,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn read_u32_at(&self, offset: usize) -> Result<u32> {
        let bytes = self
            .data
            .get(offset..offset + 4)
            .ok_or_else(|| Error::Format(format!("read past end at offset {offset}")))?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let v = self.read_u32_at(self.offset)?;
        self.offset += 4;
        Ok(v)
    }

    fn read_f32(&mut self) -> Result<f32> {
        let v = self.read_u32()?;
        Ok(f32::from_bits(v))
    }

    fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        if self.offset + n > self.data.len() {
            return Err(Error::Format(format!(
                "skip past end at offset {}",
                self.offset
            )));
        }
        self.offset += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// One triangle, no UVs, no bones
    fn minimal_chunk() -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, GEOMETRY_MAGIC);
        push_u32(&mut buf, 3); // vertices
        push_u32(&mut buf, 3); // indices
        push_u32(&mut buf, 0); // options
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                push_f32(&mut buf, c);
            }
        }
        for _ in 0..3 {
            for c in [0.0, 0.0, 1.0] {
                push_f32(&mut buf, c);
            }
        }
        for i in [0u32, 1, 2] {
            push_u32(&mut buf, i);
        }
        push_u32(&mut buf, 0); // bone table length: unskinned
        buf
    }

    #[test]
    fn test_decode_minimal() {
        let chunk = GeometryChunk::decode(&minimal_chunk()).unwrap();
        assert_eq!(chunk.vertex_count(), 3);
        assert_eq!(chunk.face_count(), 1);
        assert_eq!(chunk.faces[0], [0, 1, 2]);
        assert!(chunk.uvs.is_none());
        assert!(chunk.bone_map.is_none());
        assert_eq!(chunk.positions[1], Vec3::X);
        assert_eq!(chunk.normals[2], Vec3::Z);
    }

    #[test]
    fn test_decode_with_uvs() {
        let mut buf = Vec::new();
        push_u32(&mut buf, GEOMETRY_MAGIC);
        push_u32(&mut buf, 3);
        push_u32(&mut buf, 3);
        push_u32(&mut buf, 3); // UV flag bits
        for _ in 0..3 {
            for c in [0.0, 0.0, 0.0] {
                push_f32(&mut buf, c);
            }
        }
        for _ in 0..3 {
            for c in [0.0, 0.0, 1.0] {
                push_f32(&mut buf, c);
            }
        }
        for uv in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]] {
            for c in uv {
                push_f32(&mut buf, c);
            }
        }
        for i in [0u32, 1, 2] {
            push_u32(&mut buf, i);
        }
        push_u32(&mut buf, 0);

        let chunk = GeometryChunk::decode(&buf).unwrap();
        let uvs = chunk.uvs.unwrap();
        assert_eq!(uvs.len(), 3);
        assert_eq!(uvs[1], Vec2::X);
    }

    #[test]
    fn test_decode_bone_table() {
        let mut buf = minimal_chunk();
        buf.truncate(buf.len() - 4); // drop the zero bone length

        // Bone table of 8 bytes (> counts), entries resolved through
        // per-vertex offsets into the table region.
        push_u32(&mut buf, 8);
        push_u32(&mut buf, 7); // table word 0 (skipped via +4)
        push_u32(&mut buf, 1); // table word 1: bone index 1
        for _ in 0..3 {
            push_u32(&mut buf, 0); // offset 0 + 4 -> table word 1
        }

        let chunk = GeometryChunk::decode(&buf).unwrap();
        assert_eq!(chunk.bone_map, Some(vec![1, 1, 1]));
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = minimal_chunk();
        buf[0] = 0;
        assert!(matches!(
            GeometryChunk::decode(&buf),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_truncated_chunk() {
        let buf = minimal_chunk();
        assert!(matches!(
            GeometryChunk::decode(&buf[..buf.len() - 6]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_face_index_out_of_range() {
        let mut buf = minimal_chunk();
        // Last face index sits right before the bone length word
        let at = buf.len() - 8;
        buf[at..at + 4].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            GeometryChunk::decode(&buf),
            Err(Error::Format(_))
        ));
    }
}
