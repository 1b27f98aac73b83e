//! Primitive metadata XML
//!
//! Per-design metadata shipped next to the geometry: the design name,
//! the bounding box, and for bendable parts the flex rest bones whose
//! inverse transforms are applied to the raw geometry at load time.

use crate::core::types::{Mat3, Mat4, Result, Vec3};

use super::xml::Element;
use crate::math::Aabb;

#[derive(Debug, Clone)]
pub struct Primitive {
    pub design_name: String,
    pub flex_bones: Vec<FlexBone>,
    pub bounding: Option<Aabb>,
}

/// One flex rest bone. The stored transform undoes the bone's rest
/// pose: rotate by the negated angle, then subtract the rotated
/// translation.
#[derive(Debug, Clone)]
pub struct FlexBone {
    pub bone_id: u32,
    pub transform: Mat4,
}

impl FlexBone {
    fn new(bone_id: u32, angle_deg: f32, axis: Vec3, translation: Vec3) -> Self {
        let rotation = Mat3::from_axis_angle(axis.normalize(), -angle_deg.to_radians());
        let offset = rotation * translation;
        let mut transform = Mat4::from_mat3(rotation);
        transform.w_axis = (-offset).extend(1.0);
        Self { bone_id, transform }
    }
}

impl Primitive {
    pub fn parse(text: &str) -> Result<Self> {
        let root = Element::parse(text)?;

        let design_name = root
            .child("Annotations")
            .and_then(|a| {
                a.children_named("Annotation")
                    .find_map(|n| n.attr("designname"))
            })
            .unwrap_or("")
            .to_string();

        let mut flex_bones = Vec::new();
        if let Some(flex) = root.child("Flex") {
            for bone in flex.children_named("Bone") {
                flex_bones.push(FlexBone::new(
                    parse_attr(bone, "boneId")? as u32,
                    parse_attr(bone, "angle")?,
                    Vec3::new(
                        parse_attr(bone, "ax")?,
                        parse_attr(bone, "ay")?,
                        parse_attr(bone, "az")?,
                    ),
                    Vec3::new(
                        parse_attr(bone, "tx")?,
                        parse_attr(bone, "ty")?,
                        parse_attr(bone, "tz")?,
                    ),
                ));
            }
        }

        let bounding = root
            .child("Bounding")
            .and_then(|b| b.child("AABB"))
            .and_then(|aabb| {
                Some(Aabb::new(
                    Vec3::new(
                        aabb.attr("minX")?.parse().ok()?,
                        aabb.attr("minY")?.parse().ok()?,
                        aabb.attr("minZ")?.parse().ok()?,
                    ),
                    Vec3::new(
                        aabb.attr("maxX")?.parse().ok()?,
                        aabb.attr("maxY")?.parse().ok()?,
                        aabb.attr("maxZ")?.parse().ok()?,
                    ),
                ))
            });

        Ok(Self {
            design_name,
            flex_bones,
            bounding,
        })
    }

    /// Longest bounding edge, used to scale brick seams
    pub fn max_bounding(&self) -> Option<f32> {
        self.bounding.map(|b| {
            let s = b.size();
            s.x.abs().max(s.y.abs()).max(s.z.abs())
        })
    }
}

fn parse_attr(node: &Element, name: &str) -> Result<f32> {
    node.req_attr(name)?.parse::<f32>().map_err(|e| {
        crate::core::error::Error::SceneParse(format!(
            "<{}> attribute '{}': {}",
            node.name, name, e
        ))
    })
}
