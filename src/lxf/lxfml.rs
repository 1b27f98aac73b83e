//! LXFML scene container
//!
//! A scene is a list of bricks, each brick a list of parts, each part
//! a material-id list and one bone transform per rigid body. Group
//! systems mark which parts belong to named groups.

use std::path::Path;

use glam::Vec4;

use crate::core::error::Error;
use crate::core::types::{Mat4, Result};

use super::xml::Element;

#[derive(Debug, Clone)]
pub struct SceneDoc {
    pub name: String,
    pub version: String,
    pub bricks: Vec<Brick>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone)]
pub struct Brick {
    pub ref_id: String,
    pub design_id: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone)]
pub struct Part {
    pub ref_id: String,
    pub design_id: String,
    /// Material ids per geometry chunk, already base-resolved
    pub materials: Vec<String>,
    /// One transform per bone; more than one marks a flex part
    pub bones: Vec<Mat4>,
    /// Group index this part belongs to, if any
    pub group: Option<usize>,
}

impl Part {
    pub fn is_flex(&self) -> bool {
        self.bones.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub part_refs: Vec<String>,
}

/// Resolve the "0" placeholder entries of a raw material list: "0"
/// always means the part's base material, the list's first entry.
pub fn resolve_materials(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|m| if m == "0" { raw[0].clone() } else { m.clone() })
        .collect()
}

/// Parse a 12-term row-major affine transform attribute: 9 rotation
/// terms then 3 translation terms.
pub fn parse_transform(text: &str) -> Result<Mat4> {
    let terms: Vec<f32> = text
        .split(',')
        .map(|t| t.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::SceneParse(format!("bad transform '{text}': {e}")))?;
    if terms.len() != 12 {
        return Err(Error::SceneParse(format!(
            "transform has {} terms, expected 12",
            terms.len()
        )));
    }
    let [a, b, c, d, e, f, g, h, i, x, y, z] = terms[..] else {
        unreachable!()
    };
    Ok(Mat4::from_cols(
        Vec4::new(a, b, c, 0.0),
        Vec4::new(d, e, f, 0.0),
        Vec4::new(g, h, i, 0.0),
        Vec4::new(x, y, z, 1.0),
    ))
}

/// Entry name of the scene document inside a zipped `.lxf` container.
const PACKED_SCENE_ENTRY: &str = "IMAGE100.LXFML";

impl SceneDoc {
    /// Load a scene from disk. `.lxf` files are zip containers holding
    /// the document as [`PACKED_SCENE_ENTRY`]; anything else is read as
    /// plain LXFML text.
    pub fn load(path: &Path) -> Result<Self> {
        let packed = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("lxf"));
        if packed {
            return Self::load_packed(path);
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn load_packed(path: &Path) -> Result<Self> {
        use std::io::Read;

        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| Error::SceneParse(format!("bad .lxf container: {e}")))?;
        let mut entry = archive.by_name(PACKED_SCENE_ENTRY).map_err(|_| {
            Error::SceneParse(format!("container has no {PACKED_SCENE_ENTRY} entry"))
        })?;
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let root = Element::parse(text)?;
        if root.name != "LXFML" {
            return Err(Error::SceneParse(format!(
                "root element is <{}>, expected <LXFML>",
                root.name
            )));
        }

        let name = root.attr("name").unwrap_or("Unknown").to_string();
        let version = root
            .child("Meta")
            .and_then(|meta| meta.child("BrickSet"))
            .and_then(|set| set.attr("version"))
            .unwrap_or("Unknown")
            .to_string();

        let mut bricks = Vec::new();
        if let Some(node) = root.child("Bricks") {
            for brick in node.children_named("Brick") {
                bricks.push(parse_brick(brick)?);
            }
        }
        // Older saves keep bricks as groups under <Scene><Model>
        if let Some(model) = root.child("Scene").and_then(|s| s.child("Model")) {
            for group in model.children_named("Group") {
                bricks.push(parse_brick(group)?);
            }
        }

        let mut groups = Vec::new();
        if let Some(systems) = root.child("GroupSystems") {
            for system in systems.children_named("GroupSystem") {
                for group in system.children_named("Group") {
                    let part_refs = group
                        .attr("partRefs")
                        .unwrap_or("")
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    groups.push(Group { part_refs });
                }
            }
        }

        let mut doc = Self {
            name,
            version,
            bricks,
            groups,
        };
        doc.mark_grouped_parts();
        Ok(doc)
    }

    fn mark_grouped_parts(&mut self) {
        for (gi, group) in self.groups.iter().enumerate() {
            for brick in &mut self.bricks {
                for part in &mut brick.parts {
                    if group.part_refs.iter().any(|r| r == &part.ref_id) {
                        part.group = Some(gi);
                    }
                }
            }
        }
    }

    pub fn part_count(&self) -> usize {
        self.bricks.iter().map(|b| b.parts.len()).sum()
    }
}

fn parse_brick(node: &Element) -> Result<Brick> {
    let mut parts = Vec::new();
    for part in node.children_named("Part") {
        parts.push(parse_part(part)?);
    }
    Ok(Brick {
        ref_id: node.attr("refID").unwrap_or("").to_string(),
        design_id: node.attr("designID").unwrap_or("").to_string(),
        parts,
    })
}

fn parse_part(node: &Element) -> Result<Part> {
    let ref_id = node.attr("refID").unwrap_or("").to_string();
    let design_id = node.req_attr("designID")?.to_string();

    let (materials, bones) = if let Some(list) = node.attr("materials") {
        let raw: Vec<String> = list.split(',').map(str::to_string).collect();
        let mut bones = Vec::new();
        for bone in node.children_named("Bone") {
            bones.push(parse_bone_transform(bone)?);
        }
        if bones.is_empty() {
            return Err(Error::SceneParse(format!("part {ref_id} has no bones")));
        }
        (resolve_materials(&raw), bones)
    } else if let Some(material_id) = node.attr("materialID") {
        // Single-material legacy parts carry their transform directly
        (
            vec![material_id.to_string()],
            vec![parse_bone_transform(node)?],
        )
    } else {
        return Err(Error::SceneParse(format!(
            "part {ref_id} has neither materials nor materialID"
        )));
    };

    Ok(Part {
        ref_id,
        design_id,
        materials,
        bones,
        group: None,
    })
}

fn parse_bone_transform(node: &Element) -> Result<Mat4> {
    if let Some(text) = node.attr("transformation") {
        parse_transform(text)
    } else if node.attr("angle").is_some() {
        Err(Error::SceneParse(
            "angle/axis bone transforms from old save formats are not supported".into(),
        ))
    } else {
        Err(Error::SceneParse(format!(
            "bone {} has no transformation",
            node.attr("refID").unwrap_or("?")
        )))
    }
}
