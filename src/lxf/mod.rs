//! LXF scene importer
//!
//! Decodes the binary brick geometry format, parses LXFML scene
//! containers and primitive metadata, and reads brick databases in
//! both unpacked-folder and packed-archive form.

pub mod xml;
pub mod geometry;
pub mod lxfml;
pub mod primitive;
pub mod db;
pub mod skinning;

pub use geometry::GeometryChunk;
pub use lxfml::SceneDoc;
pub use primitive::Primitive;
pub use db::BrickDb;
