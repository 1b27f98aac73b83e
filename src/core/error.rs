//! Error types for the brickforge pipeline

use thiserror::Error;

/// Main error type for the pipeline.
///
/// Fatal errors are scoped to one unit of work (one geometry chunk, one
/// part, one HSR run on one object). Callers skip the failed unit and
/// continue with the rest of the batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Corrupt or unexpected binary geometry layout. The whole chunk is
    /// unusable, there is no partial-result recovery.
    #[error("geometry format error: {0}")]
    Format(String),

    /// Scene container or primitive metadata XML could not be parsed.
    #[error("scene parse error: {0}")]
    SceneParse(String),

    /// A polygon with more than 4 vertices where only tris and quads
    /// are allowed.
    #[error("invalid topology: polygon {polygon} has {vertex_count} vertices, tris/quads only")]
    InvalidTopology { polygon: usize, vertex_count: usize },

    /// A referenced design id, material or primitive is missing from
    /// the brick database. The brick or part is skipped with a warning.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// The bake renderer refused this object. The object's bake is
    /// skipped, processing continues.
    #[error("renderer error: {0}")]
    RendererTransient(String),

    /// A vertex references a bone index outside the supplied bone list.
    /// Treated as corrupt data, no silent fallback.
    #[error("corrupt bone reference: vertex {vertex} references bone {bone} of {bone_count}")]
    CorruptBoneReference { vertex: usize, bone: usize, bone_count: usize },

    /// Recursive mesh division produced a degenerate split.
    #[error("mesh division rate {rate} below minimum {min_rate}")]
    DivisionRateTooLow { rate: f32, min_rate: f32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
