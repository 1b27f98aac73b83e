//! Brickforge - A brick model content pipeline

pub mod core;
pub mod math;
pub mod mesh;
pub mod lxf;
pub mod materials;
pub mod scene;
pub mod assemble;
pub mod hsr;
pub mod pipeline;
