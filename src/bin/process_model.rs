//! Model processor binary: assembles an LXFML model against a brick
//! database and runs the content pipeline over it.
//!
//! Usage: cargo run --release --bin process_model -- [OPTIONS]
//!
//! Options:
//!   --lxfml <FILE>      Input model (required)
//!   --db <PATH>         Brick database folder or .lif archive (required)
//!   --config <FILE>     Pipeline config JSON (default: built-in defaults)
//!   --materials <FILE>  Material color override JSON
//!   --report <FILE>     Write a scene report JSON
//!   --bake-lighting     Bake vertex lighting after processing
//!   --samples <N>       Lighting bake samples (default: 256)

use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;

use brickforge::assemble::SceneAssembler;
use brickforge::core::logging;
use brickforge::lxf::{BrickDb, SceneDoc};
use brickforge::materials::{MaterialOverrides, MaterialTable};
use brickforge::pipeline::lighting::{bake_lighting, LightingConfig};
use brickforge::pipeline::{ProcessConfig, Processor};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(lxfml) = parse_str_arg(&args, "--lxfml") else {
        usage_exit("missing --lxfml <FILE>");
    };
    let Some(db_path) = parse_str_arg(&args, "--db") else {
        usage_exit("missing --db <PATH>");
    };
    let config_path = parse_str_arg(&args, "--config");
    let materials_path = parse_str_arg(&args, "--materials");
    let report_path = parse_str_arg(&args, "--report");
    let do_lighting = args.iter().any(|a| a == "--bake-lighting");
    let samples = parse_u32_arg(&args, "--samples").unwrap_or(256);

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path).expect("Failed to read config");
            ProcessConfig::from_json(&text).expect("Failed to parse config")
        }
        None => ProcessConfig::default(),
    };
    let overrides = match materials_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path).expect("Failed to read material overrides");
            MaterialOverrides::from_json(&text).expect("Failed to parse material overrides")
        }
        None => MaterialOverrides::default(),
    };
    let table = MaterialTable::new(overrides);

    println!("=== Brickforge Model Processor ===");
    println!("Model: {}", lxfml);
    println!("DB:    {}", db_path);
    println!();

    let start = Instant::now();
    let doc = SceneDoc::load(&PathBuf::from(&lxfml)).expect("Failed to load model");
    let db = BrickDb::open(&PathBuf::from(&db_path)).expect("Failed to open brick database");

    let mut assembler = SceneAssembler::new(&db);
    let mut scene = assembler.build(&doc).expect("Failed to assemble scene");
    let stats = assembler.stats();
    println!(
        "Assembled: {} parts ({} skipped), {} designs decoded",
        stats.parts_built, stats.parts_skipped, stats.designs_decoded
    );

    let mut processor = Processor::new(config, brickforge::hsr::CpuBaker::new());
    processor
        .run(&mut scene, &table)
        .expect("Failed to process scene");

    if do_lighting {
        let lighting = LightingConfig {
            samples,
            ..Default::default()
        };
        bake_lighting(&mut scene, &mut brickforge::hsr::CpuBaker::new(), &lighting)
            .expect("Failed to bake lighting");
    }

    if let Some(path) = report_path {
        let report = json!({
            "name": scene.name,
            "objects": scene.objects.iter().map(|o| json!({
                "name": o.name,
                "lod": o.lod.index(),
                "transparent": o.attributes.transparent,
                "polygons": o.mesh.polygons.len(),
                "vertices": o.mesh.positions.len(),
                "near_extent": o.attributes.near_extent,
                "far_extent": o.attributes.far_extent,
            })).collect::<Vec<_>>(),
            "nodes": scene.nodes.iter().map(|n| json!({
                "name": n.name,
                "type": n.node_type,
            })).collect::<Vec<_>>(),
            "warnings": scene.warnings,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&report).unwrap())
            .expect("Failed to write report");
        println!("Report: {}", path);
    }

    println!();
    println!("=== Processing Complete ===");
    println!("Objects: {}", scene.objects.len());
    println!("Nodes:   {}", scene.nodes.len());
    println!(
        "Faces:   {}",
        scene
            .objects
            .iter()
            .map(|o| o.mesh.polygons.len())
            .sum::<usize>()
    );
    println!("Time:    {:.2}s", start.elapsed().as_secs_f64());
    if !scene.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", scene.warnings.len());
        for warning in &scene.warnings {
            println!("  {}", warning);
        }
    }
}

fn usage_exit(message: &str) -> ! {
    eprintln!("error: {message}");
    eprintln!("usage: process_model --lxfml <FILE> --db <PATH> [--config <FILE>] [--materials <FILE>] [--report <FILE>] [--bake-lighting] [--samples <N>]");
    std::process::exit(2);
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.clone())
}
