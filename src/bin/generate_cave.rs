//! Cave generator binary: builds a cave volume, meshes it and writes a
//! snapshot that reproduces it.
//!
//! Usage: cargo run --release --bin generate_cave -- [OPTIONS]
//!
//! Options:
//!   --size <SAMPLES>  Samples per axis (default: 128)
//!   --scale <UNITS>   World extent of the volume (default: 32.0)
//!   --seed <SEED>     Random seed (default: 12345)
//!   --players <N>     Spawn points to carve, at most 8 (default: 2)
//!   --jobs <N>        Worker threads for remeshing (default: 4)
//!   --out <PATH>      Snapshot path (default: assets/caves/cave.json)

use std::path::PathBuf;
use std::time::Instant;

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use cavern::terrain::{TerrainConfig, TerrainVolume};

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let size = parse_usize_arg(&args, "--size").unwrap_or(128);
    let scale = parse_f32_arg(&args, "--scale").unwrap_or(32.0);
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let players = parse_usize_arg(&args, "--players").unwrap_or(2);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);
    let out = parse_str_arg(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/caves/cave.json"));

    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build_global()
        .expect("Failed to configure thread pool");

    println!("=== Cavern Cave Generator ===");
    println!("Size:    {}^3 samples", size);
    println!("Scale:   {}", scale);
    println!("Seed:    {}", seed);
    println!("Players: {}", players);
    println!("Jobs:    {} threads", jobs);
    println!("Output:  {}", out.display());
    println!();

    let start = Instant::now();
    let mut volume = match TerrainVolume::new([size; 3], scale, TerrainConfig::default()) {
        Ok(volume) => volume,
        Err(e) => {
            eprintln!("Invalid volume: {}", e);
            std::process::exit(1);
        }
    };

    volume.generate_cave(players, seed);
    let generated = start.elapsed();
    volume.remesh_all();
    let meshed = start.elapsed();
    let decor = volume.place_decor(&mut Pcg64Mcg::seed_from_u64(seed as u64));

    let snapshot = volume.snapshot();
    if let Err(e) = snapshot.save_sync(&out) {
        eprintln!("Failed to write {}: {}", out.display(), e);
        std::process::exit(1);
    }

    println!();
    println!("=== Generation Complete ===");
    println!("Carve:     {} structure points in {:.2}s", volume.structure_points().len(), generated.as_secs_f64());
    println!("Mesh:      {} triangles in {:.2}s", volume.triangle_count(), (meshed - generated).as_secs_f64());
    println!("Decor:     {} instances", decor);
    println!("Memory:    {:.1} MB density, {:.1} MB triangles",
        volume.density_bytes() as f64 / (1024.0 * 1024.0),
        volume.triangle_mesh_bytes() as f64 / (1024.0 * 1024.0));
    for (i, spawn) in volume.spawn_points().iter().enumerate() {
        println!("Spawn {}:   ({:.2}, {:.2}, {:.2})", i, spawn.x, spawn.y, spawn.z);
    }
    println!("Snapshot:  {}", out.display());
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
