// CLI entry point for baking spider navigation grids.
//
// Loads a scene description (see `scene.rs`), voxelizes it, runs the full
// builder pipeline over the scene's builder volume, and writes the result
// into a directory-backed save store that `spider_nav::DirStore` (and so the
// runtime navigator) can read.
//
// Usage:
//   bake --scene <FILE> --out <DIR> [OPTIONS]
//     --scene <FILE>     Scene JSON (world, boxes, builder volume)
//     --out <DIR>        Save store directory (created if missing)
//     --config <FILE>    Build config JSON (default: built-in defaults)
//     --slot <NAME>      Save slot (default: SpiderNavGridSave)
//     --index <N>        Save index (default: 0)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use spider_nav::DirStore;
use spider_nav::config::DEFAULT_SAVE_SLOT;
use spider_nav_builder::{BuildConfig, GridBuilder, Scene};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Args {
    scene: PathBuf,
    out: PathBuf,
    config: Option<PathBuf>,
    slot: String,
    index: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("spider_nav=info,spider_nav_builder=info")),
        )
        .init();

    let args = parse_args();
    match bake(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("bake failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn bake(args: &Args) -> spider_nav_builder::Result<()> {
    let scene = Scene::load(&args.scene)?;
    let config = match &args.config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    info!(scene = ?args.scene, "loaded scene with {} boxes", scene.boxes.len());

    let store = Arc::new(DirStore::open(&args.out)?);
    let builder =
        GridBuilder::new(config, scene.volume)?.save_to(store, args.slot.clone(), args.index);
    let output = builder.run(scene.build_world())?;

    println!("{}", output.stats);
    println!(
        "Saved {} nodes to {}/{}_{}",
        output.graph.node_count(),
        args.out.display(),
        args.slot,
        args.index
    );
    Ok(())
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching,
/// no clap dependency.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut scene = None;
    let mut out = None;
    let mut config = None;
    let mut slot = DEFAULT_SAVE_SLOT.to_string();
    let mut index = 0;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--scene" => {
                i += 1;
                scene = Some(PathBuf::from(required(&args, i, "--scene")));
            }
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(required(&args, i, "--out")));
            }
            "--config" => {
                i += 1;
                config = Some(PathBuf::from(required(&args, i, "--config")));
            }
            "--slot" => {
                i += 1;
                slot = required(&args, i, "--slot").to_string();
            }
            "--index" => {
                i += 1;
                index = required(&args, i, "--index").parse().unwrap_or_else(|_| {
                    eprintln!("--index requires a non-negative number");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(scene), Some(out)) = (scene, out) else {
        eprintln!("--scene and --out are required");
        print_usage();
        std::process::exit(1);
    };
    Args {
        scene,
        out,
        config,
        slot,
        index,
    }
}

fn required<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: bake --scene <FILE> --out <DIR> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --scene <FILE>     Scene JSON (world, boxes, builder volume)");
    println!("  --out <DIR>        Save store directory (created if missing)");
    println!("  --config <FILE>    Build config JSON (default: built-in defaults)");
    println!("  --slot <NAME>      Save slot (default: {DEFAULT_SAVE_SLOT})");
    println!("  --index <N>        Save index (default: 0)");
    println!("  --help, -h         Show this help");
}
