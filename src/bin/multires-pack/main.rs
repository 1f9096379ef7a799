//! multires-pack - pack device-ready grid levels into one multi-resolution file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use render_bridge::volume::{DeviceGridView, MultiResGrid, MultiResWriter};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("multires-pack");

    let mut level = "info";
    let mut paths: Vec<&str> = Vec::new();
    for arg in &args[1.min(args.len())..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "-h" | "--help" => {
                print_usage(program);
                return;
            }
            other => paths.push(other),
        }
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if paths.len() < 2 {
        print_usage(program);
        std::process::exit(1);
    }
    let out = PathBuf::from(paths[0]);
    let levels: Vec<PathBuf> = paths[1..].iter().map(PathBuf::from).collect();

    if let Err(e) = pack(&out, &levels) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage(prog: &str) {
    println!("multires-pack - build a multi-resolution grid container");
    println!();
    println!("Usage: {} [options] <out> <level0> [level1 ...]", prog);
    println!();
    println!("Levels are device-ready grid files, finest first.");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output");
    println!("  -q, --quiet    Errors only");
    println!("  -h, --help     Show this help");
}

fn pack(out: &Path, levels: &[PathBuf]) -> anyhow::Result<()> {
    let mut writer = MultiResWriter::new();
    for path in levels {
        let bytes = std::fs::read(path).with_context(|| format!("reading level {}", path.display()))?;
        match DeviceGridView::parse(&bytes) {
            Ok(view) => tracing::debug!(level = %path.display(), dims = ?view.dims, "level"),
            Err(e) => tracing::warn!(level = %path.display(), error = %e, "not a device grid, packed as-is"),
        }
        writer.push_level(bytes);
    }

    let packed = writer.finish();
    // Read back to validate the layout.
    let check = MultiResGrid::from_bytes(packed.clone()).context("validating packed container")?;
    anyhow::ensure!(check.level_count() == levels.len(), "packed {} levels, read back {}", levels.len(), check.level_count());

    std::fs::write(out, &packed).with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(out = %out.display(), levels = levels.len(), bytes = packed.len(), "packed");
    Ok(())
}
