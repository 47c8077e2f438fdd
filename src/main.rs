//! # Voxel World Demo
//!
//! Headless entry point: streams terrain around an observer walking along +x and logs what the
//! streamer did.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json] [ticks]
//! ```

use log::{error, info};
use voxel_world::StreamingConfig;

fn main() {
    voxel_world::init_logger();
    info!("Logger initialized");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match StreamingConfig::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                error!("Could not load config from {path}: {err}");
                std::process::exit(1);
            }
        },
        None => StreamingConfig::default(),
    };
    let ticks = args.next().and_then(|t| t.parse().ok()).unwrap_or(1_000);

    if let Err(err) = voxel_world::run(config, ticks, 0.5) {
        error!("Streaming demo failed: {err}");
        std::process::exit(1);
    }
}
