//! Check that the media tools are reachable.

use reelsplit_render_engine::media::{FfmpegMedia, MediaIo};

pub fn run() -> anyhow::Result<()> {
    println!("ReelSplit System Check");
    println!("{}", "=".repeat(50));

    for tool in ["ffmpeg", "ffprobe"] {
        match which::which(tool) {
            Ok(path) => println!("[OK] {tool}: {}", path.display()),
            Err(_) => println!("[WARN] {tool}: not found in PATH"),
        }
    }

    let config_path = reelsplit_common::config::config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[OK] Config: defaults ({} not present)", config_path.display());
    }

    println!();
    if FfmpegMedia::new().is_available() {
        println!("All required tools are available. ReelSplit is ready.");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are required; install them and make sure they are in PATH")
    }
}
