//! Spinview Demo Viewer
//!
//! Opens a window and draws a single colored triangle that spins one degree
//! per frame, keeping its proportions as the window is resized.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p spinview-viewer -- [OPTIONS]
//! ```
//!
//! The shaders in `shaders/` must be compiled to SPIR-V first (see
//! `shaders/README.md`).
//!
//! ## Options
//!
//! ### Window options
//! - `--width <N>`: Initial window width (default: 800)
//! - `--height <N>`: Initial window height (default: 600)
//! - `--fixed-size`: Disable window resizing
//!
//! ### Rendering options
//! - `--vsync`: Present with FIFO instead of the mailbox/immediate preference
//! - `--validation` / `--no-validation`: Force the Vulkan validation layer on or off
//! - `--vert <PATH>`: Compiled vertex shader (default: shaders/shader.vert.spv)
//! - `--frag <PATH>`: Compiled fragment shader (default: shaders/shader.frag.spv)
//! - `--frames <N>`: Exit after N presented frames
//! - `--exit-on-error`: Return frame errors instead of aborting
//!
//! ### Other
//! - `-h, --help`: Print help message
//!
//! ## Examples
//!
//! ```bash
//! # Default window
//! cargo run -p spinview-viewer
//!
//! # Larger window with vsync
//! cargo run -p spinview-viewer -- --width 1280 --height 720 --vsync
//!
//! # Smoke run: 300 frames with validation, then exit
//! cargo run -p spinview-viewer -- --validation --frames 300
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use spinview_app::{run, AppConfig, FailurePolicy};
use spinview_core::Mesh;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Check for help flag before starting the app
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run(parse_args(&args), Mesh::triangle())
}

/// Build the app config from command line arguments.
///
/// Unknown flags and unparsable values are ignored.
fn parse_args(args: &[String]) -> AppConfig {
    let mut config = AppConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--width" => {
                if let Some(v) = value.and_then(|v| v.parse().ok()) {
                    config.width = v;
                    i += 1;
                }
            }
            "--height" => {
                if let Some(v) = value.and_then(|v| v.parse().ok()) {
                    config.height = v;
                    i += 1;
                }
            }
            "--frames" => {
                if let Some(v) = value.and_then(|v| v.parse().ok()) {
                    config.max_frames = Some(v);
                    i += 1;
                }
            }
            "--vert" => {
                if let Some(v) = value {
                    config.vertex_shader = v.into();
                    i += 1;
                }
            }
            "--frag" => {
                if let Some(v) = value {
                    config.fragment_shader = v.into();
                    i += 1;
                }
            }
            "--fixed-size" => config.resizable = false,
            "--vsync" => config.vsync = true,
            "--validation" => config.validation = true,
            "--no-validation" => config.validation = false,
            "--exit-on-error" => config.failure_policy = FailurePolicy::Exit,
            other => tracing::debug!("Ignoring argument {other}"),
        }
        i += 1;
    }

    config
}

fn print_help() {
    eprintln!(
        "Spinview Demo Viewer

USAGE:
    cargo run -p spinview-viewer -- [OPTIONS]

WINDOW OPTIONS:
    --width <N>             Initial window width (default: 800)
    --height <N>            Initial window height (default: 600)
    --fixed-size            Disable window resizing

RENDERING OPTIONS:
    --vsync                 Present with FIFO
    --validation            Enable the Vulkan validation layer
    --no-validation         Disable the Vulkan validation layer
                            Default: enabled in debug builds
    --vert <PATH>           Compiled vertex shader (default: shaders/shader.vert.spv)
    --frag <PATH>           Compiled fragment shader (default: shaders/shader.frag.spv)
    --frames <N>            Exit after N presented frames
    --exit-on-error         Return frame errors instead of aborting

OTHER:
    -h, --help              Print this help message

EXAMPLES:
    # Default window
    cargo run -p spinview-viewer

    # Larger window with vsync
    cargo run -p spinview-viewer -- --width 1280 --height 720 --vsync

    # Smoke run: 300 frames with validation, then exit
    cargo run -p spinview-viewer -- --validation --frames 300

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("spinview-viewer")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_arguments_keep_defaults() {
        let config = parse_args(&args(&[]));
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.resizable);
        assert!(!config.vsync);
        assert_eq!(config.max_frames, None);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn parses_every_flag() {
        let config = parse_args(&args(&[
            "--width",
            "1280",
            "--height",
            "720",
            "--vsync",
            "--no-validation",
            "--vert",
            "v.spv",
            "--frag",
            "f.spv",
            "--frames",
            "300",
            "--fixed-size",
            "--exit-on-error",
        ]));

        assert_eq!((config.width, config.height), (1280, 720));
        assert!(config.vsync);
        assert!(!config.validation);
        assert_eq!(config.vertex_shader, PathBuf::from("v.spv"));
        assert_eq!(config.fragment_shader, PathBuf::from("f.spv"));
        assert_eq!(config.max_frames, Some(300));
        assert!(!config.resizable);
        assert_eq!(config.failure_policy, FailurePolicy::Exit);
    }

    #[test]
    fn bad_values_are_ignored() {
        let config = parse_args(&args(&["--width", "wide", "--validation"]));
        assert_eq!(config.width, 800);
        assert!(config.validation);
    }

    #[test]
    fn missing_value_at_end_is_ignored() {
        let config = parse_args(&args(&["--frames"]));
        assert_eq!(config.max_frames, None);
    }
}
