//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Nimbus command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nimbus", about = "Temporally amortized volumetric cloud renderer")]
pub struct CliArgs {
    /// View width.
    #[arg(long)]
    pub width: Option<u32>,

    /// View height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Resolution mode (0, 1, 2).
    #[arg(long)]
    pub mode: Option<u32>,

    /// Upsampling kernel (0..=4).
    #[arg(long)]
    pub upsampling_mode: Option<u32>,

    /// Temporal reconstruction factor (0..=1).
    #[arg(long)]
    pub temporal_factor: Option<f32>,

    /// Number of frames to render.
    #[arg(long, default_value_t = 16)]
    pub frames: u32,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(mode) = args.mode {
            self.clouds.mode = mode;
        }
        if let Some(upsampling) = args.upsampling_mode {
            self.clouds.upsampling_mode = upsampling;
        }
        if let Some(factor) = args.temporal_factor {
            self.clouds.temporal_factor = factor;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1280),
            mode: Some(2),
            log_level: Some("trace".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.clouds.mode, 2);
        assert_eq!(config.debug.log_level, "trace");
        // Non-overridden fields retain defaults
        assert_eq!(config.window.height, 1080);
        assert_eq!(config.clouds.upsampling_mode, 4);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from([
            "nimbus",
            "--width",
            "640",
            "--upsampling-mode",
            "2",
            "--frames",
            "4",
        ]);
        assert_eq!(args.width, Some(640));
        assert_eq!(args.upsampling_mode, Some(2));
        assert_eq!(args.frames, 4);
        assert!(args.height.is_none());
    }

    #[test]
    fn test_cli_frames_default() {
        let args = CliArgs::parse_from(["nimbus"]);
        assert_eq!(args.frames, 16);
    }
}
