//! Configuration system for Nimbus.
//!
//! Settings persist to disk as RON files, can be overridden from the command
//! line via clap, and support hot-reload detection.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, CloudConfig, CloudLayerConfig, Config, DebugConfig, LightMapConfig,
    WindowConfig,
};
pub use error::ConfigError;
