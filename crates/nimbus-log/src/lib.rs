//! Structured logging for Nimbus.
//!
//! Library crates log through the `log` facade; binaries call [`init_logging`]
//! to install a `tracing` subscriber that also captures those records. Console
//! output is always on. A JSON file layer can be enabled for offline analysis
//! of per-frame spans.

use std::path::Path;

use nimbus_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config provide one.
pub const DEFAULT_FILTER: &str = "info,wgpu=warn,naga=warn";

/// File name of the JSON log written when file logging is enabled.
pub const LOG_FILE_NAME: &str = "nimbus.log";

/// Resolve the filter directive string from the config.
///
/// A bare level such as `"debug"` keeps wgpu and naga at `warn`; a directive
/// list containing `=` is used as-is.
pub fn filter_directives(config: Option<&Config>) -> String {
    let Some(config) = config else {
        return DEFAULT_FILTER.to_string();
    };
    let level = config.debug.log_level.trim();
    if level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else if level.contains('=') {
        level.to_string()
    } else {
        format!("{level},wgpu=warn,naga=warn")
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the config's `debug.log_level`. In debug builds with
/// a `log_dir`, a JSON layer writing to `log_dir/nimbus.log` is added; failure
/// to create the file falls back to console-only output.
///
/// Records emitted through the `log` facade are captured as well.
///
/// ```no_run
/// use nimbus_config::Config;
/// use nimbus_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, cfg!(debug_assertions), Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Default `EnvFilter`: `info` everywhere, `warn` for wgpu and naga.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter_str = format!("{}", default_env_filter());
        assert!(filter_str.contains("wgpu=warn"));
        assert!(filter_str.contains("naga=warn"));
        assert!(filter_str.contains("info"));
    }

    #[test]
    fn test_directives_without_config() {
        assert_eq!(filter_directives(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_directives_from_bare_level() {
        let mut config = Config::default();
        config.debug.log_level = "debug".to_string();
        assert_eq!(
            filter_directives(Some(&config)),
            "debug,wgpu=warn,naga=warn"
        );
    }

    #[test]
    fn test_directives_passthrough() {
        let mut config = Config::default();
        config.debug.log_level = "warn,nimbus_clouds=trace".to_string();
        assert_eq!(filter_directives(Some(&config)), "warn,nimbus_clouds=trace");
    }

    #[test]
    fn test_directives_empty_level() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directives(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_resolved_directives_parse() {
        for level in ["info", "trace", "error,nimbus_render=debug"] {
            let mut config = Config::default();
            config.debug.log_level = level.to_string();
            let directives = filter_directives(Some(&config));
            assert!(
                EnvFilter::try_new(&directives).is_ok(),
                "failed to parse {directives}"
            );
        }
    }

    #[test]
    fn test_log_file_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        assert_eq!(path.file_name().unwrap(), "nimbus.log");
    }
}
