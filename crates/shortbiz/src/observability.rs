//! Logging setup for the CLI binary.
//!
//! Human-readable logs go to stderr. When a log destination can be resolved,
//! a JSON-lines file layer is added on top, written through a non-blocking
//! daily-rolling appender.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_PATH_ENV: &str = "SHORTBIZ_LOG_PATH";
const LOG_DIR_ENV: &str = "SHORTBIZ_LOG_DIR";
const DEFAULT_LOG_FILE: &str = "shortbiz.jsonl";

/// Where file logs go, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Directory holding the rolling log files.
    pub log_dir: Option<PathBuf>,
    /// File name prefix inside `log_dir`.
    pub file_name: String,
}

impl ObservabilityConfig {
    /// Resolve the log destination.
    ///
    /// Precedence: `SHORTBIZ_LOG_PATH`, then `SHORTBIZ_LOG_DIR`, then the
    /// configured `log_dir`, then the platform's local data dir.
    pub fn from_env_with_overrides(config_log_dir: Option<PathBuf>) -> Self {
        Self::resolve(
            std::env::var_os(LOG_PATH_ENV).map(PathBuf::from),
            std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
            config_log_dir,
            shortbiz_core::config::user_data_local_dir()
                .map(|dir| dir.join("logs").into_std_path_buf()),
        )
    }

    fn resolve(
        log_path: Option<PathBuf>,
        env_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
        platform_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = log_path.filter(|p| !p.as_os_str().is_empty()) {
            let file_name = path
                .file_name()
                .map_or_else(|| DEFAULT_LOG_FILE.into(), |n| n.to_string_lossy().into_owned());
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Self {
                log_dir: Some(dir),
                file_name,
            };
        }
        Self {
            log_dir: env_dir
                .filter(|p| !p.as_os_str().is_empty())
                .or(config_dir)
                .or(platform_dir),
            file_name: DEFAULT_LOG_FILE.into(),
        }
    }
}

/// Build the filter: `RUST_LOG` wins, then `-q`/`-v`, then the configured level.
pub fn env_filter(quiet: bool, verbose: u8, config_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(level_directive(quiet, verbose, config_level))
}

fn level_directive(quiet: bool, verbose: u8, config_level: &str) -> &str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes the file writer.
pub fn init_observability(
    config: &ObservabilityConfig,
    filter: EnvFilter,
) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match config.log_dir.as_deref().and_then(prepare_dir) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

/// File logging is best effort: an unwritable directory disables it.
fn prepare_dir(dir: &Path) -> Option<&Path> {
    std::fs::create_dir_all(dir).ok().map(|()| dir)
}
