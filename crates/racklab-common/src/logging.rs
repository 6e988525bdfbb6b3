//! ---
//! rl_section: "01-core-runtime"
//! rl_subsection: "module"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Shared primitives and utilities for the harness runtime."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "RACKLAB_LOG";

/// Non-blocking writer guards, parked for the lifetime of the process.
/// racklabd initialises logging exactly once, so one cell covers both sinks.
struct LoggingGuards {
    _stdout: WorkerGuard,
    _file: WorkerGuard,
}

static GUARDS: OnceCell<LoggingGuards> = OnceCell::new();

/// Available log formats for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Resolve the active filter: `RACKLAB_LOG` wins, then `RUST_LOG`, then
/// `info`. An unparsable directive is reported and skipped rather than
/// silently replacing the fallback chain.
fn env_filter() -> EnvFilter {
    for source in [LOG_ENV, "RUST_LOG"] {
        if let Ok(directive) = std::env::var(source) {
            match EnvFilter::try_new(&directive) {
                Ok(filter) => return filter,
                Err(err) => eprintln!("ignoring invalid {source} directive ({err})"),
            }
        }
    }
    EnvFilter::new("info")
}

/// Install the global subscriber: stdout in the configured format plus a
/// rolling daily JSON file under the logging directory, both behind
/// [`env_filter`]. Calling this twice is harmless; the second install is a
/// no-op and its writer guards are dropped.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;

    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let (file_writer, file_guard) = tracing_appender::non_blocking(rolling::daily(
        &config.directory,
        format!("{prefix}.log"),
    ));

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
    };
    let file_layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        let _ = GUARDS.set(LoggingGuards {
            _stdout: stdout_guard,
            _file: file_guard,
        });
        info!(
            service = %service_name,
            log_dir = %config.directory.display(),
            format = ?config.format,
            "tracing initialised"
        );
    }
    Ok(())
}
