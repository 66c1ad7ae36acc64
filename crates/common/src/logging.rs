// Storyline - Script Execution Story Builder
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Tracing subscriber setup shared by the Storyline binaries and tests.
//!
//! Console output always goes to stderr, since stdout carries instrumented
//! programs and story messages. `RUST_LOG` overrides every default level.

use eyre::Result;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Once,
};
use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::LocalTime},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Directory under the system temp folder holding the rolling log files.
const LOG_DIR_NAME: &str = "storyline-logs";

/// Level used when `RUST_LOG` is unset and nothing else is asked for.
const DEFAULT_CONSOLE_LEVEL: &str = "warn";

/// Level of the log file when `RUST_LOG` is unset.
const DEFAULT_FILE_LEVEL: &str = "debug";

/// Installs the global subscriber for `component_name`.
///
/// Console events at WARN and above are printed to stderr. With
/// `enable_file_logging`, events are also appended to a daily-rolling
/// `<component>.log` under `$TMPDIR/storyline-logs/<component>/`, at DEBUG.
///
/// Fails if a global subscriber is already installed.
///
/// ```rust,no_run
/// use storyline_common::logging;
///
/// fn main() -> eyre::Result<()> {
///     logging::init_logging("storyline", false)?;
///     tracing::warn!("budget is low");
///     Ok(())
/// }
/// ```
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_CONSOLE_LEVEL))
        .map_err(|e| eyre::eyre!("invalid log filter: {e}"))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(true)
        .with_writer(io::stderr);

    let log_dir =
        if enable_file_logging { Some(create_log_directory(component_name)?) } else { None };
    let file = log_dir.as_ref().map(|dir| file_layer(dir, component_name));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("cannot install tracing subscriber: {e}"))?;

    match &log_dir {
        Some(dir) => tracing::info!(
            component = component_name,
            log_dir = %dir.display(),
            "logging to console and file"
        ),
        None => tracing::info!(component = component_name, "logging to console"),
    }
    tracing::debug!(
        component = component_name,
        rust_log = %env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_CONSOLE_LEVEL.to_string()),
        args = ?env::args().collect::<Vec<_>>(),
        "process started"
    );

    Ok(())
}

/// Layer appending plain-text events to the component's rolling log file.
fn file_layer<S>(log_dir: &Path, component_name: &str) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let appender = rolling::daily(log_dir, format!("{component_name}.log"));
    let (writer, guard) = non_blocking(appender);
    // Flushing happens on drop and the subscriber lives until exit.
    std::mem::forget(guard);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_LEVEL));
    fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter)
}

fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join(LOG_DIR_NAME).join(component_name);
    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Installs a compact stderr subscriber at `level` (or `RUST_LOG`).
pub fn init_simple_logging(level: Level) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .map_err(|e| eyre::eyre!("invalid log filter: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|e| eyre::eyre!("cannot install tracing subscriber: {e}"))?;

    Ok(())
}

static TEST_LOGGING_INIT: Once = Once::new();

/// Installs test logging once per process; later calls do nothing.
///
/// The level defaults to INFO.
///
/// ```rust
/// storyline_common::logging::ensure_test_logging(None);
/// tracing::info!("visible under --nocapture");
/// ```
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        // Another subscriber may already be installed.
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_events_after_test_logging() {
        ensure_test_logging(None);
        ensure_test_logging(Some(Level::DEBUG));

        info!(run = 1, "run started");
        warn!(limit = 10, "event budget exceeded");
        debug!("reducer state dumped");
        error!(index = 3, "reduction failed");
    }

    #[test]
    fn test_log_directory_is_per_component() {
        let log_dir = create_log_directory("storyline-test").unwrap();
        assert!(log_dir.is_dir());
        assert!(log_dir.ends_with(PathBuf::from(LOG_DIR_NAME).join("storyline-test")));
    }

    #[test]
    fn test_second_subscriber_is_rejected() {
        ensure_test_logging(None);

        assert!(init_logging("storyline-test", false).is_err());
        assert!(init_simple_logging(Level::DEBUG).is_err());
    }
}
