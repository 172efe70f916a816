//! Logging Infrastructure
//!
//! Console output (pretty or JSON) filtered by `EnvFilter`. When a log
//! directory is given, two daily rolling files are added:
//! - `app/app.YYYY-MM-DD` - everything except the `security` target
//! - `security/security.YYYY-MM-DD` - only [`security_log!`](crate::security_log) events

use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::filter_fn, fmt, prelude::*};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logger (console only, `info`)
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file(None, None, None)
}

/// Initialize the logging system with optional daily rotating files
///
/// `RUST_LOG` overrides `log_level` when set.
///
/// ```no_run
/// // Development setup (console only)
/// feast_server::init_logger_with_file(Some("debug"), Some(false), None)?;
///
/// // Production setup (console + file)
/// feast_server::init_logger_with_file(Some("info"), Some(true), Some("./data/logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(
    log_level: Option<&str>,
    json: Option<bool>,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let level = log_level.unwrap_or("info");
    let json = json.unwrap_or(false);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(false).boxed()
    };
    layers.push(console);

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_dir = log_dir.join("app");
        let security_dir = log_dir.join("security");
        fs::create_dir_all(&app_dir)?;
        fs::create_dir_all(&security_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_dir, "app");
        let security_log = RollingFileAppender::new(Rotation::DAILY, security_dir, "security");
        layers.push(file_layer(app_log, json, false));
        layers.push(file_layer(security_log, json, true));
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// File layer: `security == true` keeps only the `security` target, otherwise
/// everything else.
fn file_layer(appender: RollingFileAppender, json: bool, security: bool) -> BoxedLayer {
    let filter = filter_fn(move |meta| (meta.target() == "security") == security);
    let writer = std::sync::Mutex::new(appender);
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed()
    }
}
