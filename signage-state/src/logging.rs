//! Logging setup for signage-sync processes
//!
//! Unattended players usually log to stderr under a supervisor such as
//! systemd, sometimes feeding a log shipper that wants JSON lines; kiosks that
//! draw on the console want no output at all. One call picks the format.

use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Logging mode for different deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose diagnostics with source locations
    Debug,
    /// One JSON object per event
    Json,
}

impl LoggingMode {
    /// Parse a mode name as used in `SIGNAGE_LOG_MODE`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            "json" => Some(LoggingMode::Json),
            _ => None,
        }
    }

    fn default_directives(self) -> &'static str {
        match self {
            LoggingMode::Debug => "debug",
            _ => "info",
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// Call once, before the first session is started.
///
/// # Environment Variables
///
/// - `SIGNAGE_LOG_LEVEL`: filter directives (e.g. `info,signage_stream=debug`)
/// - `RUST_LOG`: used when `SIGNAGE_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_logging_with_filter(mode, None)
}

/// Initialize logging with an explicit filter that overrides the environment
pub fn init_logging_with_filter(
    mode: LoggingMode,
    directives: Option<&str>,
) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let output = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed(),
        LoggingMode::Debug => fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LoggingMode::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    Registry::default()
        .with(output)
        .with(resolve_filter(directives, mode.default_directives()))
        .try_init()
        .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize logging from `SIGNAGE_LOG_MODE`
///
/// Accepts the names [`LoggingMode::parse`] does. Defaults to Development,
/// since most players run headless.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("SIGNAGE_LOG_MODE")
        .ok()
        .as_deref()
        .and_then(LoggingMode::parse)
        .unwrap_or(LoggingMode::Development);

    init_logging(mode)
}

/// Explicit directives, then SIGNAGE_LOG_LEVEL, then RUST_LOG, then the default
fn resolve_filter(explicit: Option<&str>, fallback: &str) -> EnvFilter {
    let directives = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("SIGNAGE_LOG_LEVEL").ok())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| fallback.to_string());

    EnvFilter::new(directives)
}

/// Whether a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
