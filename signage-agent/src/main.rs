use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use signage_model::DisplaySlug;
use signage_state::logging::{self, LoggingMode};
use signage_state::{
    DisplaySession, FileSnapshotStore, MemorySnapshotStore, SessionConfig, SnapshotStore,
};
use signage_stream::{HttpStateSource, StreamConfig, WsConnector};
use tokio_util::sync::CancellationToken;

mod presenter;

use presenter::Presenter;

/// Signage display agent
///
/// Keeps one display in step with the signage server: receives pushed
/// playlist updates, falls back to polling when the push channel is down,
/// and plays the playlist on dwell timers.
#[derive(Parser, Debug)]
#[command(name = "signage-agent")]
#[command(about = "Headless signage-sync client for a single display")]
#[command(version)]
pub struct Args {
    /// Slug of the display to drive
    #[arg(short, long, env = "SIGNAGE_DISPLAY")]
    pub display: String,

    /// Base URL of the state API
    #[arg(long, env = "SIGNAGE_SERVER_URL", default_value = "http://localhost:3000")]
    pub server_url: String,

    /// URL of the push channel
    #[arg(long, env = "SIGNAGE_PUSH_URL", default_value = "ws://localhost:3000/ws")]
    pub push_url: String,

    /// Fallback poll interval in seconds
    #[arg(long, env = "SIGNAGE_POLL_INTERVAL", default_value = "15")]
    pub poll_interval: u64,

    /// Snapshot cache directory; the platform cache directory when omitted
    #[arg(long, env = "SIGNAGE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep snapshots in memory only
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,

    /// Force the device class instead of detecting it (true or false)
    #[arg(long, env = "SIGNAGE_LOW_POWER")]
    pub low_power: Option<bool>,

    /// Wait for a play command instead of starting playback on load
    #[arg(long)]
    pub no_autoplay: bool,

    /// Logging mode (silent, development, debug, json)
    #[arg(long, env = "SIGNAGE_LOG_MODE", default_value = "development", value_parser = parse_log_mode)]
    pub log_mode: LoggingMode,

    /// Log filter directives, e.g. `info,signage_stream=debug`
    #[arg(long, env = "SIGNAGE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

fn parse_log_mode(name: &str) -> Result<LoggingMode, String> {
    LoggingMode::parse(name)
        .ok_or_else(|| format!("unknown logging mode '{name}' (silent, development, debug, json)"))
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if !DisplaySlug::new(&self.display).is_valid() {
            anyhow::bail!("Invalid display slug '{}'", self.display);
        }
        if self.poll_interval == 0 {
            anyhow::bail!("Poll interval must be positive");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let stream = StreamConfig::default()
            .with_server_url(self.server_url.as_str())
            .with_push_url(self.push_url.as_str())
            .with_poll_interval(Duration::from_secs(self.poll_interval));

        SessionConfig::new(self.display.as_str())
            .with_stream(stream)
            .with_autoplay(!self.no_autoplay)
            .with_low_power(self.low_power)
    }

    fn snapshot_store(&self) -> Result<Arc<dyn SnapshotStore>> {
        if self.no_cache {
            return Ok(Arc::new(MemorySnapshotStore::new()));
        }
        let store = match &self.cache_dir {
            Some(dir) => FileSnapshotStore::new(dir),
            None => FileSnapshotStore::in_default_location(),
        }
        .context("Failed to open snapshot cache")?;
        info!("Caching snapshots in {}", store.dir().display());
        Ok(Arc::new(store))
    }
}

/// Run one display session until ctrl-c or until the session stops
async fn run(args: Args) -> Result<()> {
    let config = args.session_config();
    config.validate().context("Invalid session configuration")?;

    let connector = Arc::new(
        WsConnector::new(config.stream.push_url.clone()).context("Invalid push URL")?,
    );
    let source = Arc::new(
        HttpStateSource::new(config.stream.server_url.clone(), config.stream.request_timeout)
            .context("Invalid server URL")?,
    );
    let store = args.snapshot_store()?;

    info!(
        "Starting display {} against {} (push {})",
        config.slug, config.stream.server_url, config.stream.push_url
    );

    let (handle, mut updates) =
        DisplaySession::spawn(config, connector, source, store, CancellationToken::new());
    let mut presenter = Presenter::default();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for ctrl-c: {}", e);
                }
                info!("Shutting down");
                break;
            }
            update = updates.recv() => match update {
                Some(update) => presenter.show(&update),
                None => {
                    warn!("Display session stopped unexpectedly");
                    break;
                }
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    logging::init_logging_with_filter(args.log_mode, args.log_level.as_deref())
        .context("Failed to initialize logging")?;

    if let Err(e) = run(args).await {
        error!("Agent failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
