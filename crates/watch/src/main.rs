//! `artforge-watch` -- headless progress watcher.
//!
//! Connects to the backend progress channel, logs job progress as it
//! arrives and, when asked to, bundles the output of every finished
//! generation into the export directory.
//!
//! # Environment variables
//!
//! Everything read by `SyncConfig::from_env`, plus:
//!
//! | Variable             | Required | Default | Description                               |
//! |----------------------|----------|---------|-------------------------------------------|
//! | `EXPORT_ON_COMPLETE` | no       | `false` | Bundle finished generations into `EXPORT_DIR` |
//! | `LOG_FORMAT`         | no       | `text`  | `json` for one JSON object per log line   |
//! | `RUST_LOG`           | no       | --      | Standard `EnvFilter` directives           |

use artforge_export::ExportOrchestrator;
use artforge_sync::{SyncConfig, SyncSession};
use artforge_watch::monitor::{self, Watched};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SyncConfig::from_env()?;
    let export_on_complete = std::env::var("EXPORT_ON_COMPLETE")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    tracing::info!(
        origin = %config.origin,
        channel_path = %config.channel_path,
        export_on_complete,
        export_dir = %config.export_dir.display(),
        "Starting artforge-watch",
    );

    let mut session = SyncSession::new(&config)?;
    let exporter = if export_on_complete {
        Some(ExportOrchestrator::new(
            &config.origin,
            &config.export_dir,
            config.request_timeout,
        )?)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let monitor = tokio::spawn(monitor::run(
        Watched::from_session(&session),
        exporter,
        cancel.clone(),
    ));

    session.start();
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    cancel.cancel();
    session.shutdown().await;
    monitor.await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "artforge_watch=info,artforge_sync=info,artforge_export=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
