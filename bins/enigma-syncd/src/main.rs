mod config;

use async_trait::async_trait;
use config::SyncdConfig;
use enigma_sync::contacts::{InMemoryContactStore, InMemoryDeviceLinks};
use enigma_sync::error::SyncError;
use enigma_sync::event::EventReceiver;
use enigma_sync::feeds::{InMemoryFeedRegistry, InMemoryFeedServer};
use enigma_sync::inbox::{DeliveryPipeline, InMemorySwarm, RawMessage};
use enigma_sync::jobs::InMemoryJobQueue;
use enigma_sync::prefs::{FilePreferences, StoredPreferences};
use enigma_sync::time::SystemClock;
use enigma_sync::{SyncCollaborators, SyncEngine};
use log::{debug, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const PREFS_NAMESPACE: &str = "syncd";

#[derive(thiserror::Error, Debug)]
enum DaemonError {
    #[error("config")]
    Config,
    #[error("sync")]
    Sync,
}

/// Hands fetched envelopes to the log until a decoder is wired in.
struct LoggingPipeline;

#[async_trait]
impl DeliveryPipeline for LoggingPipeline {
    async fn process(&self, message: RawMessage) -> Result<(), SyncError> {
        info!(
            "envelope {} from {} ({} bytes)",
            message.timestamp,
            message.sender,
            message.bytes.len()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let args: Vec<String> = std::env::args().collect();
    let mut path = PathBuf::from("enigma-syncd.toml");
    let mut i = 1;
    while i + 1 < args.len() {
        if args[i] == "--config" {
            path = PathBuf::from(&args[i + 1]);
        }
        i += 1;
    }
    let cfg = config::load_config(&path).map_err(|_| DaemonError::Config)?;
    cfg.validate().map_err(|_| DaemonError::Config)?;
    init_logging(&cfg);
    let engine = init_engine(&cfg).await?;
    let events = spawn_event_log(engine.subscribe());
    let driver = engine.start_driver();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let _ = ctrl_c.as_mut().await;
    info!("shutting down");
    driver.shutdown().await;
    events.abort();
    Ok(())
}

fn init_logging(cfg: &SyncdConfig) {
    let level = match cfg.logging.level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// Opens the on-disk preferences and overlays the identity from the config;
/// the persisted poll time is kept across restarts.
async fn init_prefs(cfg: &SyncdConfig) -> Result<FilePreferences, DaemonError> {
    let local = cfg.local_key().map_err(|_| DaemonError::Config)?;
    let master = cfg.master_key().map_err(|_| DaemonError::Config)?;
    let prefs = FilePreferences::open_or_create(
        &cfg.data_dir,
        PREFS_NAMESPACE,
        StoredPreferences::default(),
    )
    .map_err(|_| DaemonError::Sync)?;
    let using_push = cfg.push.enabled;
    let restoration_time = cfg.identity.restoration_time;
    prefs
        .update(move |stored| {
            stored.local_public_key = Some(local);
            stored.master_public_key = master;
            stored.using_push = using_push;
            stored.restoration_time = restoration_time;
        })
        .await
        .map_err(|_| DaemonError::Sync)?;
    debug!("preferences at {}", prefs.path().display());
    Ok(prefs)
}

async fn init_engine(cfg: &SyncdConfig) -> Result<SyncEngine, DaemonError> {
    let prefs = init_prefs(cfg).await?;
    let deps = SyncCollaborators {
        prefs: Arc::new(prefs),
        swarm: Arc::new(InMemorySwarm::new()),
        feed_registry: Arc::new(InMemoryFeedRegistry::new(cfg.subscribed_feeds())),
        feed_client: Arc::new(InMemoryFeedServer::new()),
        pipeline: Arc::new(LoggingPipeline),
        contacts: Arc::new(InMemoryContactStore::new()),
        devices: Arc::new(InMemoryDeviceLinks::new()),
        jobs: Arc::new(InMemoryJobQueue::new()),
        clock: Arc::new(SystemClock),
    };
    SyncEngine::init(cfg.sync.clone(), deps)
        .await
        .map_err(|_| DaemonError::Sync)
}

fn spawn_event_log(mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!("sync event {:?}", event),
                Err(RecvError::Lagged(skipped)) => debug!("sync events lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests;
