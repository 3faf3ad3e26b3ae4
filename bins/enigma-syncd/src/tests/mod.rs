use super::*;
use crate::config::{FeedsConfig, IdentityConfig, LoggingConfig, PushConfig};
use enigma_sync::config::SyncConfig;
use enigma_sync::prefs::Preferences;
use std::path::Path;
use tempfile::tempdir;


const LOCAL_KEY: &str = "05d1c0ffee00112233445566778899aabbccddeeff00112233445566778899aa01";
const MASTER_KEY: &str = "05feedface00112233445566778899aabbccddeeff00112233445566778899aa00";

pub(super) fn test_config(data_dir: &Path) -> SyncdConfig {
    SyncdConfig {
        data_dir: data_dir.to_path_buf(),
        identity: IdentityConfig {
            public_key: LOCAL_KEY.to_string(),
            master_public_key: None,
            restoration_time: 0,
        },
        push: PushConfig::default(),
        feeds: FeedsConfig {
            subscribed: vec!["https://chat.example.org/lobby".to_string()],
        },
        sync: SyncConfig::default(),
        logging: LoggingConfig {
            level: "error".to_string(),
        },
    }
}

#[test]
fn config_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("syncd.toml");
    let cfg = format!(
        r#"
data_dir = "{dir}"

[identity]
public_key = "{local}"
master_public_key = "{master}"
restoration_time = 1700000000000

[push]
enabled = true

[feeds]
subscribed = ["https://chat.example.org/lobby", "https://chat.example.org/dev"]

[sync]
poll_interval_ms = 60000
failure_policy = "surface"

[sync.dedup]
key_mode = "sender_and_timestamp"
capacity = 1024
ttl_ms = 86400000

[logging]
level = "debug"
"#,
        dir = dir.path().display(),
        local = LOCAL_KEY,
        master = MASTER_KEY
    );
    std::fs::write(&path, cfg).expect("write");
    let loaded = config::load_config(&path).expect("load");
    assert!(loaded.validate().is_ok());
    assert!(loaded.push.enabled);
    assert_eq!(loaded.sync.poll_interval_ms, 60_000);
    assert_eq!(loaded.sync.dedup.capacity, 1024);
    assert_eq!(loaded.subscribed_feeds().len(), 2);
    assert_eq!(
        loaded.master_key().expect("master").map(|k| k.to_string()),
        Some(MASTER_KEY.to_string())
    );
}

#[test]
fn minimal_config_uses_sync_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("syncd.toml");
    let cfg = format!(
        r#"
data_dir = "{dir}"

[identity]
public_key = "{local}"

[logging]
level = "info"
"#,
        dir = dir.path().display(),
        local = LOCAL_KEY
    );
    std::fs::write(&path, cfg).expect("write");
    let loaded = config::load_config(&path).expect("load");
    assert_eq!(loaded.sync, SyncConfig::default());
    assert!(!loaded.push.enabled);
    assert!(loaded.subscribed_feeds().is_empty());
}

#[tokio::test]
async fn engine_boots_from_config_and_persists_identity() {
    let dir = tempdir().expect("tempdir");
    let mut cfg = test_config(dir.path());
    cfg.push.enabled = true;
    cfg.identity.master_public_key = Some(MASTER_KEY.to_string());
    init_logging(&cfg);

    let engine = init_engine(&cfg).await.expect("engine");
    let next = engine.scheduler().schedule().await;
    assert!(next > 0);

    let prefs = init_prefs(&cfg).await.expect("prefs");
    assert!(prefs.is_using_push().await.expect("push"));
    assert_eq!(prefs.background_poll_time().await.expect("time"), next);
    assert_eq!(
        prefs.effective_master_key().await.expect("master").to_string(),
        MASTER_KEY
    );
}

#[tokio::test]
async fn daemon_driver_starts_and_stops() {
    let dir = tempdir().expect("tempdir");
    let cfg = test_config(dir.path());
    let engine = init_engine(&cfg).await.expect("engine");
    let events = spawn_event_log(engine.subscribe());
    let driver = engine.start_driver();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    driver.shutdown().await;
    events.abort();
    assert!(engine.scheduler().next_execution_time().await > 0);
}
