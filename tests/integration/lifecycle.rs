use crate::common::TestStorage;
use anyhow::Result;
use multiwerf::channel_mapping::ChannelMapping;
use multiwerf::events::EventSender;
use multiwerf::gc::collect_garbage;
use multiwerf::repository::{LocalRepository, Repository};
use multiwerf::version::ChannelOrder;
use multiwerf::workflow::{Request, VersionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn manager(env: &TestStorage) -> Result<VersionManager> {
    let backends: Vec<Arc<dyn Repository>> = vec![Arc::new(LocalRepository::new(&env.mirror))];
    VersionManager::new(
        env.storage(),
        ChannelOrder::default(),
        backends,
        &env.mapping_url(),
        Duration::from_secs(1800),
    )
}

/// An event sender whose events are drained and dropped.
fn events() -> EventSender {
    let (tx, mut rx) = mpsc::channel(1);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    EventSender::new(tx)
}

#[tokio::test]
async fn test_gc_keeps_current_and_previous_mapping_generation() -> Result<()> {
    let env = TestStorage::new()?;
    for version in ["1.1.0", "1.1.1", "1.1.2"] {
        env.publish(version).await?;
    }
    let manager = manager(&env)?;
    let request = Request::parse("1.1", "stable", &ChannelOrder::default())?;
    let storage = env.storage();

    for version in ["1.1.0", "1.1.1"] {
        env.set_remote_mapping(&[("1.1", "stable", version)])?;
        manager.update(&request, true, &events()).await?;
    }

    let report = collect_garbage(&storage, false, &events()).await?;
    assert!(report.removed.is_empty());
    assert_eq!(storage.list_version_dirs().await?, vec!["1.1.0", "1.1.1"]);

    env.set_remote_mapping(&[("1.1", "stable", "1.1.2")])?;
    manager.update(&request, true, &events()).await?;

    let report = collect_garbage(&storage, false, &events()).await?;
    assert_eq!(report.removed, vec!["1.1.0"]);
    assert_eq!(storage.list_version_dirs().await?, vec!["1.1.1", "1.1.2"]);

    let previous = ChannelMapping::load_local(&storage.channel_mapping_backup_path()).await?;
    assert_eq!(previous.channel_version("1.1", "stable")?, "1.1.1");
    Ok(())
}

#[tokio::test]
async fn test_saved_mapping_matches_canonical_form() -> Result<()> {
    let env = TestStorage::new()?;
    env.publish("1.1.0").await?;
    env.set_remote_mapping(&[("1.1", "stable", "1.1.0"), ("1.1", "alpha", "1.1.0")])?;

    let manager = manager(&env)?;
    let request = Request::parse("1.1", "alpha", &ChannelOrder::default())?;
    manager.update(&request, true, &events()).await?;

    let saved = std::fs::read_to_string(env.storage().channel_mapping_path())?;
    let remote = std::fs::read_to_string(&env.remote_mapping)?;
    assert_eq!(saved, remote);
    assert!(saved.ends_with("}\n"));
    assert!(saved.contains("\n    \"multiwerf\""));
    Ok(())
}
