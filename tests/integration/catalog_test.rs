//! Integration tests for catalog decoding and list (re)loading

use crate::test_utils::*;
use r_medialist::catalog::{parse_catalog, CatalogRecord};
use r_medialist::coordinator::{CoordinatorEvent, Notification};
use r_medialist::error::CoreError;

#[cfg(test)]
mod catalog_integration_tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "resultList": [
            {"SongName": "Morning", "imageURL": "https://x/m.jpg", "SongURL": "https://x/m.mp3"},
            {"SongName": "Evening", "SongURL": null},
            {"SongName": "Night", "imageURL": null, "SongURL": "https://x/n.mp3"}
        ]
    }"#;

    #[tokio::test]
    async fn test_catalog_document_becomes_the_list() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let records = parse_catalog(DOCUMENT)?;
        let keys = harness.handle.load_catalog(records).await?;

        let rows = harness.handle.snapshot_all();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.key).collect::<Vec<_>>(), keys);
        assert_eq!(rows[0].record.title, "Morning");
        assert!(!rows[1].record.is_actionable());
        assert_eq!(harness.handle.key_at(2), Some(keys[2]));

        // Items without a source cannot be played or downloaded.
        let play = harness.handle.request_play(keys[1]).await;
        assert!(matches!(play, Err(CoreError::InvalidArgument(_))));
        let download = harness.handle.request_download(keys[1]).await;
        assert!(matches!(download, Err(CoreError::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_replaces_keys_and_stops_everything() -> Result<(), Box<dyn std::error::Error>> {
        let source = ScriptedSource::uniform(4, 100).gated();
        let harness = Harness::start(ScriptedBackend::new(), source);
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(2)).await?;

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        harness.handle.request_download(keys[1]).await?;

        let fresh = harness.handle.load_catalog(records(3)).await?;
        wait_for(&mut events, |e| matches!(e, CoordinatorEvent::ListReplaced { len: 3 })).await;

        assert!(fresh.iter().all(|k| !keys.contains(k)));
        assert_eq!(harness.backend.live_players(), 0);
        assert!(harness
            .handle
            .snapshot_all()
            .iter()
            .all(|row| row.state == Default::default()));

        // Old keys are gone with the old list.
        let stale = harness.handle.request_play(keys[0]).await;
        assert!(matches!(stale, Err(CoreError::InvalidArgument(_))));

        // The cancelled download never lands on the new list.
        harness.source.release(4);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(harness.handle.snapshot_all().iter().all(|row| row.state == Default::default()));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_catalog_keeps_the_current_list() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(2)).await?;

        let kept = harness.handle.load_catalog(Vec::<CatalogRecord>::new()).await?;
        assert_eq!(kept, keys);
        wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::Notice(Notification::CatalogEmpty))
        })
        .await;
        assert_eq!(harness.handle.snapshot_all().len(), 2);
        Ok(())
    }
}
