//! Integration tests for downloads driven through the coordinator

use crate::test_utils::*;
use r_medialist::coordinator::{Collaborators, Coordinator, CoordinatorEvent, DownloadOutcome, Notification};
use r_medialist::download::{FileSinkProvider, HttpByteSource};
use r_medialist::store::{DownloadStatus, ItemKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[cfg(test)]
mod download_integration_tests {
    use super::*;

    /// Collects the download percents published for `key` until it completes
    /// or falls back to `NotStarted`.
    async fn download_trace(
        events: &mut broadcast::Receiver<CoordinatorEvent>,
        key: ItemKey,
    ) -> (Vec<u8>, DownloadStatus) {
        let mut percents = Vec::new();
        loop {
            let event = wait_for(events, |e| matches!(e, CoordinatorEvent::ItemChanged { key: k, .. } if *k == key)).await;
            if let CoordinatorEvent::ItemChanged { state, .. } = event {
                match state.download_status {
                    DownloadStatus::InProgress => percents.push(state.download_percent),
                    DownloadStatus::Completed => {
                        percents.push(state.download_percent);
                        return (percents, DownloadStatus::Completed);
                    }
                    DownloadStatus::NotStarted if !percents.is_empty() => {
                        return (percents, DownloadStatus::NotStarted);
                    }
                    DownloadStatus::NotStarted => {}
                }
            }
        }
    }

    #[tokio::test]
    async fn test_quarter_chunks_report_25_50_75_100() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(4, 250));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        let outcome = harness
            .handle
            .request_download_from(keys[0], Some("https://x/a.mp3".to_string()))
            .await?;
        assert_eq!(outcome, DownloadOutcome::Started);

        let (percents, status) = download_trace(&mut events, keys[0]).await;
        assert_eq!(percents, vec![0, 25, 50, 75, 100]);
        assert_eq!(status, DownloadStatus::Completed);

        let state = harness.handle.store().get(&keys[0]).unwrap();
        assert_eq!(state.download_status, DownloadStatus::Completed);
        assert_eq!(state.download_percent, 100);
        assert_eq!(harness.sinks.contents("Track 0").unwrap().len(), 1000);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_request_runs_one_pipeline() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(4, 250).gated());
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        let first = harness.handle.request_download(keys[0]).await?;
        let second = harness.handle.request_download(keys[0]).await?;
        assert_eq!(first, DownloadOutcome::Started);
        assert_eq!(second, DownloadOutcome::AlreadyInProgress);

        harness.source.release(4);
        let (_, status) = download_trace(&mut events, keys[0]).await;
        assert_eq!(status, DownloadStatus::Completed);
        assert_eq!(harness.source.fetch_count(), 1);

        // Completed downloads stay completed.
        assert_eq!(
            harness.handle.request_download(keys[0]).await?,
            DownloadOutcome::AlreadyCompleted
        );
        assert_eq!(harness.source.fetch_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_never_decreases_across_items() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(20, 37));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(3)).await?;

        for key in &keys {
            harness.handle.request_download(*key).await?;
        }

        let mut seen: std::collections::HashMap<ItemKey, Vec<u8>> = Default::default();
        let mut completed = 0;
        while completed < keys.len() {
            let event = wait_for(&mut events, |e| matches!(e, CoordinatorEvent::ItemChanged { .. })).await;
            if let CoordinatorEvent::ItemChanged { key, state, .. } = event {
                seen.entry(key).or_default().push(state.download_percent);
                if state.download_status == DownloadStatus::Completed {
                    completed += 1;
                }
            }
        }

        for key in &keys {
            let trace = &seen[key];
            assert!(trace.windows(2).all(|w| w[0] <= w[1]), "{:?}", trace);
            assert_eq!(trace.last(), Some(&100));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_length_completes_without_intermediate_progress() -> Result<(), Box<dyn std::error::Error>> {
        let source = ScriptedSource::new(vec![vec![1; 300], vec![2; 300]], None);
        let harness = Harness::start(ScriptedBackend::new(), source);
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        harness.handle.request_download(keys[0]).await?;
        let (percents, status) = download_trace(&mut events, keys[0]).await;
        assert_eq!(percents, vec![0, 100]);
        assert_eq!(status, DownloadStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_download_notifies_and_restarts_cleanly() -> Result<(), Box<dyn std::error::Error>> {
        let source = ScriptedSource::uniform(2, 50).failing_first(1);
        let harness = Harness::start(ScriptedBackend::new(), source);
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        harness.handle.request_download(keys[0]).await?;
        let notice = wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::Notice(Notification::DownloadFailed { .. }))
        })
        .await;
        assert_eq!(
            notice,
            CoordinatorEvent::Notice(Notification::DownloadFailed {
                title: "Track 0".to_string(),
                reason: "Unexpected response status 503".to_string(),
            })
        );
        let state = harness.handle.store().get(&keys[0]).unwrap();
        assert_eq!(state.download_status, DownloadStatus::NotStarted);
        assert_eq!(state.download_percent, 0);

        assert_eq!(harness.handle.request_download(keys[0]).await?, DownloadOutcome::Started);
        let notice = wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::Notice(Notification::DownloadSucceeded { .. }))
        })
        .await;
        assert_eq!(
            notice,
            CoordinatorEvent::Notice(Notification::DownloadSucceeded {
                title: "Track 0".to_string(),
                location: "memory://Track 0".to_string(),
            })
        );
        assert_eq!(harness.source.fetch_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_release_all_cancels_in_flight_downloads() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(4, 250).gated());
        let keys = harness.handle.load_catalog(records(2)).await?;

        harness.handle.request_download(keys[0]).await?;
        harness.source.release(1);
        eventually(|| {
            harness
                .handle
                .store()
                .get(&keys[0])
                .map_or(false, |s| s.download_percent == 25)
        })
        .await;

        harness.handle.release_all().await?;
        let state = harness.handle.store().get(&keys[0]).unwrap();
        assert_eq!(state.download_status, DownloadStatus::NotStarted);

        // Bytes released after the cancel change nothing.
        harness.source.release(3);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.handle.store().get(&keys[0]).unwrap(), Default::default());

        // Partial content stays where it was written.
        assert_eq!(harness.sinks.contents("Track 0").map(|c| c.len()), Some(250));
        Ok(())
    }

    #[tokio::test]
    async fn test_download_to_directory_with_file_sinks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let collaborators = Collaborators {
            backend: Arc::new(ScriptedBackend::new()),
            byte_source: Arc::new(ScriptedSource::uniform(3, 100)),
            sinks: Arc::new(FileSinkProvider::new(dir.path())),
        };
        let (coordinator, handle) = Coordinator::new(collaborators, fast_options());
        let task = coordinator.spawn();
        let mut events = handle.subscribe();

        let mut records = records(1);
        records[0].title = "Live/Set".to_string();
        let keys = handle.load_catalog(records).await?;
        handle.request_download(keys[0]).await?;

        let notice = wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::Notice(Notification::DownloadSucceeded { .. }))
        })
        .await;
        let expected = dir.path().join("Live_Set");
        assert_eq!(
            notice,
            CoordinatorEvent::Notice(Notification::DownloadSucceeded {
                title: "Live/Set".to_string(),
                location: expected.display().to_string(),
            })
        );
        assert_eq!(std::fs::read(&expected)?.len(), 300);

        handle.shutdown().await;
        task.await?;
        Ok(())
    }

    /// Requires network access.
    #[tokio::test]
    #[ignore]
    async fn test_http_download() -> Result<(), Box<dyn std::error::Error>> {
        use r_medialist::download::ByteSource;
        let source = HttpByteSource::new(Duration::from_secs(30));
        let fetched = source.fetch("https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3").await?;
        assert!(fetched.content_length.is_some());
        Ok(())
    }
}
