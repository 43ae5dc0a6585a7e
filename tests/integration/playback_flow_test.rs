//! Integration tests for the single-playback rule and playback progress

use crate::test_utils::*;
use r_medialist::coordinator::{CoordinatorEvent, CoordinatorOptions, Notification, PlayOutcome};
use r_medialist::error::CoreError;
use r_medialist::store::ItemKey;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

#[cfg(test)]
mod playback_integration_tests {
    use super::*;

    fn playing_count(harness: &Harness) -> usize {
        harness.handle.snapshot_all().iter().filter(|row| row.state.is_playing).count()
    }

    fn is_playing(harness: &Harness, key: &ItemKey) -> bool {
        harness.handle.store().get(key).map_or(false, |s| s.is_playing)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_plays_keep_at_most_one_playing() -> Result<(), Box<dyn std::error::Error>> {
        let options = CoordinatorOptions {
            event_capacity: 8192,
            ..fast_options()
        };
        let harness = Arc::new(Harness::start_with(
            ScriptedBackend::new(),
            ScriptedSource::uniform(1, 10),
            options,
        ));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(5)).await?;

        // Every store snapshot holds at most one playing item.
        let done = Arc::new(AtomicBool::new(false));
        let violations = Arc::new(AtomicUsize::new(0));
        let watcher = {
            let harness = harness.clone();
            let done = done.clone();
            let violations = violations.clone();
            tokio::spawn(async move {
                while !done.load(Ordering::SeqCst) {
                    if playing_count(&harness) > 1 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut callers = Vec::new();
        for caller in 0..4usize {
            let handle = harness.handle.clone();
            let keys = keys.clone();
            callers.push(tokio::spawn(async move {
                for round in 0..10usize {
                    let key = keys[(caller * 3 + round) % keys.len()];
                    handle.request_play(key).await?;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                Ok::<_, CoreError>(())
            }));
        }
        for caller in callers {
            caller.await??;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        done.store(true, Ordering::SeqCst);
        watcher.await?;

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert!(playing_count(&harness) <= 1);
        assert!(harness.backend.max_live_players() <= 1);

        // Replaying the published changes never shows two playing items.
        let mut playing = HashSet::new();
        loop {
            match events.try_recv() {
                Ok(CoordinatorEvent::ItemChanged { key, state, .. }) => {
                    if state.is_playing {
                        playing.insert(key);
                    } else {
                        playing.remove(&key);
                    }
                    assert!(playing.len() <= 1, "two items published as playing");
                }
                Ok(_) => {}
                Err(TryRecvError::Empty) => break,
                Err(e) => panic!("event replay incomplete: {}", e),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_play_twice_toggles_off() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(2)).await?;

        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Preparing);
        assert!(is_playing(&harness, &keys[0]));
        eventually(|| harness.backend.is_started(&source_for(0))).await;

        let mut events = harness.handle.subscribe();
        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Stopped);
        assert!(!is_playing(&harness, &keys[0]));
        assert_eq!(harness.backend.live_players(), 0);

        // The ticker is gone with the player.
        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(event) = events.try_recv() {
            if let CoordinatorEvent::ItemChanged { state, .. } = event {
                assert!(!state.is_playing);
            }
        }
        assert_eq!(harness.handle.store().get(&keys[0]).unwrap(), Default::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_toggle_while_preparing_discards_the_player() -> Result<(), Box<dyn std::error::Error>> {
        let backend = ScriptedBackend::new().with_open_delay(Duration::from_millis(50));
        let harness = Harness::start(backend, ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(1)).await?;

        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Preparing);
        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Stopped);

        let release = format!("release {}", source_for(0));
        eventually(|| harness.backend.log_index(&release).is_some()).await;
        assert!(!harness.backend.is_started(&source_for(0)));
        assert!(!is_playing(&harness, &keys[0]));
        Ok(())
    }

    #[tokio::test]
    async fn test_switching_items_releases_before_opening() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(2)).await?;

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        harness.handle.request_play(keys[1]).await?;
        eventually(|| harness.backend.is_started(&source_for(1))).await;

        let released = harness.backend.log_index(&format!("release {}", source_for(0)));
        let opened = harness.backend.log_index(&format!("open {}", source_for(1)));
        assert!(released.is_some() && released < opened, "{:?}", harness.backend.log());

        assert!(!is_playing(&harness, &keys[0]));
        assert!(is_playing(&harness, &keys[1]));
        assert_eq!(harness.backend.live_players(), 1);
        assert_eq!(harness.backend.max_live_players(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_request() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(2)).await?;

        assert!(!harness.handle.request_stop(keys[1]).await?);
        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        assert!(harness.handle.request_stop(keys[0]).await?);
        assert!(!is_playing(&harness, &keys[0]));
        assert_eq!(harness.backend.live_players(), 0);

        let unknown = harness.handle.request_stop(ItemKey::new()).await;
        assert!(matches!(unknown, Err(CoreError::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_seek_targets_the_playing_item() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(2)).await?;

        let idle = harness.handle.seek(keys[0], 50).await;
        assert!(matches!(idle, Err(CoreError::InvalidArgument(_))));

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;

        assert_eq!(harness.handle.seek(keys[0], 50).await?, Duration::from_secs(50));
        assert!(harness
            .backend
            .log_index(&format!("seek {} 50", source_for(0)))
            .is_some());

        for out_of_range in [-1, 101] {
            let result = harness.handle.seek(keys[0], out_of_range).await;
            assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        }
        let other = harness.handle.seek(keys[1], 10).await;
        assert!(matches!(other, Err(CoreError::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_seek_without_known_duration_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let backend = ScriptedBackend::new().with_duration(None);
        let harness = Harness::start(backend, ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(1)).await?;

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        let result = harness.handle.seek(keys[0], 10).await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_ticker_publishes_playback_percent() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        harness.backend.set_position(&source_for(0), Duration::from_secs(25));

        let event = wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::ItemChanged { state, .. } if state.playback_percent == 25)
        })
        .await;
        assert!(matches!(event, CoordinatorEvent::ItemChanged { key, .. } if key == keys[0]));
        assert_eq!(harness.handle.store().get(&keys[0]).unwrap().playback_percent, 25);
        Ok(())
    }

    #[tokio::test]
    async fn test_natural_end_clears_the_item() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(1)).await?;

        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;
        assert!(harness.backend.finish(&source_for(0)));

        eventually(|| !is_playing(&harness, &keys[0])).await;
        assert_eq!(harness.handle.store().get(&keys[0]).unwrap().playback_percent, 0);
        eventually(|| harness.backend.live_players() == 0).await;

        // The item can be played again.
        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Preparing);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_failure_reverts_and_notifies() -> Result<(), Box<dyn std::error::Error>> {
        let backend = ScriptedBackend::new();
        backend.fail_source(&source_for(0));
        let harness = Harness::start(backend, ScriptedSource::uniform(1, 10));
        let mut events = harness.handle.subscribe();
        let keys = harness.handle.load_catalog(records(1)).await?;

        assert_eq!(harness.handle.request_play(keys[0]).await?, PlayOutcome::Preparing);
        let notice = wait_for(&mut events, |e| {
            matches!(e, CoordinatorEvent::Notice(Notification::PlaybackFailed { .. }))
        })
        .await;
        assert!(matches!(
            notice,
            CoordinatorEvent::Notice(Notification::PlaybackFailed { ref title, .. }) if title == "Track 0"
        ));
        assert!(!is_playing(&harness, &keys[0]));
        assert_eq!(harness.backend.live_players(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_report_coordinator_gone() -> Result<(), Box<dyn std::error::Error>> {
        let harness = Harness::start(ScriptedBackend::new(), ScriptedSource::uniform(1, 10));
        let keys = harness.handle.load_catalog(records(1)).await?;
        harness.handle.request_play(keys[0]).await?;
        eventually(|| harness.backend.is_started(&source_for(0))).await;

        harness.handle.shutdown().await;
        harness.task.await?;

        // Shutting down released the player.
        assert_eq!(harness.backend.live_players(), 0);
        let result = harness.handle.request_play(keys[0]).await;
        assert!(matches!(result, Err(CoreError::CoordinatorGone)));
        Ok(())
    }
}
