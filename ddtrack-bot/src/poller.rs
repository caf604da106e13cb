//! Drives the tracker on the configured check interval.

use crate::helpers::now;
use crate::store::{StoredSettings, WatchStore};
use ddtrack_core::{
    Renderer, Sink, SnapshotSource, TickOutcome, Tracker, TrackerStatus, WatchList,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Poll forever, publishing the tracker status after every tick.
///
/// The watch file is re-read at the start of each tick. If it cannot be read
/// the previous settings stay in effect.
pub async fn run<Src, S, R>(
    mut tracker: Tracker<Src, S, R>,
    store: WatchStore,
    status_tx: watch::Sender<TrackerStatus>,
) where
    Src: SnapshotSource,
    S: Sink,
    R: Renderer,
{
    let initial = store.load().await.unwrap_or_else(|err| {
        warn!(%err, "failed to read watch file, starting with empty settings");
        StoredSettings::default()
    });
    let mut active = ActiveSettings::new(initial);
    let mut period = active.settings().check_interval();
    // first tick fires immediately
    let mut ticker = new_interval(Instant::now(), period);
    info!(interval_secs = period.as_secs(), "poller started");

    loop {
        ticker.tick().await;
        let outcome = poll_once(&mut tracker, &store, &mut active).await;
        debug!(?outcome, "tick finished");
        status_tx.send_replace(tracker.status().clone());

        let wanted = active.settings().check_interval();
        if wanted != period {
            info!(
                from_secs = period.as_secs(),
                to_secs = wanted.as_secs(),
                "check interval changed"
            );
            period = wanted;
            ticker = new_interval(Instant::now() + period, period);
        }
    }
}

/// Settings in effect plus the watch list built from them.
///
/// The watch list is only rebuilt when the stored settings change, so invalid
/// names are reported once per edit rather than on every tick.
#[derive(Debug, Clone)]
pub struct ActiveSettings {
    settings: StoredSettings,
    watch_list: WatchList,
}

impl ActiveSettings {
    pub fn new(settings: StoredSettings) -> Self {
        let watch_list = settings.watch_list();
        Self {
            settings,
            watch_list,
        }
    }

    pub fn settings(&self) -> &StoredSettings {
        &self.settings
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    /// Swap in freshly read settings. Returns whether anything changed.
    pub fn update(&mut self, fresh: StoredSettings) -> bool {
        if fresh == self.settings {
            return false;
        }
        *self = Self::new(fresh);
        true
    }
}

/// Reload settings and run a single tick with them.
pub async fn poll_once<Src, S, R>(
    tracker: &mut Tracker<Src, S, R>,
    store: &WatchStore,
    active: &mut ActiveSettings,
) -> TickOutcome
where
    Src: SnapshotSource,
    S: Sink,
    R: Renderer,
{
    match store.load().await {
        Ok(fresh) => {
            if active.update(fresh) {
                debug!(players = active.watch_list().len(), "watch file changed");
            }
        }
        Err(err) => warn!(%err, "failed to read watch file, keeping previous settings"),
    }

    let at = now();
    match active.settings().notification_channel_id {
        Some(channel) => tracker.tick(active.watch_list(), channel, at).await,
        None => {
            warn!("no notification channel configured, skipping tick");
            tracker.skip_unconfigured(active.watch_list(), at)
        }
    }
}

fn new_interval(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddtrack_core::{
        Artifact, ChannelId, ClientInfo, MessageRef, Notification, ServerMeta, ServerPresence,
        ServerRecord, SinkError, Snapshot, SourceError, TrackerOptions,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct OneServer;

    #[async_trait]
    impl SnapshotSource for OneServer {
        async fn fetch(&self) -> Result<Snapshot, SourceError> {
            Ok(Snapshot::new(vec![ServerRecord {
                addresses: vec!["tw-0.6+udp://10.0.0.1:8303".to_string()],
                meta: ServerMeta {
                    name: "DDNet GER1".to_string(),
                    map: "Kobra".to_string(),
                    client_count: 1,
                    max_clients: 64,
                    location: None,
                },
                clients: vec![ClientInfo {
                    name: "Alice".to_string(),
                    skin: "default".to_string(),
                    score: -9999,
                }],
            }]))
        }
    }

    struct Blank;

    #[async_trait]
    impl Renderer for Blank {
        async fn render(&self, _presence: &ServerPresence) -> Artifact {
            Artifact {
                bytes: Vec::new(),
                degraded: true,
            }
        }
    }

    #[derive(Default)]
    struct CountingSink {
        next_id: AtomicU64,
    }

    #[async_trait]
    impl Sink for CountingSink {
        async fn send(
            &self,
            channel: ChannelId,
            _notification: &Notification,
        ) -> Result<MessageRef, SinkError> {
            Ok(MessageRef {
                channel,
                message: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            })
        }

        async fn edit(&self, _message: MessageRef, _n: &Notification) -> Result<(), SinkError> {
            Ok(())
        }

        async fn delete(&self, _message: MessageRef) -> Result<(), SinkError> {
            Ok(())
        }

        async fn recent_own_messages(
            &self,
            _channel: ChannelId,
            _limit: u8,
        ) -> Result<Vec<MessageRef>, SinkError> {
            Ok(Vec::new())
        }
    }

    fn tracker() -> Tracker<OneServer, CountingSink, Blank> {
        Tracker::new(
            OneServer,
            Arc::new(CountingSink::default()),
            Arc::new(Blank),
            TrackerOptions::default(),
        )
    }

    fn temp_store(name: &str) -> WatchStore {
        let path = std::env::temp_dir().join(format!(
            "ddtrack-poller-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        WatchStore::new(path)
    }

    #[tokio::test]
    async fn test_missing_channel_skips_tick() {
        let store = temp_store("unconfigured");
        store
            .save(&StoredSettings {
                tracked_players: vec!["Alice".to_string()],
                notification_channel_id: None,
                check_interval: Some(15),
            })
            .await
            .unwrap();

        let mut tracker = tracker();
        let mut active = ActiveSettings::new(StoredSettings::default());
        let outcome = poll_once(&mut tracker, &store, &mut active).await;

        assert!(matches!(outcome, TickOutcome::Skipped(_)));
        assert_eq!(tracker.status().tracked_players, 1);
        assert!(tracker.status().last_tick_at.is_some());
        assert!(tracker.manager().bindings().await.is_empty());
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn test_tick_uses_reloaded_settings() {
        let store = temp_store("configured");
        store
            .save(&StoredSettings {
                tracked_players: vec!["alice".to_string()],
                notification_channel_id: Some(42),
                check_interval: Some(30),
            })
            .await
            .unwrap();

        let mut tracker = tracker();
        let mut active = ActiveSettings::new(StoredSettings::default());
        let outcome = poll_once(&mut tracker, &store, &mut active).await;

        assert!(matches!(outcome, TickOutcome::Applied(report) if report.sent == 1));
        assert_eq!(active.settings().check_interval(), Duration::from_secs(30));
        assert_eq!(tracker.status().channel, Some(42));
        assert_eq!(tracker.status().active_notifications, 1);
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn test_unreadable_file_keeps_previous_settings() {
        let store = temp_store("broken");
        tokio::fs::write(store.path(), "{broken").await.unwrap();

        let mut tracker = tracker();
        let mut active = ActiveSettings::new(StoredSettings {
            tracked_players: vec!["Alice".to_string()],
            notification_channel_id: Some(7),
            check_interval: Some(15),
        });
        let outcome = poll_once(&mut tracker, &store, &mut active).await;

        assert!(matches!(outcome, TickOutcome::Applied(_)));
        assert_eq!(active.settings().notification_channel_id, Some(7));
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[test]
    fn test_watch_list_rebuilt_only_on_change() {
        let settings = StoredSettings {
            tracked_players: vec!["Alice".to_string(), String::new()],
            notification_channel_id: Some(7),
            check_interval: Some(15),
        };
        let mut active = ActiveSettings::new(settings.clone());
        assert_eq!(active.watch_list().len(), 1);

        assert!(!active.update(settings.clone()));

        let mut edited = settings;
        edited.tracked_players.push("Bob".to_string());
        assert!(active.update(edited));
        assert_eq!(active.watch_list().len(), 2);
        assert!(active.watch_list().contains("bob"));
    }
}
