//! The watch file: tracked players, notification channel and check interval.
//!
//! It is edited outside the tracker and re-read at the start of every tick.

use crate::error::StoreError;
use ddtrack_core::{ChannelId, WatchList};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 15;
pub const MIN_CHECK_INTERVAL_SECS: u64 = 5;
pub const MAX_CHECK_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default)]
    pub tracked_players: Vec<String>,
    #[serde(default)]
    pub notification_channel_id: Option<ChannelId>,
    #[serde(default)]
    pub check_interval: Option<u64>,
}

impl StoredSettings {
    pub fn watch_list(&self) -> WatchList {
        WatchList::from_names(&self.tracked_players)
    }

    /// Poll interval, clamped to 5..=300 seconds.
    pub fn check_interval(&self) -> Duration {
        let secs = self
            .check_interval
            .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS)
            .clamp(MIN_CHECK_INTERVAL_SECS, MAX_CHECK_INTERVAL_SECS);
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone)]
pub struct WatchStore {
    path: PathBuf,
}

impl WatchStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the watch file without touching it. A missing file yields empty
    /// settings.
    pub async fn read(&self) -> Result<StoredSettings, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoredSettings::default()),
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Read the watch file, filling a missing `check_interval` with the default
    /// and writing it back. A failed write-back is logged and the settings are
    /// still returned.
    pub async fn load(&self) -> Result<StoredSettings, StoreError> {
        let mut settings = self.read().await?;
        if settings.check_interval.is_none() {
            settings.check_interval = Some(DEFAULT_CHECK_INTERVAL_SECS);
            match self.save(&settings).await {
                Ok(()) => {
                    info!(path = %self.path.display(), "wrote default check interval to watch file")
                }
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "could not write default check interval to watch file")
                }
            }
        }
        Ok(settings)
    }

    pub async fn save(&self, settings: &StoredSettings) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> WatchStore {
        let path = std::env::temp_dir().join(format!(
            "ddtrack-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        WatchStore::new(path)
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let store = temp_store("missing");
        let settings = store.load().await.unwrap();
        assert!(settings.tracked_players.is_empty());
        assert_eq!(settings.notification_channel_id, None);
        assert_eq!(settings.check_interval(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_missing_interval_is_written_back() {
        let store = temp_store("interval");
        tokio::fs::write(
            store.path(),
            r#"{"tracked_players": ["nameless tee"], "notification_channel_id": 1234}"#,
        )
        .await
        .unwrap();

        let settings = store.load().await.unwrap();
        assert_eq!(settings.check_interval, Some(15));
        assert_eq!(settings.notification_channel_id, Some(1234));

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let reread: StoredSettings = serde_json::from_str(&raw).unwrap();
        assert_eq!(reread, settings);
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let store = temp_store("invalid");
        tokio::fs::write(store.path(), "{not json").await.unwrap();
        assert!(matches!(store.load().await, Err(StoreError::Json(_))));
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[test]
    fn test_interval_is_clamped() {
        let mut settings = StoredSettings {
            check_interval: Some(1),
            ..Default::default()
        };
        assert_eq!(settings.check_interval(), Duration::from_secs(5));
        settings.check_interval = Some(3600);
        assert_eq!(settings.check_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_watch_list_from_settings() {
        let settings = StoredSettings {
            tracked_players: vec!["Alice".to_string(), "alice".to_string(), "Bob".to_string()],
            ..Default::default()
        };
        assert_eq!(settings.watch_list().len(), 2);
    }

    #[tokio::test]
    async fn test_read_does_not_write_back() {
        let store = temp_store("readonly-cmd");
        let raw = r#"{"tracked_players": ["Alice"]}"#;
        tokio::fs::write(store.path(), raw).await.unwrap();

        let settings = store.read().await.unwrap();
        assert_eq!(settings.check_interval, None);
        assert_eq!(settings.check_interval(), Duration::from_secs(15));
        assert_eq!(tokio::fs::read_to_string(store.path()).await.unwrap(), raw);
        let _ = tokio::fs::remove_file(store.path()).await;
    }

    #[tokio::test]
    async fn test_failed_write_back_still_loads() {
        let store = temp_store("readonly");
        tokio::fs::write(
            store.path(),
            r#"{"tracked_players": ["Alice"], "notification_channel_id": 99}"#,
        )
        .await
        .unwrap();
        let mut perms = std::fs::metadata(store.path()).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(store.path(), perms).unwrap();

        let settings = store.load().await.unwrap();
        assert_eq!(settings.notification_channel_id, Some(99));
        assert_eq!(settings.check_interval, Some(15));
        assert_eq!(settings.watch_list().len(), 1);

        let _ = std::fs::remove_file(store.path());
    }
}
