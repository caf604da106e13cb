//! One polling tick: fetch, resolve, diff, apply, commit.

use crate::error::SourceError;
use crate::lifecycle::{Delivery, NotificationManager, Renderer, Sink, SnapshotSource};
use crate::models::ChannelId;
use crate::presence;
use crate::reconcile::{Applied, ReconciliationState};
use crate::watchlist::WatchList;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tuning knobs for the tick driver.
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// Upper bound for the snapshot fetch.
    pub fetch_timeout: Duration,
    /// Upper bound for each render/send/edit/delete call.
    pub call_timeout: Duration,
    /// How many recent channel messages the startup purge looks at.
    pub purge_lookback: u8,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(15),
            purge_lookback: 50,
        }
    }
}

/// Counts of what a tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub sent: usize,
    pub edited: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Nothing was fetched; state and bindings are untouched.
    Skipped(String),
    /// The snapshot matched the published state.
    Unchanged,
    Applied(TickReport),
}

/// Point-in-time view of the tracker for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub tracked_players: usize,
    pub active_notifications: usize,
    /// Unix timestamp of the last completed tick.
    pub last_tick_at: Option<i64>,
    pub last_outcome: Option<TickOutcome>,
    pub consecutive_source_failures: u32,
    pub channel: Option<ChannelId>,
}

impl TrackerStatus {
    /// Whether the master server answered on the last tick.
    pub fn source_reachable(&self) -> bool {
        self.last_tick_at.is_some() && self.consecutive_source_failures == 0
    }
}

pub struct Tracker<Src, S, R> {
    source: Src,
    manager: NotificationManager<S, R>,
    state: ReconciliationState,
    options: TrackerOptions,
    purged: bool,
    channel: Option<ChannelId>,
    status: TrackerStatus,
}

impl<Src, S, R> Tracker<Src, S, R>
where
    Src: SnapshotSource,
    S: Sink,
    R: Renderer,
{
    pub fn new(source: Src, sink: Arc<S>, renderer: Arc<R>, options: TrackerOptions) -> Self {
        let manager = NotificationManager::new(sink, renderer, options.call_timeout);
        Self {
            source,
            manager,
            state: ReconciliationState::new(),
            options,
            purged: false,
            channel: None,
            status: TrackerStatus::default(),
        }
    }

    /// Run one tick against the given watch list and channel.
    ///
    /// Taking `&mut self` keeps ticks from overlapping.
    pub async fn tick(&mut self, watch_list: &WatchList, channel: ChannelId, now: i64) -> TickOutcome {
        let outcome = self.run_tick(watch_list, channel).await;
        self.status.tracked_players = watch_list.len();
        self.status.active_notifications = self.manager.active();
        self.status.last_tick_at = Some(now);
        self.status.last_outcome = Some(outcome.clone());
        outcome
    }

    async fn run_tick(&mut self, watch_list: &WatchList, channel: ChannelId) -> TickOutcome {
        let fetched = tokio::time::timeout(self.options.fetch_timeout, self.source.fetch()).await;
        let snapshot = match fetched {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => return self.skip(err),
            Err(_) => return self.skip(SourceError::TimedOut),
        };
        self.status.consecutive_source_failures = 0;

        if !self.purged {
            self.purged = true;
            self.manager.purge_own(channel, self.options.purge_lookback).await;
        }

        if let Some(previous) = self.channel.replace(channel) {
            if previous != channel {
                info!(from = previous, to = channel, "notification channel changed, recreating notifications");
                self.manager.retire_all().await;
                self.state.clear();
            }
        }
        self.status.channel = Some(channel);

        let matches = presence::resolve(&snapshot, watch_list);
        let current = presence::group(&matches);
        let operations = self.state.diff(&current);
        if operations.is_empty() {
            debug!(servers = current.len(), "no presence changes");
            return TickOutcome::Unchanged;
        }

        let results = self.manager.apply(channel, operations).await;
        let mut report = TickReport::default();
        for result in &results {
            match &result.outcome {
                Ok(Delivery::Sent) => report.sent += 1,
                Ok(Delivery::Edited) => report.edited += 1,
                Ok(Delivery::Deleted) => report.deleted += 1,
                Ok(Delivery::Unbound) => {}
                Err(_) => report.failed += 1,
            }
        }
        let applied: Vec<Applied> = results.iter().map(|r| r.applied()).collect();
        self.state.commit(&applied);

        info!(
            sent = report.sent,
            edited = report.edited,
            deleted = report.deleted,
            failed = report.failed,
            "applied presence changes"
        );
        TickOutcome::Applied(report)
    }

    fn skip(&mut self, err: SourceError) -> TickOutcome {
        self.status.consecutive_source_failures += 1;
        warn!(%err, failures = self.status.consecutive_source_failures, "skipping tick");
        TickOutcome::Skipped(err.to_string())
    }

    /// Record a tick that could not run because no channel is configured.
    pub fn skip_unconfigured(&mut self, watch_list: &WatchList, now: i64) -> TickOutcome {
        let outcome = TickOutcome::Skipped("no notification channel configured".to_string());
        self.status.tracked_players = watch_list.len();
        self.status.last_tick_at = Some(now);
        self.status.last_outcome = Some(outcome.clone());
        outcome
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn manager(&self) -> &NotificationManager<S, R> {
        &self.manager
    }

    pub fn status(&self) -> &TrackerStatus {
        &self.status
    }
}
