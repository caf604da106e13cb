//! Mapping reconciliation operations onto sink calls.
//!
//! The manager owns the binding from server key to the posted message. Each
//! tick carries at most one operation per key, so operations run concurrently
//! and every key's binding has a single writer.

use crate::error::{OperationError, SinkError, SourceError};
use crate::models::{Artifact, ChannelId, MessageRef, Notification, ServerKey, ServerPresence, Snapshot};
use crate::reconcile::{Applied, Operation};
use async_trait::async_trait;
use futures_util::future::join_all;
use scc::hash_map::Entry;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Produces directory snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, SourceError>;
}

/// Renders the image attached to a notification.
///
/// Implementations never fail: when inputs are missing they return a
/// fallback artifact with `degraded` set.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, presence: &ServerPresence) -> Artifact;
}

/// The messaging channel notifications are posted to.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(
        &self,
        channel: ChannelId,
        notification: &Notification,
    ) -> Result<MessageRef, SinkError>;

    async fn edit(&self, message: MessageRef, notification: &Notification)
    -> Result<(), SinkError>;

    async fn delete(&self, message: MessageRef) -> Result<(), SinkError>;

    /// Messages authored by this process among the last `limit` messages of `channel`.
    async fn recent_own_messages(
        &self,
        channel: ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageRef>, SinkError>;
}

/// How a successful operation reached the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Edited,
    Deleted,
    /// Remove for a key that had no binding.
    Unbound,
}

/// Outcome of one operation.
#[derive(Debug)]
pub struct OperationResult {
    pub operation: Operation,
    pub outcome: Result<Delivery, OperationError>,
    /// No notification is bound to the key once the operation finished.
    pub unbound: bool,
}

impl OperationResult {
    pub fn applied(&self) -> Applied {
        Applied {
            operation: self.operation.clone(),
            succeeded: self.outcome.is_ok(),
            unbound: self.unbound,
        }
    }
}

pub struct NotificationManager<S, R> {
    sink: Arc<S>,
    renderer: Arc<R>,
    records: scc::HashMap<ServerKey, MessageRef>,
    call_timeout: Duration,
}

impl<S: Sink, R: Renderer> NotificationManager<S, R> {
    pub fn new(sink: Arc<S>, renderer: Arc<R>, call_timeout: Duration) -> Self {
        Self {
            sink,
            renderer,
            records: scc::HashMap::new(),
            call_timeout,
        }
    }

    /// Apply a tick's operations. Results are returned in input order.
    pub async fn apply(&self, channel: ChannelId, operations: Vec<Operation>) -> Vec<OperationResult> {
        let tasks = operations.into_iter().map(|operation| async move {
            let outcome = match &operation {
                Operation::Upsert(presence) => self.upsert(channel, presence).await,
                Operation::Remove(key) => self.remove(key).await,
            };
            if let Err(err) = &outcome {
                warn!(key = %operation.key(), %err, "notification operation failed, will retry next tick");
            }
            let unbound = self.binding(operation.key()).await.is_none();
            OperationResult {
                operation,
                outcome,
                unbound,
            }
        });
        join_all(tasks).await
    }

    async fn upsert(
        &self,
        channel: ChannelId,
        presence: &ServerPresence,
    ) -> Result<Delivery, OperationError> {
        let artifact = self.call("render", self.renderer.render(presence)).await?;
        if artifact.degraded {
            debug!(key = %presence.key, "rendered fallback artifact");
        }
        let notification = Notification {
            presence: presence.clone(),
            artifact,
        };

        // Bindings left in another channel are not edited in place.
        let existing = self
            .binding(&presence.key)
            .await
            .filter(|message| message.channel == channel);

        if let Some(message) = existing {
            match self.call("edit", self.sink.edit(message, &notification)).await {
                Ok(Ok(())) => {
                    debug!(key = %presence.key, message = message.message, "edited notification");
                    return Ok(Delivery::Edited);
                }
                Ok(Err(SinkError::NotFound)) => {
                    info!(key = %presence.key, message = message.message, "notification was deleted externally, sending a new one");
                    self.unbind(&presence.key).await;
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(err) => return Err(err),
            }
        }

        let message = self
            .call("send", self.sink.send(channel, &notification))
            .await??;
        self.bind(presence.key.clone(), message).await;
        info!(
            key = %presence.key,
            players = presence.participants.len(),
            message = message.message,
            "sent notification"
        );
        Ok(Delivery::Sent)
    }

    async fn remove(&self, key: &ServerKey) -> Result<Delivery, OperationError> {
        let Some((_, message)) = self.records.remove_async(key).await else {
            return Ok(Delivery::Unbound);
        };
        match self.call("delete", self.sink.delete(message)).await {
            Ok(Ok(())) => {
                info!(%key, message = message.message, "deleted notification");
                Ok(Delivery::Deleted)
            }
            Ok(Err(SinkError::NotFound)) => {
                debug!(%key, message = message.message, "notification already gone");
                Ok(Delivery::Deleted)
            }
            Ok(Err(err)) => Err(err.into()),
            Err(err) => Err(err),
        }
    }

    /// Delete messages this process posted earlier in `channel` (e.g. before a
    /// restart). Returns how many were deleted.
    pub async fn purge_own(&self, channel: ChannelId, lookback: u8) -> usize {
        let messages = match self
            .call("history", self.sink.recent_own_messages(channel, lookback))
            .await
        {
            Ok(Ok(messages)) => messages,
            Ok(Err(err)) => {
                error!(channel, %err, "failed to list own messages for startup purge");
                return 0;
            }
            Err(err) => {
                error!(channel, %err, "failed to list own messages for startup purge");
                return 0;
            }
        };

        let mut deleted = 0;
        for message in messages {
            match self.call("delete", self.sink.delete(message)).await {
                Ok(Ok(())) | Ok(Err(SinkError::NotFound)) => deleted += 1,
                Ok(Err(err)) => warn!(message = message.message, %err, "failed to purge message"),
                Err(err) => warn!(message = message.message, %err, "failed to purge message"),
            }
        }
        info!(channel, deleted, "purged notifications left by a previous run");
        deleted
    }

    /// Delete every bound notification and forget all bindings.
    pub async fn retire_all(&self) {
        for (key, message) in self.bindings().await {
            let _ = self.records.remove_async(&key).await;
            match self.call("delete", self.sink.delete(message)).await {
                Ok(Ok(())) | Ok(Err(SinkError::NotFound)) => {
                    debug!(%key, message = message.message, "retired notification");
                }
                Ok(Err(err)) => warn!(%key, %err, "failed to retire notification"),
                Err(err) => warn!(%key, %err, "failed to retire notification"),
            }
        }
    }

    pub async fn binding(&self, key: &ServerKey) -> Option<MessageRef> {
        self.records.read_async(key, |_, message| *message).await
    }

    /// Copy of all current bindings, ordered by key.
    pub async fn bindings(&self) -> BTreeMap<ServerKey, MessageRef> {
        let mut out = BTreeMap::new();
        self.records
            .retain_async(|key, message| {
                out.insert(key.clone(), *message);
                true
            })
            .await;
        out
    }

    pub fn active(&self) -> usize {
        self.records.len()
    }

    async fn bind(&self, key: ServerKey, message: MessageRef) {
        match self.records.entry_async(key).await {
            Entry::Occupied(mut occupied) => *occupied.get_mut() = message,
            Entry::Vacant(vacant) => {
                vacant.insert_entry(message);
            }
        }
    }

    async fn unbind(&self, key: &ServerKey) {
        let _ = self.records.remove_async(key).await;
    }

    async fn call<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, OperationError> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| OperationError::TimedOut(what))
    }
}
