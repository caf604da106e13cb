//! Diffing successive per-server player groupings into notification operations.

use crate::models::{PlayerName, ServerKey, ServerPresence};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// A change the notification layer has to apply for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create or refresh the notification for a server.
    Upsert(ServerPresence),
    /// The server has no tracked players anymore.
    Remove(ServerKey),
}

impl Operation {
    pub fn key(&self) -> &ServerKey {
        match self {
            Operation::Upsert(presence) => &presence.key,
            Operation::Remove(key) => key,
        }
    }
}

/// Result of attempting one operation, fed back into [`ReconciliationState::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub operation: Operation,
    pub succeeded: bool,
    /// The key has no notification bound after the attempt.
    pub unbound: bool,
}

/// Player names last successfully published per server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    servers: BTreeMap<ServerKey, Vec<PlayerName>>,
}

impl ReconciliationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn players(&self, key: &ServerKey) -> Option<&[PlayerName]> {
        self.servers.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServerKey> {
        self.servers.keys()
    }

    /// Compute the operations that take the published state to `current`.
    ///
    /// Removes come first, then upserts that shrink a server's player set, then
    /// upserts for new or growing servers. Keys are in ascending order within
    /// each class. Unchanged servers produce nothing.
    pub fn diff(&self, current: &BTreeMap<ServerKey, ServerPresence>) -> Vec<Operation> {
        let mut removes = Vec::new();
        let mut shrinks = Vec::new();
        let mut grows = Vec::new();

        for key in self.servers.keys() {
            if !current.contains_key(key) {
                removes.push(Operation::Remove(key.clone()));
            }
        }

        for (key, presence) in current {
            let names: Vec<PlayerName> = presence.player_names().copied().collect();
            if presence.participants.is_empty() {
                if self.servers.contains_key(key) {
                    removes.push(Operation::Remove(key.clone()));
                }
                continue;
            }
            match self.servers.get(key) {
                Some(previous) if same_players(previous, &names) => {}
                Some(previous) if names.len() < previous.len() => {
                    shrinks.push(Operation::Upsert(presence.clone()));
                }
                _ => grows.push(Operation::Upsert(presence.clone())),
            }
        }

        debug!(
            removes = removes.len(),
            shrinks = shrinks.len(),
            grows = grows.len(),
            "computed reconciliation diff"
        );

        removes.extend(shrinks);
        removes.extend(grows);
        removes
    }

    /// Fold the outcome of a tick's operations into the published state.
    ///
    /// Failed upserts are left out so that the next diff emits them again. A
    /// failed upsert that left the key unbound also forgets the key, otherwise
    /// a later return to the old player set would look unchanged. Removes are
    /// folded in once attempted: the binding is gone either way.
    pub fn commit<'a>(&mut self, results: impl IntoIterator<Item = &'a Applied>) {
        for applied in results {
            match &applied.operation {
                Operation::Upsert(presence) if applied.succeeded => {
                    let names = presence.player_names().copied().collect();
                    self.servers.insert(presence.key.clone(), names);
                }
                Operation::Upsert(presence) if applied.unbound => {
                    self.servers.remove(&presence.key);
                }
                Operation::Upsert(_) => {}
                Operation::Remove(key) => {
                    self.servers.remove(key);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.servers.clear();
    }
}

/// Set equality: discovery order does not matter.
fn same_players(a: &[PlayerName], b: &[PlayerName]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let a: HashSet<&PlayerName> = a.iter().collect();
    b.iter().all(|name| a.contains(name))
}
