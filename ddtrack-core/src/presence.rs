//! Resolving watched players against a snapshot.

use crate::key::server_key;
use crate::models::{Participant, PresenceMatch, ServerKey, ServerPresence, Snapshot};
use crate::watchlist::{WatchList, lower_eq};
use std::collections::BTreeMap;

/// Find every occurrence of every watched player in the snapshot.
///
/// A player connected to several servers (or twice to one server) yields one
/// match per client entry. Matches carry the tracked spelling of the name, not
/// the one reported by the server.
pub fn resolve<'a>(snapshot: &'a Snapshot, watch_list: &WatchList) -> Vec<PresenceMatch<'a>> {
    let mut matches = Vec::new();
    for player in watch_list.iter() {
        for server in snapshot.servers() {
            for client in &server.clients {
                if lower_eq(&client.name, player) {
                    matches.push(PresenceMatch {
                        player: *player,
                        server,
                        client,
                    });
                }
            }
        }
    }
    matches
}

/// Group matches by server key.
///
/// Records sharing a key (the same server listed twice) are merged into one
/// group and their players unioned. The first record seen for a key supplies
/// addresses and metadata; the first client entry seen for a player supplies
/// skin and score.
pub fn group(matches: &[PresenceMatch<'_>]) -> BTreeMap<ServerKey, ServerPresence> {
    let mut groups: BTreeMap<ServerKey, ServerPresence> = BTreeMap::new();
    for m in matches {
        let key = server_key(&m.server.addresses);
        let presence = groups.entry(key.clone()).or_insert_with(|| ServerPresence {
            key,
            addresses: m.server.addresses.clone(),
            meta: m.server.meta.clone(),
            participants: Vec::new(),
        });
        if presence.participants.iter().any(|p| p.name == m.player) {
            continue;
        }
        presence.participants.push(Participant {
            name: m.player,
            skin: m.client.skin.clone(),
            score: m.client.score,
        });
    }
    groups
}
