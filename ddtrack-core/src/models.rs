use arrayvec::ArrayString;
use serde::Serialize;
use std::fmt;

/// DDNet player name, stored inline (no heap allocation).
///
/// DDNet allows 15 characters, which can take up to 60 bytes of UTF-8.
pub type PlayerName = ArrayString<64>;

/// Discord channel id the notifications are posted to.
pub type ChannelId = u64;

/// One client entry from a server's client list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
  pub name: String,
  pub skin: String,
  /// Raw score as reported by the server. On race servers this is the
  /// best time in seconds (negative), or -9999 when unfinished.
  pub score: i64,
}

/// Server metadata used to describe a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerMeta {
  pub name: String,
  pub map: String,
  pub client_count: usize,
  pub max_clients: u32,
  /// Region/country code, e.g. `"eu:de"`.
  pub location: Option<String>,
}

/// A single server as listed by the master server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
  /// Connect addresses, e.g. `tw-0.6+udp://1.2.3.4:8303`. Order is not stable between polls.
  pub addresses: Vec<String>,
  pub meta: ServerMeta,
  pub clients: Vec<ClientInfo>,
}

/// One poll's full directory listing.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  servers: Vec<ServerRecord>,
}

impl Snapshot {
  /// Build a snapshot, dropping servers without any address.
  pub fn new(servers: Vec<ServerRecord>) -> Self {
    let servers = servers
      .into_iter()
      .filter(|s| !s.addresses.is_empty())
      .collect();
    Self { servers }
  }

  pub fn servers(&self) -> &[ServerRecord] {
    &self.servers
  }

  pub fn is_empty(&self) -> bool {
    self.servers.is_empty()
  }
}

/// Stable per-server identity derived from its address set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ServerKey(String);

impl ServerKey {
  pub const UNKNOWN: &'static str = "unknown";

  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  pub fn unknown() -> Self {
    Self(Self::UNKNOWN.to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ServerKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// One observed (player, server) occurrence.
#[derive(Debug, Clone, Copy)]
pub struct PresenceMatch<'a> {
  /// Name as tracked in the watch list (display casing).
  pub player: PlayerName,
  pub server: &'a ServerRecord,
  pub client: &'a ClientInfo,
}

/// A tracked player as shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
  pub name: PlayerName,
  pub skin: String,
  pub score: i64,
}

/// Everything known about one server's tracked players for the current tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerPresence {
  pub key: ServerKey,
  /// Addresses of the representative server record.
  pub addresses: Vec<String>,
  pub meta: ServerMeta,
  /// In order of first observation this tick.
  pub participants: Vec<Participant>,
}

impl ServerPresence {
  pub fn player_names(&self) -> impl Iterator<Item = &PlayerName> {
    self.participants.iter().map(|p| &p.name)
  }
}

/// External identifier of a posted notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MessageRef {
  pub channel: ChannelId,
  pub message: u64,
}

/// Rendered image for a notification.
#[derive(Debug, Clone, Default)]
pub struct Artifact {
  /// PNG bytes. Empty when nothing could be rendered at all.
  pub bytes: Vec<u8>,
  /// Set when some input (map preview, skin, font) fell back to a placeholder.
  pub degraded: bool,
}

/// What the sink is asked to post or edit.
#[derive(Debug, Clone)]
pub struct Notification {
  pub presence: ServerPresence,
  pub artifact: Artifact,
}
