//! DDNet master server list as a [`SnapshotSource`].

use async_trait::async_trait;
use ddtrack_core::{ClientInfo, ServerMeta, ServerRecord, Snapshot, SnapshotSource, SourceError};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_MAX_CLIENTS: u32 = 64;

#[derive(Debug, Clone)]
pub struct DdnetSource {
    http: reqwest::Client,
    url: String,
}

impl DdnetSource {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for DdnetSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("HTTP {}", status.as_u16())));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| SourceError::Unavailable(format!("failed to read body: {}", e)))?;
        let snapshot = parse_snapshot(&body)?;
        debug!(servers = snapshot.servers().len(), "fetched server list");
        Ok(snapshot)
    }
}

/// Decode a master server listing.
pub fn parse_snapshot(body: &[u8]) -> Result<Snapshot, SourceError> {
    let list: MasterList = serde_json::from_slice(body)
        .map_err(|e| SourceError::Unavailable(format!("malformed server list: {}", e)))?;
    Ok(Snapshot::new(
        list.servers.into_iter().map(ServerRecord::from).collect(),
    ))
}

#[derive(Deserialize)]
struct MasterList {
    #[serde(default)]
    servers: Vec<WireServer>,
}

#[derive(Deserialize)]
struct WireServer {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    info: WireInfo,
}

#[derive(Default, Deserialize)]
struct WireInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    map: WireMap,
    #[serde(default)]
    max_clients: Option<u32>,
    #[serde(default)]
    clients: Vec<WireClient>,
}

#[derive(Default, Deserialize)]
struct WireMap {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct WireClient {
    #[serde(default)]
    name: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    skin: Option<WireSkin>,
}

#[derive(Deserialize)]
struct WireSkin {
    #[serde(default)]
    name: String,
}

impl From<WireServer> for ServerRecord {
    fn from(server: WireServer) -> Self {
        let info = server.info;
        let clients: Vec<ClientInfo> = info
            .clients
            .into_iter()
            .map(|c| ClientInfo {
                name: c.name,
                skin: c
                    .skin
                    .map(|s| s.name)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "default".to_string()),
                score: c.score,
            })
            .collect();
        ServerRecord {
            addresses: server.addresses,
            meta: ServerMeta {
                name: non_empty_or(info.name, "Unknown Server"),
                map: non_empty_or(info.map.name, "Unknown Map"),
                client_count: clients.len(),
                max_clients: info.max_clients.unwrap_or(DEFAULT_MAX_CLIENTS),
                location: server.location,
            },
            clients,
        }
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
