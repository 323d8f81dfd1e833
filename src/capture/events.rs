use serde::Deserialize;
use serde_json::Value;

use crate::models::packet::deserialize_time;

/// An ingestion event as delivered by the transport or the UI.
///
/// Every variant carries the raw event data; parsing happens in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// `{showInlineDetails, packetCacheEnabled}`
    InitOptions(String),
    /// `{packets: [...], removedPackets}` cached by the transport
    InitPacketList(String),
    /// One outgoing protocol message
    SendPacket(String),
    /// One incoming protocol message
    ReceivePacket(String),
    /// Contents of a dump file chosen by the user
    LoadedPacketListFile(String),
}

impl IngestEvent {
    pub const NAMES: [&'static str; 5] = [
        "init-options",
        "init-packet-list",
        "send-packet",
        "receive-packet",
        "loaded-packet-list-file",
    ];

    /// Build an event from its contract name
    pub fn from_name(name: &str, data: String) -> Option<Self> {
        let event = match name {
            "init-options" => IngestEvent::InitOptions(data),
            "init-packet-list" => IngestEvent::InitPacketList(data),
            "send-packet" => IngestEvent::SendPacket(data),
            "receive-packet" => IngestEvent::ReceivePacket(data),
            "loaded-packet-list-file" => IngestEvent::LoadedPacketListFile(data),
            _ => return None,
        };
        Some(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            IngestEvent::InitOptions(_) => "init-options",
            IngestEvent::InitPacketList(_) => "init-packet-list",
            IngestEvent::SendPacket(_) => "send-packet",
            IngestEvent::ReceivePacket(_) => "receive-packet",
            IngestEvent::LoadedPacketListFile(_) => "loaded-packet-list-file",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            IngestEvent::InitOptions(data)
            | IngestEvent::InitPacketList(data)
            | IngestEvent::SendPacket(data)
            | IngestEvent::ReceivePacket(data)
            | IngestEvent::LoadedPacketListFile(data) => data,
        }
    }
}

/// Packet cache handed over when attaching to a running capture
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketCache {
    #[serde(default)]
    pub packets: Option<Vec<CachedPacket>>,

    #[serde(default)]
    pub removed_packets: Option<u64>,
}

/// One entry of a [`PacketCache`]
#[derive(Debug, Clone, Deserialize)]
pub struct CachedPacket {
    #[serde(rename = "type")]
    pub kind: CachedKind,

    pub packet: Value,

    #[serde(deserialize_with = "deserialize_time")]
    pub time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachedKind {
    Send,
    Receive,
}
