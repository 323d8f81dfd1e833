use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::stats::TrafficSummary;

/// A single captured protocol message or store-generated entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Unique identifier, assigned when the packet enters the buffer
    pub id: u64,

    /// Capture time (send/receive) or synthesis time (summary/message)
    #[serde(deserialize_with = "deserialize_time")]
    pub time: DateTime<Utc>,

    /// Kind-specific content, flattened next to `id` and `time`
    #[serde(flatten)]
    pub body: PacketBody,
}

/// What a packet carries, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PacketBody {
    /// Message sent from the client to the debugging target
    Send(WirePacket),

    /// Message received from the debugging target
    Receive(WirePacket),

    /// Snapshot of the traffic totals
    Summary(TrafficSummary),

    /// Free-form note inserted into the list
    Message { message: Value },
}

/// A decoded protocol message together with its raw size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePacket {
    /// Decoded message (normally an object with `to`/`from`/`type`)
    pub packet: Value,

    /// Byte length of the undecoded message
    pub size: usize,
}

impl WirePacket {
    pub fn new(packet: Value, size: usize) -> Self {
        Self { packet, size }
    }

    /// Destination actor
    pub fn to(&self) -> Option<&str> {
        self.str_field("to")
    }

    /// Source actor
    pub fn from(&self) -> Option<&str> {
        self.str_field("from")
    }

    /// Protocol message type tag
    pub fn message_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// `to` when present and non-empty, otherwise `from`
    pub fn routing_address(&self) -> Option<&str> {
        self.to().filter(|to| !to.is_empty()).or_else(|| self.from())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.packet.get(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> bool {
        self.packet.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl PacketBody {
    /// Name used for the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            PacketBody::Send(_) => "send",
            PacketBody::Receive(_) => "receive",
            PacketBody::Summary(_) => "summary",
            PacketBody::Message { .. } => "message",
        }
    }

    /// Wire content for send/receive packets
    pub fn wire(&self) -> Option<&WirePacket> {
        match self {
            PacketBody::Send(wire) | PacketBody::Receive(wire) => Some(wire),
            _ => None,
        }
    }
}

/// Accepts RFC 3339 strings as well as epoch milliseconds.
pub fn deserialize_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTime {
        Millis(i64),
        Text(String),
    }

    match RawTime::deserialize(deserializer)? {
        RawTime::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
        RawTime::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
    }
}
