use serde::{Deserialize, Serialize};

use crate::models::packet::PacketBody;

/// Sent/received pair used for both byte and packet totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Directional {
    pub sent: u64,
    pub received: u64,
}

/// Running traffic totals for a capture session.
///
/// Updated as packets are appended and never recomputed from the buffer,
/// so the totals keep counting packets that were later evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrafficSummary {
    /// Bytes
    pub data: Directional,

    /// Packet counts
    pub packets: Directional,
}

impl TrafficSummary {
    /// Count a packet; synthetic entries leave the totals untouched
    pub fn record(&mut self, body: &PacketBody) {
        match body {
            PacketBody::Send(wire) => {
                self.data.sent = self.data.sent.saturating_add(wire.size as u64);
                self.packets.sent = self.packets.sent.saturating_add(1);
            }
            PacketBody::Receive(wire) => {
                self.data.received = self.data.received.saturating_add(wire.size as u64);
                self.packets.received = self.packets.received.saturating_add(1);
            }
            PacketBody::Summary(_) | PacketBody::Message { .. } => {}
        }
    }

    pub fn total_packets(&self) -> u64 {
        self.packets.sent.saturating_add(self.packets.received)
    }

    pub fn total_bytes(&self) -> u64 {
        self.data.sent.saturating_add(self.data.received)
    }
}
