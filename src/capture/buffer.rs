use chrono::{DateTime, Utc};
use log::{trace, warn};
use std::collections::VecDeque;

use crate::models::packet::{Packet, PacketBody};

/// Bounded, ordered log of captured packets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureBuffer {
    /// Packets in capture order
    packets: VecDeque<Packet>,

    /// Id of the most recently appended packet (0 when nothing was appended)
    unique_id: u64,

    /// Number of packets dropped because of the capacity limit
    removed_packets: u64,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a buffer from previously persisted parts
    pub fn from_parts(packets: Vec<Packet>, unique_id: u64, removed_packets: u64) -> Self {
        Self {
            packets: packets.into(),
            unique_id,
            removed_packets,
        }
    }

    /// Append a packet at the tail, then evict from the head until the
    /// buffer fits in `limit`. Returns the id assigned to the new packet,
    /// or `None` (leaving the buffer untouched) once ids are exhausted.
    pub fn append(&mut self, time: DateTime<Utc>, body: PacketBody, limit: usize) -> Option<u64> {
        let Some(id) = self.unique_id.checked_add(1) else {
            warn!("Packet id space exhausted at {}", self.unique_id);
            return None;
        };
        self.unique_id = id;
        self.packets.push_back(Packet { id, time, body });

        while self.packets.len() > limit {
            if let Some(evicted) = self.packets.pop_front() {
                trace!("Evicted packet {} to stay within limit {}", evicted.id, limit);
            }
            self.removed_packets = self.removed_packets.saturating_add(1);
        }

        Some(id)
    }

    pub fn packets(&self) -> &VecDeque<Packet> {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }

    pub fn removed_packets(&self) -> u64 {
        self.removed_packets
    }

    /// Overwrite the eviction count (used when importing a transport cache)
    pub fn set_removed_packets(&mut self, removed: u64) {
        self.removed_packets = removed;
    }
}
