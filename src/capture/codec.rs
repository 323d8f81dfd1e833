//! Dump file format for saving and restoring a capture session.
//!
//! A dump is a JSON object carrying a format tag plus the session fields:
//!
//! ```json
//! {
//!   "!format!": "rdp-inspector/packets-store/v1",
//!   "packets": [...],
//!   "summary": {"data": {...}, "packets": {...}},
//!   "uniqueId": 42,
//!   "removedPackets": 3
//! }
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::capture::buffer::CaptureBuffer;
use crate::models::packet::Packet;
use crate::models::stats::TrafficSummary;
use crate::utils::error::{AppError, AppResult};

/// Format tag identifying the dump layout and version
pub const DUMP_FORMAT_VERSION: &str = "rdp-inspector/packets-store/v1";

/// Key holding the format tag
pub const DUMP_FORMAT_KEY: &str = "!format!";

/// Everything needed to restore a capture session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSession {
    pub buffer: CaptureBuffer,
    pub summary: TrafficSummary,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
struct DumpOut<'a> {
    #[serde(rename = "!format!")]
    format: &'static str,
    packets: &'a VecDeque<Packet>,
    summary: &'a TrafficSummary,
    #[serde(rename = "uniqueId")]
    unique_id: u64,
    #[serde(rename = "removedPackets")]
    removed_packets: u64,
}

#[derive(Deserialize)]
struct DumpIn {
    packets: Vec<Packet>,
    summary: TrafficSummary,
    #[serde(rename = "uniqueId")]
    unique_id: u64,
    #[serde(rename = "removedPackets")]
    removed_packets: u64,
}

/// Serialize a session into dump text
pub fn encode(session: &CaptureSession) -> AppResult<String> {
    let dump = DumpOut {
        format: DUMP_FORMAT_VERSION,
        packets: session.buffer.packets(),
        summary: &session.summary,
        unique_id: session.buffer.unique_id(),
        removed_packets: session.buffer.removed_packets(),
    };

    Ok(serde_json::to_string(&dump)?)
}

/// Parse dump text into a new session.
///
/// Nothing is returned unless the whole document is valid, so callers can
/// keep their current session on error.
pub fn decode(text: &str) -> AppResult<CaptureSession> {
    let document: Value = serde_json::from_str(text)?;

    let found = document.get(DUMP_FORMAT_KEY).and_then(Value::as_str);
    if found != Some(DUMP_FORMAT_VERSION) {
        warn!("Rejecting dump with format tag {:?}", found);
        return Err(AppError::FormatMismatch {
            found: found.map(str::to_owned),
            expected: DUMP_FORMAT_VERSION,
        });
    }

    let dump: DumpIn = serde_json::from_value(document)?;
    validate(&dump)?;
    debug!(
        "Decoded dump: {} packets, last id {}, {} removed",
        dump.packets.len(),
        dump.unique_id,
        dump.removed_packets
    );

    Ok(CaptureSession {
        buffer: CaptureBuffer::from_parts(dump.packets, dump.unique_id, dump.removed_packets),
        summary: dump.summary,
    })
}

/// Packet ids must be strictly increasing and never ahead of the counter
fn validate(dump: &DumpIn) -> AppResult<()> {
    if let Some(pair) = dump.packets.windows(2).find(|pair| pair[0].id >= pair[1].id) {
        return Err(AppError::InvalidDump(format!(
            "packet id {} follows packet id {}",
            pair[1].id, pair[0].id
        )));
    }

    if let Some(last) = dump.packets.last() {
        if last.id > dump.unique_id {
            return Err(AppError::InvalidDump(format!(
                "packet id {} is past uniqueId {}",
                last.id, dump.unique_id
            )));
        }
    }

    Ok(())
}
