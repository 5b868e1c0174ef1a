// src/bridge.rs
//
// Translation core: MQTT command -> CAN frame, CAN frame -> MQTT state.
// No I/O here; the runtime loop in service.rs feeds it.
//
// Tunnel mode: a frame whose outer ID is not in the table may carry the
// real ID in bytes 0..2 (big-endian), followed by up to 6 payload bytes.

use std::sync::Arc;
use thiserror::Error;

use crate::io::{pad_payload, CanMessage, IoError};
use crate::pack::{pack_payload, unpack_payload, PackError};
use crate::settings::SettingsError;
use crate::table::{ConversionTable, Entry, TableError, PAYLOAD_LEN};
use crate::tlog;
use crate::topic::{resolve_command, state_topic};

/// Length of the inner ID prefix of a tunnelled frame
const TUNNEL_HEADER_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("invalid JSON on {topic}: {source}")]
    Json {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot pack {topic}: {source}")]
    Pack {
        topic: String,
        #[source]
        source: PackError,
    },
}

/// A state update ready to publish
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateMessage {
    /// `<topic>/state`
    pub topic: String,
    /// Table ID the frame was matched against (inner ID for tunnelled frames)
    pub can_id: u32,
    /// Compact JSON object
    pub payload: String,
}

pub struct Bridge {
    table: Arc<ConversionTable>,
    tunnel: bool,
}

impl Bridge {
    pub fn new(table: Arc<ConversionTable>, tunnel: bool) -> Self {
        Self { table, tunnel }
    }

    /// Frame for a command publish. `Ok(None)` when the topic is not a
    /// command for a known entry (state topics included).
    pub fn translate_command(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<Option<CanMessage>, BridgeError> {
        let Some(entry) = resolve_command(&self.table, topic) else {
            return Ok(None);
        };

        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|source| BridgeError::Json {
                topic: topic.to_string(),
                source,
            })?;

        let data = pack_payload(entry, &value).map_err(|source| BridgeError::Pack {
            topic: topic.to_string(),
            source,
        })?;

        Ok(Some(CanMessage::new(entry.can_id, &data)))
    }

    /// State update for a received frame, or None when no entry matches.
    pub fn translate_frame(&self, frame: &CanMessage) -> Option<StateMessage> {
        let (entry, data) = self.match_frame(frame)?;

        match unpack_payload(entry, &data) {
            Ok(fields) => Some(StateMessage {
                topic: state_topic(&entry.topic),
                can_id: entry.can_id,
                payload: serde_json::Value::Object(fields).to_string(),
            }),
            Err(e) => {
                tlog!(warn: "Unpack failed for id=0x{:X} ({}): {}", frame.id, entry.topic, e);
                None
            }
        }
    }

    fn match_frame(&self, frame: &CanMessage) -> Option<(&Entry, [u8; PAYLOAD_LEN])> {
        if let Some(entry) = self.table.find_by_id(frame.id) {
            return Some((entry, pad_payload(&frame.data)));
        }

        if !self.tunnel || frame.data.len() < TUNNEL_HEADER_LEN {
            return None;
        }

        let inner_id = u16::from_be_bytes([frame.data[0], frame.data[1]]) as u32;
        let entry = self.table.find_by_id(inner_id)?;
        Some((entry, pad_payload(&frame.data[TUNNEL_HEADER_LEN..])))
    }
}
