use serde::{Deserialize, Serialize};

use super::whiteboard::Stroke;
use crate::error::Result;

/// Broadcast data-channel messages. UTF-8 JSON on the wire with a `type`
/// discriminator; field names follow the wire's camelCase convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataMessage {
    /// Tutor-authored permission update for one student.
    #[serde(rename = "perm", rename_all = "camelCase")]
    Perm {
        student_id: String,
        hear: bool,
        speak: bool,
    },

    /// Append one stroke to `author`'s board. Sent exactly once per drawn
    /// stroke; receivers do not dedupe.
    #[serde(rename = "wbstroke")]
    WbStroke { author: String, stroke: Stroke },

    /// Wholesale replace of `author`'s board.
    #[serde(rename = "wb_sync")]
    WbSync { author: String, strokes: Vec<Stroke> },

    /// Ask whoever *is* `author` to broadcast a full WbSync.
    #[serde(rename = "wb_request")]
    WbRequest { author: String },

    /// Reset `author`'s board to empty.
    #[serde(rename = "wb_clear")]
    WbClear { author: String },
}

impl DataMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Defensive decode: malformed or unknown payloads are dropped with a
    /// debug log, never surfaced as an error. Unknown `type` values are how
    /// forward compatibility works here.
    pub fn decode(payload: &[u8]) -> Option<DataMessage> {
        match serde_json::from_slice(payload) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable data message");
                None
            }
        }
    }
}
