//! The wire vocabulary of the sync protocol.
//!
//! JSON text with a `type` tag, readable by a browser peer on the other
//! end. The format carries no version, sequence number, or timestamp:
//! the channel is unordered and unacknowledged, and the merge policy is
//! latest-delivered-wins regardless of send order.

use serde::{Deserialize, Serialize};

use crate::game::PlayerSnapshot;

/// Everything that may cross the data channel. A new message kind is a new
/// variant here; decoding matches exhaustively, so forgetting to handle one
/// is a compile error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Whole-snapshot broadcast of the local player, sent every tick.
    PlayerUpdate {
        x: f64,
        y: f64,
        radius: f64,
        score: u32,
    },
    /// Out-of-band game notification (absorption announcements and the
    /// like). The payload shape is the sender's business.
    GameEvent {
        kind: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl SyncMessage {
    pub fn player_update(snapshot: &PlayerSnapshot) -> Self {
        Self::PlayerUpdate {
            x: snapshot.x,
            y: snapshot.y,
            radius: snapshot.radius,
            score: snapshot.score,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
