//! Player state as it exists at one instant.

use serde::{Deserialize, Serialize};

use crate::config::PLAYER_START_RADIUS;

/// The most recently known state of one player. The local snapshot is
/// mutated only by the match simulation; the remote one is overwritten
/// wholesale by the sync channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub score: u32,
}

impl PlayerSnapshot {
    /// Fresh player centered at the given point, match-start size.
    pub fn spawn(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            radius: PLAYER_START_RADIUS,
            score: 0,
        }
    }
}
