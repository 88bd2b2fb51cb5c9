//! Tunables for the transport layer and the match rules.

use std::time::Duration;

/// Public STUN servers used when the embedder supplies none.
pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Label of the game data channel.
pub const DATA_CHANNEL_LABEL: &str = "circularity-data";

/// Radius assumed for a circle whose radius was never set.
pub const DEFAULT_CIRCLE_RADIUS: f64 = 10.0;

/// Radius every player starts the match with.
pub const PLAYER_START_RADIUS: f64 = 15.0;

/// Fraction of the absorbed circle's area gained by the absorber.
pub const ABSORB_AREA_GAIN: f64 = 0.3;

/// Size advantage required before one player may absorb the other:
/// strictly greater than `other * 1.2`. Ties and near-ties are no-ops.
pub const REMOTE_ABSORB_ADVANTAGE: f64 = 1.2;

/// Match length in simulated seconds.
pub const MATCH_SECONDS: u32 = 60;

/// Transport-level settings, one value per [`crate::PeerSession`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// ICE server URLs. STUN only; relay discovery is out of scope.
    pub ice_servers: Vec<String>,
    /// Upper bound on the up-front candidate gathering wait.
    pub gather_timeout: Duration,
    /// How long a wobbling connection may sit in `disconnected`/`failed`
    /// before the transport declares it dead.
    pub grace_period: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            gather_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(10),
        }
    }
}
