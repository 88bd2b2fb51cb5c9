//! Inbound side of the sync protocol.
//!
//! Owns the remote player snapshot: nothing else in the crate writes it.
//! Every inbound `playerUpdate` replaces the snapshot wholesale; there is no
//! field-level merge and no ordering check, so a reordered late packet can
//! transiently regress the apparent remote state. That is an accepted cost
//! of running without acknowledgments.

use tracing::warn;

use crate::game::PlayerSnapshot;
use crate::sync::message::SyncMessage;

/// Hook fed the opponent's radius after each accepted update. Purely
/// presentational; the absorption engine reads the live snapshot instead.
pub type StatusHook = Box<dyn Fn(f64) + Send>;

pub struct SyncChannel {
    remote: Option<PlayerSnapshot>,
    decode_errors: u64,
    status_hook: Option<StatusHook>,
}

impl SyncChannel {
    pub(crate) fn new() -> Self {
        Self {
            remote: None,
            decode_errors: 0,
            status_hook: None,
        }
    }

    /// `None` until the first `playerUpdate` arrives. Absorption logic must
    /// treat that as "no opponent yet", never as a zero-radius opponent.
    pub fn remote(&self) -> Option<PlayerSnapshot> {
        self.remote
    }

    /// Last known opponent radius, the same value the status hook is fed.
    /// `None` before the first update and after a reset.
    pub fn opponent_status(&self) -> Option<f64> {
        self.remote.map(|r| r.radius)
    }

    /// Malformed inbound payloads dropped so far. Diagnostic only.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    pub fn set_status_hook(&mut self, hook: StatusHook) {
        self.status_hook = Some(hook);
    }

    /// Decode one raw inbound message. Player updates are folded into the
    /// remote snapshot here; game events are handed back for the session
    /// owner. Malformed payloads are dropped, counted, and never fatal.
    pub(crate) fn apply_inbound(&mut self, raw: &[u8]) -> Option<(String, serde_json::Value)> {
        match SyncMessage::decode(raw) {
            Ok(SyncMessage::PlayerUpdate { x, y, radius, score }) => {
                self.remote = Some(PlayerSnapshot { x, y, radius, score });
                if let Some(hook) = &self.status_hook {
                    hook(radius);
                }
                None
            }
            Ok(SyncMessage::GameEvent { kind, payload }) => Some((kind, payload)),
            Err(e) => {
                self.decode_errors += 1;
                warn!(error = %e, dropped = self.decode_errors, "dropping malformed sync message");
                None
            }
        }
    }

    /// Forget the opponent. Called by the coordinator on teardown.
    pub(crate) fn reset(&mut self) {
        self.remote = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_update_creates_the_snapshot() {
        let mut ch = SyncChannel::new();
        assert!(ch.remote().is_none());

        ch.apply_inbound(br#"{"type":"playerUpdate","x":12.5,"y":7.0,"radius":22.3,"score":40}"#);
        let remote = ch.remote().expect("snapshot after first update");
        assert_eq!(remote.x, 12.5);
        assert_eq!(remote.y, 7.0);
        assert_eq!(remote.radius, 22.3);
        assert_eq!(remote.score, 40);
    }

    #[test]
    fn updates_replace_the_snapshot_wholesale() {
        let mut ch = SyncChannel::new();
        ch.apply_inbound(br#"{"type":"playerUpdate","x":1.0,"y":2.0,"radius":30.0,"score":9}"#);
        // a "stale" smaller update still wins: latest delivered, not latest sent
        ch.apply_inbound(br#"{"type":"playerUpdate","x":5.0,"y":6.0,"radius":16.0,"score":3}"#);

        let remote = ch.remote().unwrap();
        assert_eq!(remote.radius, 16.0);
        assert_eq!(remote.score, 3);
    }

    #[test]
    fn malformed_payloads_are_counted_not_fatal() {
        let mut ch = SyncChannel::new();
        ch.apply_inbound(b"garbage");
        ch.apply_inbound(br#"{"type":"warp","x":0}"#);
        assert_eq!(ch.decode_errors(), 2);
        assert!(ch.remote().is_none());

        // the channel keeps working on the next valid message
        ch.apply_inbound(br#"{"type":"playerUpdate","x":0.0,"y":0.0,"radius":15.0,"score":0}"#);
        assert!(ch.remote().is_some());
    }

    #[test]
    fn game_events_are_surfaced_not_merged() {
        let mut ch = SyncChannel::new();
        let ev = ch.apply_inbound(br#"{"type":"gameEvent","kind":"absorbed","payload":{"by":"host"}}"#);
        let (kind, payload) = ev.expect("game event surfaced");
        assert_eq!(kind, "absorbed");
        assert_eq!(payload["by"], "host");
        assert!(ch.remote().is_none());
    }

    #[test]
    fn status_hook_sees_the_radius_projection() {
        let seen = Arc::new(AtomicU32::new(0));
        let mut ch = SyncChannel::new();
        ch.set_status_hook(Box::new({
            let seen = seen.clone();
            move |radius| seen.store(radius as u32, Ordering::SeqCst)
        }));

        ch.apply_inbound(br#"{"type":"playerUpdate","x":0.0,"y":0.0,"radius":27.9,"score":1}"#);
        assert_eq!(seen.load(Ordering::SeqCst), 27);
    }

    #[test]
    fn opponent_status_tracks_the_radius_projection() {
        let mut ch = SyncChannel::new();
        assert!(ch.opponent_status().is_none());

        ch.apply_inbound(br#"{"type":"playerUpdate","x":0.0,"y":0.0,"radius":27.9,"score":1}"#);
        assert_eq!(ch.opponent_status(), Some(27.9));

        ch.apply_inbound(br#"{"type":"playerUpdate","x":0.0,"y":0.0,"radius":19.5,"score":2}"#);
        assert_eq!(ch.opponent_status(), Some(19.5));

        ch.reset();
        assert!(ch.opponent_status().is_none());
    }

    #[test]
    fn reset_clears_the_remote() {
        let mut ch = SyncChannel::new();
        ch.apply_inbound(br#"{"type":"playerUpdate","x":0.0,"y":0.0,"radius":15.0,"score":0}"#);
        ch.reset();
        assert!(ch.remote().is_none());
    }
}
