//! The per-match simulation: absorption resolution and the match clock.

use tracing::{debug, info};

use crate::config::{MATCH_SECONDS, PLAYER_START_RADIUS, REMOTE_ABSORB_ADVANTAGE};
use crate::game::absorption::{
    absorbed_radius, absorption_score, circles_collide, effective_radius, Ambient, EntityId,
};
use crate::game::snapshot::PlayerSnapshot;

/// How a match ends. Reported exactly once; afterwards the engine is inert
/// and the session owner is expected to tear the peer link down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Something bigger got the local player: an ambient circle or the
    /// opponent with a 20% advantage.
    LocalDefeated,
    /// The local player absorbed the opponent.
    LocalVictorious,
    /// The clock ran out with unequal sizes.
    TimeExpired(Verdict),
    /// The clock ran out with exactly equal sizes.
    Tie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    LocalWins,
    RemoteWins,
}

/// What one tick did: ambient circles removed from the active set, plus the
/// terminal transition if this tick caused one.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub absorbed: Vec<EntityId>,
    pub terminal: Option<TerminalEvent>,
}

/// Deterministic absorption engine for one match.
///
/// Both peers run the same rules over their local snapshot and the other
/// side's (possibly stale) synchronized snapshot; the 20% absorption
/// hysteresis is what keeps near-tie collisions from resolving differently
/// on the two sides.
pub struct MatchSession {
    local: PlayerSnapshot,
    remaining_secs: u32,
    terminal: Option<TerminalEvent>,
}

impl MatchSession {
    pub fn new(local: PlayerSnapshot) -> Self {
        Self {
            local,
            remaining_secs: MATCH_SECONDS,
            terminal: None,
        }
    }

    pub fn local(&self) -> &PlayerSnapshot {
        &self.local
    }

    /// The local simulation owns this snapshot; position updates from the
    /// movement integrator land through here.
    pub fn local_mut(&mut self) -> &mut PlayerSnapshot {
        &mut self.local
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn terminal(&self) -> Option<TerminalEvent> {
        self.terminal
    }

    /// Resolve one simulation tick. No-op once the match is terminal.
    ///
    /// Ambient circles first: the larger radius absorbs the smaller, the
    /// player winning exact ties. The first ambient circle to beat the
    /// player ends the tick immediately, so at most one defeat is ever
    /// reported no matter how many circles overlap this frame. The remote
    /// opponent is checked second and only absorbs (or is absorbed) past
    /// the strict 20% advantage threshold.
    pub fn tick(&mut self, ambient: &mut Vec<Ambient>, remote: Option<&PlayerSnapshot>) -> TickReport {
        if self.terminal.is_some() {
            return TickReport::default();
        }

        let mut report = TickReport::default();

        let mut i = ambient.len();
        while i > 0 {
            i -= 1;
            let circle = ambient[i];
            if !circles_collide(
                self.local.x,
                self.local.y,
                self.local.radius,
                circle.x,
                circle.y,
                circle.radius,
            ) {
                continue;
            }

            let player_r = effective_radius(self.local.radius);
            let circle_r = effective_radius(circle.radius);
            if player_r >= circle_r {
                self.local.radius = absorbed_radius(player_r, circle_r);
                self.local.score += absorption_score(circle_r);
                debug!(id = circle.id.0, radius = self.local.radius, "absorbed ambient circle");
                ambient.remove(i);
                report.absorbed.push(circle.id);
            } else {
                info!(id = circle.id.0, "local player absorbed by ambient circle");
                self.terminal = Some(TerminalEvent::LocalDefeated);
                report.terminal = self.terminal;
                return report;
            }
        }

        // A missing remote snapshot means no opponent has reported in yet,
        // not an opponent of size zero.
        if let Some(remote) = remote {
            if circles_collide(
                self.local.x,
                self.local.y,
                self.local.radius,
                remote.x,
                remote.y,
                remote.radius,
            ) {
                if self.local.radius > remote.radius * REMOTE_ABSORB_ADVANTAGE {
                    self.local.radius = absorbed_radius(self.local.radius, remote.radius);
                    self.local.score += absorption_score(remote.radius);
                    info!("local player absorbed the opponent");
                    self.terminal = Some(TerminalEvent::LocalVictorious);
                    report.terminal = self.terminal;
                } else if remote.radius > self.local.radius * REMOTE_ABSORB_ADVANTAGE {
                    info!("opponent absorbed the local player");
                    self.terminal = Some(TerminalEvent::LocalDefeated);
                    report.terminal = self.terminal;
                }
                // sub-threshold collisions are deliberate no-ops: hysteresis
                // against flapping on noisy synchronized data
            }
        }

        report
    }

    /// Advance the match clock by one wall-clock second. Returns the
    /// terminal event if this second exhausted the timer.
    pub fn second_elapsed(&mut self, remote: Option<&PlayerSnapshot>) -> Option<TerminalEvent> {
        if self.terminal.is_some() || self.remaining_secs == 0 {
            return None;
        }

        self.remaining_secs -= 1;
        if self.remaining_secs > 0 {
            return None;
        }

        // An opponent that never reported in counts at starting size.
        let remote_radius = remote.map(|r| r.radius).unwrap_or(PLAYER_START_RADIUS);
        let event = if self.local.radius > remote_radius {
            TerminalEvent::TimeExpired(Verdict::LocalWins)
        } else if self.local.radius < remote_radius {
            TerminalEvent::TimeExpired(Verdict::RemoteWins)
        } else {
            TerminalEvent::Tie
        };
        info!(?event, local = self.local.radius, remote = remote_radius, "match clock expired");
        self.terminal = Some(event);
        self.terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(radius: f64) -> PlayerSnapshot {
        PlayerSnapshot {
            x: 100.0,
            y: 100.0,
            radius,
            score: 0,
        }
    }

    fn circle_at(id: u32, x: f64, y: f64, radius: f64) -> Ambient {
        Ambient {
            id: EntityId(id),
            x,
            y,
            radius,
        }
    }

    #[test]
    fn absorbing_grows_scores_and_removes() {
        let mut game = MatchSession::new(player(20.0));
        let mut circles = vec![circle_at(7, 105.0, 100.0, 10.0)];

        let report = game.tick(&mut circles, None);

        assert_eq!(report.absorbed, vec![EntityId(7)]);
        assert!(report.terminal.is_none());
        assert!(circles.is_empty(), "absorbed identity must leave the active set");
        let expected = (20.0_f64.powi(2) + 0.3 * 10.0_f64.powi(2)).sqrt();
        assert!((game.local().radius - expected).abs() < 1e-12);
        assert_eq!(game.local().score, 10);
    }

    #[test]
    fn absorbed_identity_never_reappears() {
        let mut game = MatchSession::new(player(30.0));
        let mut circles = vec![circle_at(1, 105.0, 100.0, 10.0), circle_at(2, 400.0, 400.0, 5.0)];

        game.tick(&mut circles, None);
        assert!(circles.iter().all(|c| c.id != EntityId(1)));

        // further ticks cannot resurrect it
        let report = game.tick(&mut circles, None);
        assert!(report.absorbed.is_empty());
    }

    #[test]
    fn player_wins_exact_ambient_ties() {
        let mut game = MatchSession::new(player(15.0));
        let mut circles = vec![circle_at(1, 110.0, 100.0, 15.0)];

        let report = game.tick(&mut circles, None);
        assert!(report.terminal.is_none());
        assert_eq!(report.absorbed, vec![EntityId(1)]);
    }

    #[test]
    fn bigger_ambient_circle_defeats_the_player() {
        let mut game = MatchSession::new(player(12.0));
        let mut circles = vec![circle_at(1, 110.0, 100.0, 20.0)];

        let report = game.tick(&mut circles, None);
        assert_eq!(report.terminal, Some(TerminalEvent::LocalDefeated));
        assert_eq!(game.terminal(), Some(TerminalEvent::LocalDefeated));
    }

    #[test]
    fn only_one_defeat_for_two_simultaneous_bigger_circles() {
        let mut game = MatchSession::new(player(10.0));
        let mut circles = vec![
            circle_at(1, 108.0, 100.0, 25.0),
            circle_at(2, 100.0, 108.0, 25.0),
        ];

        let first = game.tick(&mut circles, None);
        assert_eq!(first.terminal, Some(TerminalEvent::LocalDefeated));

        // the latch holds: nothing further is ever reported
        let second = game.tick(&mut circles, None);
        assert_eq!(second, TickReport::default());
    }

    #[test]
    fn remote_absorption_needs_a_strict_20_percent_advantage() {
        // boundary: exactly 1.2x must NOT absorb
        let mut game = MatchSession::new(player(24.0));
        let remote = player(20.0); // 24.0 == 20.0 * 1.2
        let report = game.tick(&mut Vec::new(), Some(&remote));
        assert!(report.terminal.is_none(), "boundary equality is a no-op");

        // just past the threshold absorbs
        let mut game = MatchSession::new(player(24.1));
        let report = game.tick(&mut Vec::new(), Some(&remote));
        assert_eq!(report.terminal, Some(TerminalEvent::LocalVictorious));
        assert_eq!(game.local().score, 20);
    }

    #[test]
    fn remote_with_advantage_defeats_local() {
        let mut game = MatchSession::new(player(15.0));
        let remote = player(18.1); // > 15 * 1.2
        let report = game.tick(&mut Vec::new(), Some(&remote));
        assert_eq!(report.terminal, Some(TerminalEvent::LocalDefeated));
    }

    #[test]
    fn near_tie_remote_collisions_are_no_ops() {
        let mut game = MatchSession::new(player(16.0));
        let remote = player(15.0);
        let report = game.tick(&mut Vec::new(), Some(&remote));
        assert!(report.terminal.is_none());
        assert_eq!(game.local().radius, 16.0, "no growth on a no-op collision");
    }

    #[test]
    fn missing_remote_is_no_opponent_not_radius_zero() {
        // if None were treated as radius 0, any position would "collide"
        let mut game = MatchSession::new(player(50.0));
        let report = game.tick(&mut Vec::new(), None);
        assert!(report.terminal.is_none());
    }

    #[test]
    fn clock_counts_down_and_resolves_by_size() {
        let mut game = MatchSession::new(player(18.0));
        let remote = player(25.4);

        for _ in 0..MATCH_SECONDS - 1 {
            assert!(game.second_elapsed(Some(&remote)).is_none());
        }
        let event = game.second_elapsed(Some(&remote));
        assert_eq!(event, Some(TerminalEvent::TimeExpired(Verdict::RemoteWins)));

        // exactly once: the expired clock reports nothing further
        assert!(game.second_elapsed(Some(&remote)).is_none());
    }

    #[test]
    fn equal_radii_at_expiry_is_a_tie() {
        let mut game = MatchSession::new(player(21.0));
        let remote = player(21.0);
        for _ in 0..MATCH_SECONDS - 1 {
            game.second_elapsed(Some(&remote));
        }
        assert_eq!(game.second_elapsed(Some(&remote)), Some(TerminalEvent::Tie));
    }

    #[test]
    fn silent_opponent_counts_at_starting_size_on_timeout() {
        let mut game = MatchSession::new(player(16.0)); // grew past 15.0
        for _ in 0..MATCH_SECONDS - 1 {
            game.second_elapsed(None);
        }
        assert_eq!(
            game.second_elapsed(None),
            Some(TerminalEvent::TimeExpired(Verdict::LocalWins))
        );
    }

    #[test]
    fn terminal_match_ignores_the_clock() {
        let mut game = MatchSession::new(player(10.0));
        let mut circles = vec![circle_at(1, 105.0, 100.0, 30.0)];
        game.tick(&mut circles, None);
        assert_eq!(game.terminal(), Some(TerminalEvent::LocalDefeated));

        for _ in 0..MATCH_SECONDS + 5 {
            assert!(game.second_elapsed(None).is_none());
        }
    }
}
