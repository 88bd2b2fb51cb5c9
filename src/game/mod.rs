//! The absorption game itself: snapshots, collision math, match rules.

pub mod absorption;
pub mod session;
pub mod snapshot;

pub use absorption::{absorbed_radius, absorption_score, circles_collide, Ambient, EntityId};
pub use session::{MatchSession, TerminalEvent, TickReport, Verdict};
pub use snapshot::PlayerSnapshot;
