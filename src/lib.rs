//! Core of a two-player "absorb the other circle" game played over a
//! direct WebRTC link, with no signaling server anywhere.
//!
//! The host generates an offer with all ICE candidates bundled in, encodes
//! it into a join link, and hands that link to the other player by any
//! out-of-band means. The guest decodes it, answers locally, and the
//! transports try to connect on their own. Player state then flows both
//! ways over an unordered, no-retransmit data channel as whole-snapshot
//! updates, and an identical absorption rule set on both sides decides who
//! eats whom.
//!
//! Three layers, wired by the embedder:
//!
//! - [`PeerSession`]: the handshake coordinator and transport owner.
//!   Drive it with [`PeerSession::poll_event`] between simulation ticks.
//! - [`sync`]: the typed message vocabulary and the latest-wins remote
//!   snapshot.
//! - [`MatchSession`]: the deterministic absorption engine and match
//!   clock. Its terminal events are the cue to call
//!   [`PeerSession::disconnect`].
//!
//! Rendering, input handling, and ambient-circle physics live outside this
//! crate; they interact through [`PlayerSnapshot`], [`game::Ambient`], and
//! the event types re-exported below.

pub mod config;
pub mod error;
pub mod game;
pub mod link;
pub mod peer;
pub mod sync;

pub use config::TransportConfig;
pub use error::HandshakeError;
pub use game::{Ambient, EntityId, MatchSession, PlayerSnapshot, TerminalEvent, TickReport, Verdict};
pub use peer::{ConnectionState, OfferBundle, PeerSession, Role, SessionEvent};
pub use sync::{SyncChannel, SyncMessage};
