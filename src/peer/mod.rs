//! Peer link establishment and ownership.

pub(crate) mod connection;
pub(crate) mod data_channel;
pub(crate) mod ice;
pub mod session;
pub(crate) mod transport;
pub mod types;

pub use session::{PeerSession, SessionEvent};
pub use types::{ConnectionState, IceCandidate, OfferBundle, Role, SdpPayload};
