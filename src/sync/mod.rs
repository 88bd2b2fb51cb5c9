//! Typed state synchronization over the unreliable channel.

pub mod channel;
pub mod message;

pub use channel::{StatusHook, SyncChannel};
pub use message::SyncMessage;
