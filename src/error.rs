//! Error taxonomy for the handshake path.
//!
//! Only offer/answer negotiation surfaces errors to the caller. Transport
//! faults mid-session arrive as [`crate::SessionEvent::Disconnected`], and
//! malformed sync messages are dropped and counted inside the sync channel;
//! neither ever becomes a `Result` failure.

use std::time::Duration;

use thiserror::Error;

use crate::peer::types::ConnectionState;

/// Failure while producing or consuming an offer/answer payload.
///
/// All variants are retryable in the sense of the UI showing a
/// "connection failed" state; the session that produced one is discarded.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("session is {0:?}, operation requires idle")]
    NotIdle(ConnectionState),

    #[error("session is {0:?}, operation requires awaiting-answer")]
    NotAwaitingAnswer(ConnectionState),

    #[error("webrtc: {0}")]
    Webrtc(#[from] webrtc::Error),

    #[error("payload encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("payload decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("no ICE candidates gathered within {0:?}")]
    CandidateTimeout(Duration),

    #[error("local description missing after negotiation")]
    MissingDescription,

    #[error("payload belongs to session {got}, this session is {expected}")]
    SessionMismatch { expected: String, got: String },

    #[error("join link carries no usable offer")]
    InvalidLink,
}
