//! Wire types for the out-of-band handshake payloads.

use std::io::{Read, Write};

use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::error::HandshakeError;

/// Which side of the match this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No match attempt started yet.
    None,
    /// Created the offer and shared the link.
    Host,
    /// Entered via a join link.
    Guest,
}

/// Handshake coordinator state. `Closed` and `Failed` are terminal; a new
/// session is required to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Offering,
    AwaitingAnswer,
    Open,
    Closed,
    Failed,
}

/// SDP with session metadata.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SdpPayload {
    pub sdp: RTCSessionDescription,
    /// Session id, echoed back in the answer for matching.
    pub id: String,
    pub ts: i64,
}

/// One gathered ICE candidate.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// Complete offer or answer: session description plus every candidate
/// gathered up front. Bundling trades handshake latency for not needing a
/// trickle channel, which does not exist in this design.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OfferBundle {
    pub sdp_payload: SdpPayload,
    pub ice_candidates: Vec<IceCandidate>,
}

impl OfferBundle {
    /// JSON, gzipped, then base64 with the URL-safe alphabet so the blob
    /// can ride inside a query parameter untouched.
    pub fn encode(&self) -> Result<String, HandshakeError> {
        let json = serde_json::to_vec(self).map_err(HandshakeError::Encode)?;
        let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
        gz.write_all(&json)?;
        let compressed = gz.finish()?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(compressed))
    }

    pub fn decode(encoded: &str) -> Result<Self, HandshakeError> {
        let compressed = general_purpose::URL_SAFE_NO_PAD.decode(encoded.trim())?;
        let mut json = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut json)?;
        serde_json::from_slice(&json).map_err(HandshakeError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sdp(kind: &str) -> RTCSessionDescription {
        serde_json::from_value(serde_json::json!({
            "type": kind,
            "sdp": "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
        }))
        .expect("session description from json")
    }

    #[test]
    fn bundle_round_trips_through_encoding() {
        let bundle = OfferBundle {
            sdp_payload: SdpPayload {
                sdp: fake_sdp("offer"),
                id: "abc123".into(),
                ts: 1_700_000_000,
            },
            ice_candidates: vec![IceCandidate {
                candidate: "candidate:1 1 udp 2130706431 192.0.2.1 54321 typ host".into(),
                sdp_mid: Some("0".into()),
                sdp_mline_index: Some(0),
            }],
        };

        let encoded = bundle.encode().expect("encode");
        let decoded = OfferBundle::decode(&encoded).expect("decode");

        assert_eq!(decoded.sdp_payload.id, "abc123");
        assert_eq!(decoded.sdp_payload.ts, 1_700_000_000);
        assert_eq!(decoded.ice_candidates.len(), 1);
        assert_eq!(
            decoded.ice_candidates[0].candidate,
            bundle.ice_candidates[0].candidate
        );
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(OfferBundle::decode("not remotely base64!!!").is_err());
        // valid base64, invalid gzip
        let blob = general_purpose::URL_SAFE_NO_PAD.encode(b"plain text");
        assert!(OfferBundle::decode(&blob).is_err());
    }
}
