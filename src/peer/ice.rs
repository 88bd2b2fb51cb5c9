//! Up-front ICE candidate collection.
//!
//! Candidates are not trickled: the handshake blocks until local gathering
//! finishes (or the configured timeout passes) and ships every candidate
//! inside the offer/answer bundle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::RTCPeerConnection;

use crate::peer::types::IceCandidate;

/// Candidates gathered so far for one transport, filled from the
/// `on_ice_candidate` callback.
#[derive(Debug, Default)]
pub(crate) struct CandidateJar {
    candidates: Vec<IceCandidate>,
    gathering_done: bool,
}

impl CandidateJar {
    pub(crate) fn push(&mut self, candidate: IceCandidate) {
        self.candidates.push(candidate);
    }

    /// A `None` candidate from the stack marks the end of gathering.
    pub(crate) fn mark_done(&mut self) {
        self.gathering_done = true;
    }
}

/// Poll the jar until gathering completes or `timeout` passes. Returns
/// whatever was collected; the caller decides whether an empty result is
/// fatal.
pub(crate) async fn wait_for_candidates(
    jar: &Arc<Mutex<CandidateJar>>,
    timeout: Duration,
) -> Vec<IceCandidate> {
    let start = std::time::Instant::now();

    loop {
        let (done, count) = {
            let jar = jar.lock().unwrap();
            (jar.gathering_done, jar.candidates.len())
        };

        if done {
            debug!(count, elapsed = ?start.elapsed(), "candidate gathering complete");
            break;
        }
        if start.elapsed() >= timeout {
            warn!(count, ?timeout, "candidate gathering timed out");
            break;
        }

        sleep(Duration::from_millis(100)).await;
    }

    jar.lock().unwrap().candidates.clone()
}

/// Log the candidate mix. No srflx candidate means STUN was unreachable and
/// the link will only work on a shared network.
pub(crate) fn analyze_candidates(candidates: &[IceCandidate]) {
    let host = candidates.iter().filter(|c| c.candidate.contains("typ host")).count();
    let srflx = candidates.iter().filter(|c| c.candidate.contains("typ srflx")).count();

    debug!(host, srflx, total = candidates.len(), "gathered candidate mix");
    if srflx == 0 {
        warn!("no server-reflexive candidates; peers behind distinct NATs will not connect");
    }
}

/// Apply remote candidates from a decoded bundle. Individual failures are
/// logged and skipped; a partially applied set can still connect.
pub(crate) async fn apply_candidates(pc: &RTCPeerConnection, candidates: Vec<IceCandidate>) {
    for candidate in candidates {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        if let Err(e) = pc.add_ice_candidate(init).await {
            warn!(error = %e, "failed to apply remote candidate");
        }
    }
}
