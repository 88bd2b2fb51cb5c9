//! Transport: ownership of one peer connection and its data channel.
//!
//! The transport never interprets payloads. It raises [`TransportEvent`]s
//! into the coordinator's queue and offers fire-and-forget sending; loss and
//! reordering are the sync layer's problem by design.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::TransportConfig;
use crate::error::HandshakeError;
use crate::peer::connection::new_peer;
use crate::peer::ice::{analyze_candidates, apply_candidates, wait_for_candidates, CandidateJar};
use crate::peer::types::{OfferBundle, SdpPayload};

/// What the lower layers report upward. Consumed by
/// [`crate::PeerSession::poll_event`].
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// The data channel is open on this side; the link is usable.
    ChannelOpen,
    /// The link is gone: remote close, failure past the grace period, or
    /// explicit shutdown of the underlying connection.
    ChannelClosed,
    /// Raw serialized sync message.
    Message(Bytes),
}

/// One peer link. Built per session attempt, torn down with it.
pub(crate) struct Transport {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    jar: Arc<Mutex<CandidateJar>>,
    grace_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    live: Arc<AtomicBool>,
    session_id: String,
    gather_timeout: Duration,
}

impl Transport {
    /// Build the peer connection. `initiator` decides who creates the data
    /// channel; the receiver registers for its arrival instead.
    pub(crate) async fn connect(
        initiator: bool,
        session_id: String,
        config: &TransportConfig,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<Self, HandshakeError> {
        let live = Arc::new(AtomicBool::new(true));
        let parts = new_peer(initiator, config, events, live.clone()).await?;

        Ok(Self {
            pc: parts.pc,
            dc: parts.dc,
            jar: parts.jar,
            grace_task: parts.grace_task,
            live,
            session_id,
            gather_timeout: config.gather_timeout,
        })
    }

    /// Create the local offer, wait out candidate gathering, and bundle the
    /// lot for out-of-band sharing. Zero candidates at the deadline means
    /// the handshake cannot possibly succeed, so it fails here.
    pub(crate) async fn create_offer_bundle(&self) -> Result<OfferBundle, HandshakeError> {
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer).await?;

        let candidates = wait_for_candidates(&self.jar, self.gather_timeout).await;
        if candidates.is_empty() {
            return Err(HandshakeError::CandidateTimeout(self.gather_timeout));
        }
        analyze_candidates(&candidates);

        Ok(OfferBundle {
            sdp_payload: SdpPayload {
                sdp: self
                    .pc
                    .local_description()
                    .await
                    .ok_or(HandshakeError::MissingDescription)?,
                id: self.session_id.clone(),
                ts: chrono::Utc::now().timestamp(),
            },
            ice_candidates: candidates,
        })
    }

    /// Apply a remote offer and produce the local answer bundle. The answer
    /// carries the offer's session id so the host can match it later.
    pub(crate) async fn accept_offer_bundle(
        &self,
        bundle: OfferBundle,
    ) -> Result<OfferBundle, HandshakeError> {
        self.pc.set_remote_description(bundle.sdp_payload.sdp).await?;
        apply_candidates(&self.pc, bundle.ice_candidates).await;

        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer).await?;

        let candidates = wait_for_candidates(&self.jar, self.gather_timeout).await;
        if candidates.is_empty() {
            return Err(HandshakeError::CandidateTimeout(self.gather_timeout));
        }
        analyze_candidates(&candidates);

        Ok(OfferBundle {
            sdp_payload: SdpPayload {
                sdp: self
                    .pc
                    .local_description()
                    .await
                    .ok_or(HandshakeError::MissingDescription)?,
                id: self.session_id.clone(),
                ts: chrono::Utc::now().timestamp(),
            },
            ice_candidates: candidates,
        })
    }

    /// Apply a remote answer bundle on the offering side.
    pub(crate) async fn apply_remote_bundle(
        &self,
        bundle: OfferBundle,
    ) -> Result<(), HandshakeError> {
        self.pc.set_remote_description(bundle.sdp_payload.sdp).await?;
        apply_candidates(&self.pc, bundle.ice_candidates).await;
        Ok(())
    }

    /// Best-effort send. Returns whether the message was handed to the
    /// stack; delivery is never acknowledged.
    pub(crate) async fn send(&self, text: String) -> bool {
        let dc = { self.dc.lock().unwrap().clone() };
        match dc {
            Some(dc) if dc.ready_state() == RTCDataChannelState::Open => {
                match dc.send_text(text).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(error = %e, "data channel send failed");
                        false
                    }
                }
            }
            _ => false,
        }
    }

    /// Tear the link down. Flips the liveness flag first so no callback
    /// fired during shutdown reaches the session.
    pub(crate) async fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(handle) = self.grace_task.lock().unwrap().take() {
            handle.abort();
        }

        let dc = { self.dc.lock().unwrap().take() };
        if let Some(dc) = dc {
            let _ = dc.close().await;
        }
        if let Err(e) = self.pc.close().await {
            debug!(error = %e, "peer connection close");
        }
    }
}
