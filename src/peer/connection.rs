//! Peer connection construction and lifecycle handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::{TransportConfig, DATA_CHANNEL_LABEL};
use crate::error::HandshakeError;
use crate::peer::data_channel::{attach_dc, unreliable_init};
use crate::peer::ice::CandidateJar;
use crate::peer::transport::TransportEvent;
use crate::peer::types::IceCandidate;

/// Everything `Transport` needs to own after construction.
pub(crate) struct PeerParts {
    pub pc: Arc<RTCPeerConnection>,
    pub dc: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    pub jar: Arc<Mutex<CandidateJar>>,
    pub grace_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Build a peer connection; the initiator also creates the data channel,
/// the receiver waits for it to arrive with the offer.
pub(crate) async fn new_peer(
    initiator: bool,
    config: &TransportConfig,
    events: UnboundedSender<TransportEvent>,
    live: Arc<AtomicBool>,
) -> Result<PeerParts, HandshakeError> {
    let api = APIBuilder::new().build();
    let pc = Arc::new(api.new_peer_connection(rtc_config(config)).await?);

    let jar = Arc::new(Mutex::new(CandidateJar::default()));
    let grace_task: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));

    pc.on_ice_candidate(Box::new({
        let jar = jar.clone();
        move |cand: Option<RTCIceCandidate>| {
            match cand {
                Some(c) => {
                    if let Ok(init) = c.to_json() {
                        debug!(candidate = %init.candidate, "gathered local candidate");
                        jar.lock().unwrap().push(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                        });
                    }
                }
                // a null candidate marks the end of gathering
                None => jar.lock().unwrap().mark_done(),
            }
            Box::pin(async {})
        }
    }));

    pc.on_ice_gathering_state_change(Box::new(|state| {
        debug!(?state, "ice gathering state");
        Box::pin(async {})
    }));

    let pc_state = pc.clone();
    let grace_period = config.grace_period;
    pc.on_peer_connection_state_change(Box::new({
        let events = events.clone();
        let live = live.clone();
        let grace_task = grace_task.clone();
        move |st: RTCPeerConnectionState| {
            info!(state = ?st, "peer connection state");
            match st {
                RTCPeerConnectionState::Connected => {
                    // a recovery cancels any pending fault declaration
                    if let Some(handle) = grace_task.lock().unwrap().take() {
                        debug!("connection recovered, aborting grace task");
                        handle.abort();
                    }
                }

                RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Failed => {
                    let mut slot = grace_task.lock().unwrap();
                    if slot.is_some() {
                        return Box::pin(async {});
                    }
                    warn!(state = ?st, grace = ?grace_period, "connection trouble, starting grace period");
                    let pc = pc_state.clone();
                    let events = events.clone();
                    let live = live.clone();
                    *slot = Some(tokio::spawn(async move {
                        sleep(grace_period).await;
                        if pc.connection_state() != RTCPeerConnectionState::Connected
                            && live.load(Ordering::SeqCst)
                        {
                            warn!("grace period expired without recovery");
                            let _ = events.send(TransportEvent::ChannelClosed);
                        }
                    }));
                }

                RTCPeerConnectionState::Closed => {
                    if let Some(handle) = grace_task.lock().unwrap().take() {
                        handle.abort();
                    }
                    if live.load(Ordering::SeqCst) {
                        let _ = events.send(TransportEvent::ChannelClosed);
                    }
                }

                _ => {}
            }
            Box::pin(async {})
        }
    }));

    let dc_slot: Arc<Mutex<Option<Arc<RTCDataChannel>>>> = Arc::new(Mutex::new(None));
    if initiator {
        let dc = pc
            .create_data_channel(DATA_CHANNEL_LABEL, Some(unreliable_init()))
            .await?;
        attach_dc(&dc, events, live);
        *dc_slot.lock().unwrap() = Some(dc);
    } else {
        pc.on_data_channel(Box::new({
            let dc_slot = dc_slot.clone();
            move |dc: Arc<RTCDataChannel>| {
                debug!(label = dc.label(), "remote data channel arrived");
                attach_dc(&dc, events.clone(), live.clone());
                *dc_slot.lock().unwrap() = Some(dc);
                Box::pin(async {})
            }
        }));
    }

    Ok(PeerParts {
        pc,
        dc: dc_slot,
        jar,
        grace_task,
    })
}

fn rtc_config(config: &TransportConfig) -> RTCConfiguration {
    // an empty server list is legal: host-candidate-only, same-network play
    let ice_servers = if config.ice_servers.is_empty() {
        Vec::new()
    } else {
        vec![RTCIceServer {
            urls: config.ice_servers.clone(),
            ..Default::default()
        }]
    };

    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}
