//! Data-channel wiring.
//!
//! The channel is unordered with zero retransmits: stale player updates are
//! worthless, so the stack is told to drop instead of resend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;

use crate::peer::transport::TransportEvent;

/// Channel settings matching the sync protocol's loss tolerance.
pub(crate) fn unreliable_init() -> RTCDataChannelInit {
    RTCDataChannelInit {
        ordered: Some(false),
        max_retransmits: Some(0),
        ..Default::default()
    }
}

/// Hook up open/close/message handlers, forwarding everything as
/// [`TransportEvent`]s. The `live` flag is flipped off on teardown and every
/// handler checks it, so a closed transport never leaks late events into a
/// session that already moved on.
pub(crate) fn attach_dc(
    dc: &Arc<RTCDataChannel>,
    events: UnboundedSender<TransportEvent>,
    live: Arc<AtomicBool>,
) {
    dc.on_open(Box::new({
        let events = events.clone();
        let live = live.clone();
        move || {
            debug!("data channel open");
            if live.load(Ordering::SeqCst) {
                let _ = events.send(TransportEvent::ChannelOpen);
            }
            Box::pin(async {})
        }
    }));

    dc.on_close(Box::new({
        let events = events.clone();
        let live = live.clone();
        move || {
            debug!("data channel closed");
            if live.load(Ordering::SeqCst) {
                let _ = events.send(TransportEvent::ChannelClosed);
            }
            Box::pin(async {})
        }
    }));

    dc.on_message(Box::new(move |msg| {
        trace!(len = msg.data.len(), "inbound data channel message");
        if live.load(Ordering::SeqCst) {
            let _ = events.send(TransportEvent::Message(msg.data));
        }
        Box::pin(async {})
    }));
}
