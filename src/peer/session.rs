//! The handshake coordinator: one `PeerSession` per match attempt.
//!
//! All connection state lives in this object; there are no process-wide
//! singletons, so tests (and embedders) can run independent sessions side
//! by side. Transitions happen only on the owner's task: transport
//! callbacks enqueue [`TransportEvent`]s and [`PeerSession::poll_event`]
//! folds them into the state machine between simulation ticks.

use std::collections::VecDeque;

use rand::Rng;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace};

use crate::config::TransportConfig;
use crate::error::HandshakeError;
use crate::game::PlayerSnapshot;
use crate::link;
use crate::peer::transport::{Transport, TransportEvent};
use crate::peer::types::{ConnectionState, OfferBundle, Role};
use crate::sync::{SyncChannel, SyncMessage};

/// Notifications for the session owner, drained via
/// [`PeerSession::poll_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The shareable join link is ready to hand to the other player.
    OfferReady(String),
    /// The data channel opened; sync traffic may flow. Fires exactly once
    /// per successful open.
    Connected,
    /// The link is gone: remote close, transport fault, or local
    /// disconnect. Fires at most once per session and is never followed by
    /// further sync events.
    Disconnected,
    /// A remote `gameEvent` message arrived.
    GameEvent {
        kind: String,
        payload: serde_json::Value,
    },
}

pub struct PeerSession {
    id: String,
    link_base: String,
    config: TransportConfig,
    role: Role,
    state: ConnectionState,
    transport: Option<Transport>,
    /// The guest's locally generated answer. There is no return path to
    /// deliver it: the embedder may ferry it out-of-band to the host's
    /// [`PeerSession::accept_answer`], and nothing here ever will.
    pending_answer: Option<String>,
    sync: SyncChannel,
    pending_events: VecDeque<SessionEvent>,
    transport_tx: UnboundedSender<TransportEvent>,
    transport_rx: UnboundedReceiver<TransportEvent>,
}

impl PeerSession {
    /// `link_base` is the page origin + path that join links are built on.
    pub fn new(link_base: impl Into<String>) -> Self {
        Self::with_config(link_base, TransportConfig::default())
    }

    pub fn with_config(link_base: impl Into<String>, config: TransportConfig) -> Self {
        let (transport_tx, transport_rx) = unbounded_channel();
        Self {
            id: random_id(),
            link_base: link_base.into(),
            config,
            role: Role::None,
            state: ConnectionState::Idle,
            transport: None,
            pending_answer: None,
            sync: SyncChannel::new(),
            pending_events: VecDeque::new(),
            transport_tx,
            transport_rx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The sync channel, for the status hook and diagnostics.
    pub fn sync_mut(&mut self) -> &mut SyncChannel {
        &mut self.sync
    }

    /// Latest remote snapshot, `None` until the opponent first reports in.
    pub fn remote_snapshot(&self) -> Option<PlayerSnapshot> {
        self.sync.remote()
    }

    /// The guest's undelivered answer, encoded for out-of-band transfer.
    pub fn pending_answer(&self) -> Option<&str> {
        self.pending_answer.as_deref()
    }

    /// Host a match: create the transport and its data channel, generate
    /// the offer, wait out candidate gathering, and return the shareable
    /// join link. `Idle → Offering → AwaitingAnswer`, or `Failed` if offer
    /// generation or gathering fails.
    pub async fn host_game(&mut self) -> Result<String, HandshakeError> {
        if self.state != ConnectionState::Idle {
            return Err(HandshakeError::NotIdle(self.state));
        }
        self.role = Role::Host;
        self.state = ConnectionState::Offering;
        info!(session = %self.id, "hosting: generating offer");

        match self.start_host().await {
            Ok(link) => {
                self.state = ConnectionState::AwaitingAnswer;
                self.pending_events
                    .push_back(SessionEvent::OfferReady(link.clone()));
                info!(session = %self.id, "offer ready, awaiting answer");
                Ok(link)
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn start_host(&mut self) -> Result<String, HandshakeError> {
        let transport = Transport::connect(
            true,
            self.id.clone(),
            &self.config,
            self.transport_tx.clone(),
        )
        .await?;

        let encoded = match transport.create_offer_bundle().await {
            Ok(bundle) => match bundle.encode() {
                Ok(encoded) => encoded,
                Err(e) => {
                    transport.close().await;
                    return Err(e);
                }
            },
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        };

        self.transport = Some(transport);
        Ok(link::share_link(&self.link_base, &encoded))
    }

    /// Join a match from a shared offer. Generates a local answer that is
    /// stored, not transmitted (see [`PeerSession::pending_answer`]). The
    /// connection only opens if lower-level connectivity succeeds on its
    /// own or the answer is ferried to the host externally.
    /// `Idle → AwaitingAnswer`, or `Failed` past the decode step.
    pub async fn join_game(&mut self, encoded_offer: &str) -> Result<(), HandshakeError> {
        if self.state != ConnectionState::Idle {
            return Err(HandshakeError::NotIdle(self.state));
        }
        // A bad link must not poison the session; decode before any
        // transition so the caller can fall back to single player.
        let bundle = OfferBundle::decode(encoded_offer)?;

        self.role = Role::Guest;
        // join adopts the host's session id so the answer can be matched
        self.id = bundle.sdp_payload.id.clone();
        info!(session = %self.id, "joining from shared offer");

        match self.start_guest(bundle).await {
            Ok(answer) => {
                self.pending_answer = Some(answer);
                self.state = ConnectionState::AwaitingAnswer;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    async fn start_guest(&mut self, bundle: OfferBundle) -> Result<String, HandshakeError> {
        let transport = Transport::connect(
            false,
            self.id.clone(),
            &self.config,
            self.transport_tx.clone(),
        )
        .await?;

        let encoded = match transport.accept_offer_bundle(bundle).await {
            Ok(answer) => match answer.encode() {
                Ok(encoded) => encoded,
                Err(e) => {
                    transport.close().await;
                    return Err(e);
                }
            },
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        };

        self.transport = Some(transport);
        Ok(encoded)
    }

    /// Page-load entry: if `url` carries an offer, join it. `Ok(false)`
    /// means no offer was present; a present-but-unusable offer surfaces as
    /// [`HandshakeError::InvalidLink`].
    pub async fn join_from_link(&mut self, url: &str) -> Result<bool, HandshakeError> {
        match link::offer_param(url) {
            None => Ok(false),
            Some(raw) => match self.join_game(raw).await {
                Ok(()) => Ok(true),
                Err(
                    HandshakeError::Decode(_)
                    | HandshakeError::Base64(_)
                    | HandshakeError::Compression(_),
                ) => Err(HandshakeError::InvalidLink),
                Err(e) => Err(e),
            },
        }
    }

    /// Host side: apply an answer delivered by some external means. This is
    /// the explicit out-of-band hook; the system never invokes it itself.
    pub async fn accept_answer(&mut self, encoded_answer: &str) -> Result<(), HandshakeError> {
        if self.state != ConnectionState::AwaitingAnswer {
            return Err(HandshakeError::NotAwaitingAnswer(self.state));
        }
        let bundle = OfferBundle::decode(encoded_answer)?;
        if bundle.sdp_payload.id != self.id {
            return Err(HandshakeError::SessionMismatch {
                expected: self.id.clone(),
                got: bundle.sdp_payload.id,
            });
        }

        match &self.transport {
            Some(transport) => transport.apply_remote_bundle(bundle).await,
            // defensively unreachable: AwaitingAnswer implies a transport
            None => Err(HandshakeError::NotAwaitingAnswer(self.state)),
        }
    }

    /// Broadcast the local snapshot. Best-effort and silent: when the
    /// session is not open (including disconnect races) this is a no-op,
    /// never an error.
    pub async fn publish(&self, snapshot: &PlayerSnapshot) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(transport) = &self.transport else {
            return;
        };
        match SyncMessage::player_update(snapshot).encode() {
            Ok(text) => {
                transport.send(text).await;
            }
            Err(e) => trace!(error = %e, "snapshot encode failed"),
        }
    }

    /// Send a `gameEvent` message. Same best-effort contract as
    /// [`PeerSession::publish`].
    pub async fn publish_game_event(&self, kind: &str, payload: serde_json::Value) {
        if self.state != ConnectionState::Open {
            return;
        }
        let Some(transport) = &self.transport else {
            return;
        };
        let message = SyncMessage::GameEvent {
            kind: kind.to_string(),
            payload,
        };
        if let Ok(text) = message.encode() {
            transport.send(text).await;
        }
    }

    /// Fold queued transport activity into the state machine and hand the
    /// next owner-visible event back. Call between simulation ticks.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        if let Some(event) = self.pending_events.pop_front() {
            return Some(event);
        }

        while let Ok(event) = self.transport_rx.try_recv() {
            match event {
                TransportEvent::ChannelOpen => {
                    if matches!(
                        self.state,
                        ConnectionState::Offering | ConnectionState::AwaitingAnswer
                    ) {
                        self.state = ConnectionState::Open;
                        info!(session = %self.id, "peer link open");
                        return Some(SessionEvent::Connected);
                    }
                    debug!(state = ?self.state, "ignoring channel open outside handshake");
                }

                TransportEvent::ChannelClosed => {
                    if self.state != ConnectionState::Closed {
                        self.teardown_in_place();
                        return Some(SessionEvent::Disconnected);
                    }
                }

                TransportEvent::Message(data) => {
                    // a torn-down session must not apply late messages
                    if self.state != ConnectionState::Open {
                        trace!(state = ?self.state, "dropping message outside open state");
                        continue;
                    }
                    if let Some((kind, payload)) = self.sync.apply_inbound(&data) {
                        return Some(SessionEvent::GameEvent { kind, payload });
                    }
                }
            }
        }

        None
    }

    /// Tear the session down. Idempotent and safe from any state, including
    /// mid-handshake; at most one [`SessionEvent::Disconnected`] is ever
    /// produced per session.
    pub async fn disconnect(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.sync.reset();

        if self.state != ConnectionState::Closed {
            info!(session = %self.id, from = ?self.state, "session closed");
            self.state = ConnectionState::Closed;
            self.pending_events.push_back(SessionEvent::Disconnected);
        }
    }

    /// Synchronous teardown for the event path: the transport is closed on
    /// a background task since `poll_event` cannot await.
    fn teardown_in_place(&mut self) {
        if let Some(transport) = self.transport.take() {
            tokio::spawn(async move { transport.close().await });
        }
        self.sync.reset();
        info!(session = %self.id, from = ?self.state, "remote end gone, session closed");
        self.state = ConnectionState::Closed;
    }
}

fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(session: &mut PeerSession) -> Vec<SessionEvent> {
        std::iter::from_fn(|| session.poll_event()).collect()
    }

    #[tokio::test]
    async fn fresh_session_is_idle_and_quiet() {
        let mut session = PeerSession::new("https://example.org/play");
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.role(), Role::None);
        assert!(session.remote_snapshot().is_none());
        assert!(session.pending_answer().is_none());
        assert!(session.poll_event().is_none());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_with_one_event() {
        let mut session = PeerSession::new("https://example.org/play");

        session.disconnect().await;
        session.disconnect().await;

        let events = drain(&mut session);
        assert_eq!(events, vec![SessionEvent::Disconnected]);
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(session.remote_snapshot().is_none());
    }

    #[tokio::test]
    async fn closed_sessions_reject_new_handshakes() {
        let mut session = PeerSession::new("https://example.org/play");
        session.disconnect().await;

        assert!(matches!(
            session.host_game().await,
            Err(HandshakeError::NotIdle(ConnectionState::Closed))
        ));
        assert!(matches!(
            session.join_game("irrelevant").await,
            Err(HandshakeError::NotIdle(ConnectionState::Closed))
        ));
    }

    #[tokio::test]
    async fn join_with_garbage_offer_leaves_the_session_idle() {
        let mut session = PeerSession::new("https://example.org/play");
        assert!(session.join_game("definitely not an offer").await.is_err());
        // decode failures happen before any transition: still usable
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.role(), Role::None);
    }

    #[tokio::test]
    async fn join_from_link_without_offer_is_a_quiet_no() {
        let mut session = PeerSession::new("https://example.org/play");
        let joined = session.join_from_link("https://example.org/play").await.unwrap();
        assert!(!joined);
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn join_from_link_with_garbage_is_invalid_link() {
        let mut session = PeerSession::new("https://example.org/play");
        let err = session
            .join_from_link("https://example.org/play?offer=NotAnOffer")
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::InvalidLink));
    }

    #[tokio::test]
    async fn accept_answer_requires_awaiting_answer() {
        let mut session = PeerSession::new("https://example.org/play");
        assert!(matches!(
            session.accept_answer("whatever").await,
            Err(HandshakeError::NotAwaitingAnswer(ConnectionState::Idle))
        ));
    }

    #[tokio::test]
    async fn publish_outside_open_is_a_silent_noop() {
        let session = PeerSession::new("https://example.org/play");
        // no transport, not open: must neither error nor panic
        session.publish(&PlayerSnapshot::spawn(0.0, 0.0)).await;
        session
            .publish_game_event("absorbed", serde_json::Value::Null)
            .await;
    }
}
