use crate::application::{
    CoordinatorConfig, Delivery, EventCategory, EventFunnel, EventSender, SessionEvent,
};
use crate::error::{Result, SessionError};
use crate::infrastructure::{
    CertificateHandler, DiscoveryInfo, SendMode, Transport, TransportDelegate, TransportError,
};
use multipeer_session_core::{
    load_or_mint, IdentityStore, InvitationHandler, InvitationId, InvitationLedger, LocalIdentity,
    PeerHandle, PeerId, PeerInfo, PeerRegistry, SessionState,
};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Advertiser and browser sub-lifecycles (service type while active)
#[derive(Debug, Default)]
struct Lifecycle {
    advertising: Option<String>,
    browsing: Option<String>,
}

/// State touched by transport callbacks
struct SharedState<H: PeerHandle> {
    registry: PeerRegistry<H>,
    ledger: InvitationLedger,
    funnel: EventFunnel,
    /// Last state reported per remote peer
    peer_states: HashMap<PeerId, SessionState>,
}

/// Application service: owns one advertiser, one browser and one session
///
/// Commands are turned into transport operations; transport callbacks are
/// resolved to stable peer ids and pushed through the [`EventFunnel`].
///
/// Lock order is `lifecycle` then `state`. The transport is never called
/// while `state` is held, so it may call back synchronously.
pub struct SessionCoordinator<T: Transport> {
    transport: T,
    config: CoordinatorConfig,
    lifecycle: Mutex<Lifecycle>,
    state: Mutex<SharedState<T::Peer>>,
}

impl<T: Transport> SessionCoordinator<T> {
    /// Create a coordinator with a freshly minted local identity
    pub fn new(transport: T, config: CoordinatorConfig) -> Arc<Self> {
        let identity = LocalIdentity::mint(config.local_display_name.clone());
        Self::with_identity(transport, config, &identity)
    }

    /// Create a coordinator whose local identity survives restarts
    pub fn with_identity_store(
        transport: T,
        config: CoordinatorConfig,
        store: &dyn IdentityStore,
    ) -> Result<Arc<Self>> {
        let identity = load_or_mint(store, &config.local_display_name)?;
        Ok(Self::with_identity(transport, config, &identity))
    }

    /// Create a coordinator for an already loaded local identity
    pub fn with_identity(transport: T, config: CoordinatorConfig, identity: &LocalIdentity) -> Arc<Self> {
        let local = transport.local_peer(identity);
        tracing::info!(name = %identity.display_name, "Creating session coordinator");

        let coordinator = Arc::new(Self {
            transport,
            config,
            lifecycle: Mutex::new(Lifecycle::default()),
            state: Mutex::new(SharedState {
                registry: PeerRegistry::new(local),
                ledger: InvitationLedger::new(),
                funnel: EventFunnel::new(),
                peer_states: HashMap::new(),
            }),
        });

        let delegate: Arc<dyn TransportDelegate<T::Peer>> = coordinator.clone();
        coordinator.transport.set_delegate(Arc::downgrade(&delegate));
        coordinator
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, SharedState<T::Peer>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Info of the local peer (id 0)
    pub fn local_peer_info(&self) -> PeerInfo {
        self.state().registry.local_info()
    }

    // ===== Event subscriptions =====

    /// Arm `category` with `endpoint`, replacing any previous subscriber
    pub fn arm(&self, category: EventCategory, endpoint: EventSender) {
        self.state().funnel.arm(category, endpoint);
    }

    /// Arm `category` with a new channel and hand back its receiving end
    pub fn subscribe(&self, category: EventCategory) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.arm(category, tx);
        rx
    }

    pub fn disarm(&self, category: EventCategory) {
        self.state().funnel.disarm(category);
    }

    // ===== Advertising / browsing =====

    /// Advertise under `service_type`, replacing any running advertiser
    pub fn start_advertising(&self, service_type: &str) -> Result<()> {
        validate_service_type(service_type)?;

        let mut lifecycle = self.lifecycle();
        if let Some(previous) = lifecycle.advertising.take() {
            tracing::debug!(service_type = %previous, "Stopping previous advertiser");
            self.transport.stop_advertising();
        }

        guard_transport_init(|| self.transport.start_advertising(service_type)).map_err(|e| {
            tracing::warn!(service_type, "Failed to start advertising: {}", e);
            e
        })?;

        lifecycle.advertising = Some(service_type.to_string());
        tracing::info!(service_type, "Advertising started");
        Ok(())
    }

    /// Stop advertising. No-op when not advertising.
    pub fn stop_advertising(&self) {
        if let Some(service_type) = self.lifecycle().advertising.take() {
            self.transport.stop_advertising();
            tracing::info!(%service_type, "Advertising stopped");
        }
    }

    /// Browse for peers under `service_type`, replacing any running browser
    pub fn start_browsing(&self, service_type: &str) -> Result<()> {
        validate_service_type(service_type)?;

        let mut lifecycle = self.lifecycle();
        if let Some(previous) = lifecycle.browsing.take() {
            tracing::debug!(service_type = %previous, "Stopping previous browser");
            self.transport.stop_browsing();
        }

        guard_transport_init(|| self.transport.start_browsing(service_type)).map_err(|e| {
            tracing::warn!(service_type, "Failed to start browsing: {}", e);
            e
        })?;

        lifecycle.browsing = Some(service_type.to_string());
        tracing::info!(service_type, "Browsing started");
        Ok(())
    }

    /// Stop browsing. No-op when not browsing.
    pub fn stop_browsing(&self) {
        if let Some(service_type) = self.lifecycle().browsing.take() {
            self.transport.stop_browsing();
            tracing::info!(%service_type, "Browsing stopped");
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.lifecycle().advertising.is_some()
    }

    pub fn is_browsing(&self) -> bool {
        self.lifecycle().browsing.is_some()
    }

    // ===== Invitations =====

    /// Invite a discovered peer into the session, without timeout
    pub fn invite_peer(&self, peer_id: PeerId) -> Result<()> {
        let lifecycle = self.lifecycle();
        if lifecycle.browsing.is_none() {
            return Err(SessionError::NotBrowsing);
        }

        let handle = self
            .state()
            .registry
            .remote_handle(peer_id)
            .cloned()
            .ok_or(SessionError::UnknownPeer(peer_id))?;

        self.transport
            .invite(&handle, None, None)
            .map_err(|e| SessionError::TransportSend(e.to_string()))?;

        tracing::info!(%peer_id, "Invitation sent");
        Ok(())
    }

    pub fn accept_invitation(&self, invitation_id: InvitationId) -> Result<()> {
        self.answer_invitation(invitation_id, true)
    }

    pub fn decline_invitation(&self, invitation_id: InvitationId) -> Result<()> {
        self.answer_invitation(invitation_id, false)
    }

    fn answer_invitation(&self, invitation_id: InvitationId, accept: bool) -> Result<()> {
        // Taken out under the lock, answered after releasing it
        let invitation = self
            .state()
            .ledger
            .take(invitation_id)
            .ok_or(SessionError::UnknownInvitation(invitation_id))?;

        invitation.respond(accept);
        Ok(())
    }

    /// Number of invitations waiting for an answer
    pub fn pending_invitations(&self) -> usize {
        self.state().ledger.len()
    }

    // ===== Session =====

    /// Leave the session for all peers
    pub fn disconnect(&self) {
        tracing::info!("Disconnecting session");
        self.transport.disconnect();
    }

    /// Peers whose last reported state is `Connected`, ordered by id
    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        let state = self.state();
        let mut peers: Vec<PeerInfo> = state
            .peer_states
            .iter()
            .filter(|(_, s)| **s == SessionState::Connected)
            .filter_map(|(id, _)| {
                state
                    .registry
                    .remote_handle(*id)
                    .map(|handle| PeerInfo::new(*id, handle))
            })
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    /// Send `data` to every peer in `peer_ids`
    ///
    /// Fails as a whole, before anything is sent, if any id is unknown.
    /// Returns the number of bytes handed to the transport.
    pub fn send_data(&self, peer_ids: &[PeerId], data: &[u8], mode: SendMode) -> Result<usize> {
        let handles = {
            let state = self.state();
            peer_ids
                .iter()
                .map(|id| state.registry.remote_handle(*id).cloned())
                .collect::<Option<Vec<_>>>()
                .ok_or(SessionError::InvalidPeerIds)?
        };

        self.transport.send(data, &handles, mode).map_err(|e| {
            tracing::warn!(peers = ?peer_ids, "Send failed: {}", e);
            SessionError::TransportSend(e.to_string())
        })?;

        tracing::trace!(peers = ?peer_ids, bytes = data.len(), ?mode, "Data sent");
        Ok(data.len())
    }

    pub fn send_data_reliable(&self, peer_ids: &[PeerId], data: &[u8]) -> Result<usize> {
        self.send_data(peer_ids, data, SendMode::Reliable)
    }

    pub fn send_data_unreliable(&self, peer_ids: &[PeerId], data: &[u8]) -> Result<usize> {
        self.send_data(peer_ids, data, SendMode::Unreliable)
    }

    /// Stop advertiser and browser and leave the session
    ///
    /// Also runs on drop.
    pub fn shutdown(&self) {
        self.stop_advertising();
        self.stop_browsing();
        self.transport.disconnect();
        tracing::debug!("Session coordinator shut down");
    }

    /// Push an event built from a freshly resolved remote peer
    ///
    /// Events reporting the local peer are transport bugs and never reach the consumer.
    fn raise_for_remote(&self, peer: &T::Peer, what: &str, build: impl FnOnce(PeerInfo) -> SessionEvent) {
        let mut state = self.state();
        let info = state.registry.info(peer);

        if info.id.is_local() {
            tracing::error!("Internal consistency fault: {} reported for the local peer", what);
            return;
        }

        if let Delivery::Dropped(event) = state.funnel.raise(build(info)) {
            tracing::trace!(category = %event.category(), "Event dropped");
        }
    }

    fn raise(&self, event: SessionEvent) {
        if let Delivery::Dropped(event) = self.state().funnel.raise(event) {
            tracing::debug!(category = %event.category(), "Event dropped, no subscriber");
        }
    }
}

impl<T: Transport> TransportDelegate<T::Peer> for SessionCoordinator<T> {
    fn on_advertising_error(&self, message: &str) {
        tracing::warn!("Advertiser did not start: {}", message);
        self.raise(SessionEvent::AdvertisingError(message.to_string()));
    }

    fn on_browsing_error(&self, message: &str) {
        tracing::warn!("Browser did not start: {}", message);
        self.raise(SessionEvent::BrowsingError(message.to_string()));
    }

    fn on_invitation_received(
        &self,
        peer: &T::Peer,
        _context: Option<&[u8]>,
        handler: InvitationHandler,
    ) {
        let declined: Option<InvitationHandler> = {
            let mut state = self.state();
            let info = state.registry.info(peer);

            if info.id.is_local() {
                tracing::error!("Internal consistency fault: invitation from the local peer");
                Some(handler)
            } else if !state.funnel.is_armed(EventCategory::ReceiveInvitation) {
                tracing::info!(peer_id = %info.id, "No invitation subscriber, declining");
                Some(handler)
            } else {
                let invitation_id = state.ledger.record(handler);
                let peer_id = info.id;
                let event = SessionEvent::ReceiveInvitation {
                    peer: info,
                    invitation_id,
                };

                match state.funnel.raise(event) {
                    Delivery::Delivered => {
                        tracing::info!(%peer_id, %invitation_id, "Invitation received");
                        None
                    }
                    Delivery::Dropped(_) => {
                        tracing::info!(%peer_id, "Invitation subscriber went away, declining");
                        state.ledger.take(invitation_id).map(|pending| pending.into_handler())
                    }
                }
            }
        };

        if let Some(handler) = declined {
            handler(false);
        }
    }

    fn on_peer_found(&self, peer: &T::Peer, _discovery_info: Option<&DiscoveryInfo>) {
        self.raise_for_remote(peer, "found peer", SessionEvent::FoundPeer);
    }

    fn on_peer_lost(&self, peer: &T::Peer) {
        self.raise_for_remote(peer, "lost peer", SessionEvent::LostPeer);
    }

    fn on_session_state_changed(&self, peer: &T::Peer, new_state: SessionState) {
        let mut state = self.state();
        let info = state.registry.info(peer);

        if !info.id.is_local() {
            state.peer_states.insert(info.id, new_state);
        }
        tracing::debug!(peer_id = %info.id, state = %new_state, "Peer state changed");

        let event = SessionEvent::ChangeState {
            peer: info,
            state: new_state,
        };
        if let Delivery::Dropped(event) = state.funnel.raise(event) {
            tracing::trace!(category = %event.category(), "Event dropped");
        }
    }

    fn on_data_received(&self, peer: &T::Peer, data: &[u8]) {
        self.raise_for_remote(peer, "data", |info| SessionEvent::ReceiveData {
            peer: info,
            data: data.to_vec(),
        });
    }

    fn on_certificate_received(
        &self,
        peer: &T::Peer,
        chain: &[Vec<u8>],
        handler: CertificateHandler,
    ) {
        let info = self.state().registry.info(peer);
        let approved = self.config.certificate_policy.evaluate(&info, chain);
        if !approved {
            tracing::warn!(peer_id = %info.id, "Certificate rejected");
        }
        handler(approved);
    }
}

impl<T: Transport> Drop for SessionCoordinator<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_service_type(service_type: &str) -> Result<()> {
    if service_type.is_empty() {
        return Err(SessionError::Validation(
            "service type must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Run an advertiser/browser start, turning errors and panics into `TransportInit`
fn guard_transport_init(start: impl FnOnce() -> std::result::Result<(), TransportError>) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SessionError::TransportInit(e.to_string())),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "transport panicked".to_string());
            Err(SessionError::TransportInit(message))
        }
    }
}
