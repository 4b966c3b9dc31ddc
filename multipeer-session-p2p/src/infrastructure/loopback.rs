//! In-memory transport: every node attached to one [`LoopbackNetwork`]
//! shares the same "air". Used by the CLI demo and the test suites.

use crate::infrastructure::error::TransportError;
use crate::infrastructure::transport::{
    CertificateHandler, DiscoveryInfo, SendMode, Transport, TransportDelegate,
};
use multipeer_session_core::{
    InvitationHandler, LocalIdentity, PeerHandle, SessionState,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Maximum length of a service type
pub const MAX_SERVICE_TYPE_LEN: usize = 15;

/// Native handle of a loopback node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopbackPeer {
    display_name: String,
    credential: Vec<u8>,
}

impl LoopbackPeer {
    pub fn new(display_name: impl Into<String>, credential: Vec<u8>) -> Self {
        Self {
            display_name: display_name.into(),
            credential,
        }
    }

    /// Certificate this peer presents during session setup
    pub fn credential(&self) -> &[u8] {
        &self.credential
    }
}

impl PeerHandle for LoopbackPeer {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn native_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.credential.hash(&mut hasher);
        hasher.finish()
    }
}

/// Whether `service_type` is 1-15 chars of lowercase ASCII letters, digits or hyphens
pub fn is_valid_service_type(service_type: &str) -> bool {
    !service_type.is_empty()
        && service_type.len() <= MAX_SERVICE_TYPE_LEN
        && service_type
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(u64);

type DelegateRef = Weak<dyn TransportDelegate<LoopbackPeer>>;

#[derive(Default)]
struct Node {
    peer: Option<LoopbackPeer>,
    delegate: Option<DelegateRef>,
    advertising: Option<String>,
    browsing: Option<String>,
    session: HashSet<NodeId>,
}

#[derive(Default)]
struct Air {
    nodes: HashMap<NodeId, Node>,
    next_node: u64,
}

impl Air {
    fn node_of(&self, peer: &LoopbackPeer) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.peer.as_ref() == Some(peer))
            .map(|(id, _)| *id)
    }

    fn peer(&self, id: NodeId) -> Option<LoopbackPeer> {
        self.nodes.get(&id).and_then(|node| node.peer.clone())
    }

    fn delegate(&self, id: NodeId) -> Option<DelegateRef> {
        self.nodes.get(&id).and_then(|node| node.delegate.clone())
    }

    /// Other nodes with a bound peer whose `select` field equals `service_type`
    fn others_with(
        &self,
        me: NodeId,
        service_type: &str,
        select: impl Fn(&Node) -> Option<&String>,
    ) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(id, node)| {
                **id != me
                    && node.peer.is_some()
                    && select(node).map(String::as_str) == Some(service_type)
            })
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Callback queued under the air lock and delivered after releasing it
enum Callback {
    AdvertisingError(String),
    BrowsingError(String),
    Found(LoopbackPeer),
    Lost(LoopbackPeer),
    State(LoopbackPeer, SessionState),
    Data(LoopbackPeer, Vec<u8>),
    Invitation(LoopbackPeer, Option<Vec<u8>>, InvitationHandler),
    Certificate(LoopbackPeer, Vec<Vec<u8>>, CertificateHandler),
}

type Outbox = Vec<(Option<DelegateRef>, Callback)>;

fn deliver(outbox: Outbox) {
    for (delegate, callback) in outbox {
        let Some(delegate) = delegate.and_then(|d| d.upgrade()) else {
            // Nobody listening: one-shot continuations are answered negatively
            match callback {
                Callback::Invitation(_, _, handler) => handler(false),
                Callback::Certificate(_, _, handler) => handler(false),
                _ => {}
            }
            continue;
        };

        match callback {
            Callback::AdvertisingError(message) => delegate.on_advertising_error(&message),
            Callback::BrowsingError(message) => delegate.on_browsing_error(&message),
            Callback::Found(peer) => delegate.on_peer_found(&peer, None::<&DiscoveryInfo>),
            Callback::Lost(peer) => delegate.on_peer_lost(&peer),
            Callback::State(peer, state) => delegate.on_session_state_changed(&peer, state),
            Callback::Data(peer, data) => delegate.on_data_received(&peer, &data),
            Callback::Invitation(peer, context, handler) => {
                delegate.on_invitation_received(&peer, context.as_deref(), handler)
            }
            Callback::Certificate(peer, chain, handler) => {
                delegate.on_certificate_received(&peer, &chain, handler)
            }
        }
    }
}

/// Both sides' certificate answers for one accepted invitation
#[derive(Debug)]
struct Handshake {
    inviter: NodeId,
    invitee: NodeId,
    outstanding: u8,
    approved: bool,
}

/// Shared medium that loopback transports discover and connect through
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    air: Arc<Mutex<Air>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new node
    pub fn join(&self) -> LoopbackTransport {
        let mut air = self.air();
        let node = NodeId(air.next_node);
        air.next_node += 1;
        air.nodes.insert(node, Node::default());
        tracing::debug!(node = node.0, "Loopback node joined");

        LoopbackTransport {
            network: self.clone(),
            node,
        }
    }

    /// Number of attached nodes
    pub fn node_count(&self) -> usize {
        self.air().nodes.len()
    }

    fn air(&self) -> MutexGuard<'_, Air> {
        self.air.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer_invitation(&self, inviter: NodeId, invitee: NodeId, accept: bool) {
        let outbox = {
            let air = self.air();
            let (Some(inviter_peer), Some(invitee_peer)) = (air.peer(inviter), air.peer(invitee))
            else {
                tracing::debug!("Invitation answered after a node left");
                return;
            };

            if !accept {
                tracing::debug!(inviter = inviter.0, invitee = invitee.0, "Invitation declined");
                vec![(
                    air.delegate(inviter),
                    Callback::State(invitee_peer, SessionState::NotConnected),
                )]
            } else {
                let handshake = Arc::new(Mutex::new(Handshake {
                    inviter,
                    invitee,
                    outstanding: 2,
                    approved: true,
                }));

                vec![
                    (
                        air.delegate(invitee),
                        Callback::State(inviter_peer.clone(), SessionState::Connecting),
                    ),
                    (
                        air.delegate(invitee),
                        Callback::Certificate(
                            inviter_peer.clone(),
                            vec![inviter_peer.credential.clone()],
                            self.certificate_answer(handshake.clone()),
                        ),
                    ),
                    (
                        air.delegate(inviter),
                        Callback::Certificate(
                            invitee_peer.clone(),
                            vec![invitee_peer.credential.clone()],
                            self.certificate_answer(handshake),
                        ),
                    ),
                ]
            }
        };

        deliver(outbox);
    }

    fn certificate_answer(&self, handshake: Arc<Mutex<Handshake>>) -> CertificateHandler {
        let network = self.clone();
        Box::new(move |approved| {
            let finished = {
                let mut hs = handshake.lock().unwrap_or_else(PoisonError::into_inner);
                hs.outstanding = hs.outstanding.saturating_sub(1);
                hs.approved &= approved;
                (hs.outstanding == 0).then(|| (hs.inviter, hs.invitee, hs.approved))
            };

            if let Some((inviter, invitee, approved)) = finished {
                network.complete_handshake(inviter, invitee, approved);
            }
        })
    }

    fn complete_handshake(&self, inviter: NodeId, invitee: NodeId, approved: bool) {
        let outbox = {
            let mut air = self.air();
            let (Some(inviter_peer), Some(invitee_peer)) = (air.peer(inviter), air.peer(invitee))
            else {
                return;
            };

            let state = if approved {
                if let Some(node) = air.nodes.get_mut(&inviter) {
                    node.session.insert(invitee);
                }
                if let Some(node) = air.nodes.get_mut(&invitee) {
                    node.session.insert(inviter);
                }
                SessionState::Connected
            } else {
                tracing::debug!(inviter = inviter.0, invitee = invitee.0, "Certificate rejected");
                SessionState::NotConnected
            };

            vec![
                (air.delegate(inviter), Callback::State(invitee_peer, state)),
                (air.delegate(invitee), Callback::State(inviter_peer, state)),
            ]
        };

        deliver(outbox);
    }
}

/// One node on a [`LoopbackNetwork`]
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    node: NodeId,
}

impl LoopbackTransport {
    /// Raise an asynchronous advertiser failure on this node
    pub fn report_advertising_error(&self, message: &str) {
        let delegate = self.network.air().delegate(self.node);
        deliver(vec![(delegate, Callback::AdvertisingError(message.to_string()))]);
    }

    /// Raise an asynchronous browser failure on this node
    pub fn report_browsing_error(&self, message: &str) {
        let delegate = self.network.air().delegate(self.node);
        deliver(vec![(delegate, Callback::BrowsingError(message.to_string()))]);
    }

    /// Peers currently sharing a session with this node
    pub fn session_peers(&self) -> Vec<LoopbackPeer> {
        let air = self.network.air();
        air.nodes
            .get(&self.node)
            .map(|node| node.session.iter().filter_map(|id| air.peer(*id)).collect())
            .unwrap_or_default()
    }

    fn leave_session(air: &mut Air, me: NodeId) -> Outbox {
        let Some(my_peer) = air.peer(me) else {
            return Vec::new();
        };
        let members: Vec<NodeId> = air
            .nodes
            .get_mut(&me)
            .map(|node| node.session.drain().collect())
            .unwrap_or_default();

        let mut outbox = Outbox::new();
        for member in members {
            if let Some(node) = air.nodes.get_mut(&member) {
                node.session.remove(&me);
            }
            if let Some(peer) = air.peer(member) {
                outbox.push((
                    air.delegate(me),
                    Callback::State(peer, SessionState::NotConnected),
                ));
            }
            outbox.push((
                air.delegate(member),
                Callback::State(my_peer.clone(), SessionState::NotConnected),
            ));
        }
        outbox
    }

    fn withdraw_advertisement(air: &mut Air, me: NodeId) -> Outbox {
        let Some(service_type) = air.nodes.get_mut(&me).and_then(|n| n.advertising.take()) else {
            return Vec::new();
        };
        let Some(my_peer) = air.peer(me) else {
            return Vec::new();
        };

        air.others_with(me, &service_type, |n| n.browsing.as_ref())
            .into_iter()
            .map(|browser| (air.delegate(browser), Callback::Lost(my_peer.clone())))
            .collect()
    }
}

impl Transport for LoopbackTransport {
    type Peer = LoopbackPeer;

    fn local_peer(&self, identity: &LocalIdentity) -> LoopbackPeer {
        let peer = LoopbackPeer::new(identity.display_name.clone(), identity.credential.clone());
        if let Some(node) = self.network.air().nodes.get_mut(&self.node) {
            node.peer = Some(peer.clone());
        }
        peer
    }

    fn set_delegate(&self, delegate: Weak<dyn TransportDelegate<LoopbackPeer>>) {
        if let Some(node) = self.network.air().nodes.get_mut(&self.node) {
            node.delegate = Some(delegate);
        }
    }

    fn start_advertising(&self, service_type: &str) -> Result<(), TransportError> {
        if !is_valid_service_type(service_type) {
            return Err(TransportError::new(format!(
                "Invalid service type: {service_type}"
            )));
        }

        let outbox = {
            let mut air = self.network.air();
            let mut outbox = Self::withdraw_advertisement(&mut air, self.node);
            if let Some(node) = air.nodes.get_mut(&self.node) {
                node.advertising = Some(service_type.to_string());
            }

            if let Some(my_peer) = air.peer(self.node) {
                for browser in air.others_with(self.node, service_type, |n| n.browsing.as_ref()) {
                    outbox.push((air.delegate(browser), Callback::Found(my_peer.clone())));
                }
            }
            outbox
        };

        deliver(outbox);
        Ok(())
    }

    fn stop_advertising(&self) {
        let outbox = Self::withdraw_advertisement(&mut self.network.air(), self.node);
        deliver(outbox);
    }

    fn start_browsing(&self, service_type: &str) -> Result<(), TransportError> {
        if !is_valid_service_type(service_type) {
            return Err(TransportError::new(format!(
                "Invalid service type: {service_type}"
            )));
        }

        let outbox = {
            let mut air = self.network.air();
            if let Some(node) = air.nodes.get_mut(&self.node) {
                node.browsing = Some(service_type.to_string());
            }

            let delegate = air.delegate(self.node);
            air.others_with(self.node, service_type, |n| n.advertising.as_ref())
                .into_iter()
                .filter_map(|advertiser| air.peer(advertiser))
                .map(|peer| (delegate.clone(), Callback::Found(peer)))
                .collect::<Outbox>()
        };

        deliver(outbox);
        Ok(())
    }

    fn stop_browsing(&self) {
        if let Some(node) = self.network.air().nodes.get_mut(&self.node) {
            node.browsing = None;
        }
    }

    fn invite(
        &self,
        peer: &LoopbackPeer,
        context: Option<&[u8]>,
        _timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        let outbox = {
            let air = self.network.air();
            let my_peer = air
                .peer(self.node)
                .ok_or_else(|| TransportError::new("Local peer not bound"))?;
            let invitee = air
                .node_of(peer)
                .filter(|id| air.nodes.get(id).is_some_and(|n| n.advertising.is_some()))
                .ok_or_else(|| {
                    TransportError::new(format!("Peer {} not reachable", peer.display_name))
                })?;

            let network = self.network.clone();
            let inviter = self.node;
            let handler: InvitationHandler =
                Box::new(move |accept| network.answer_invitation(inviter, invitee, accept));

            vec![
                (
                    air.delegate(self.node),
                    Callback::State(peer.clone(), SessionState::Connecting),
                ),
                (
                    air.delegate(invitee),
                    Callback::Invitation(my_peer, context.map(<[u8]>::to_vec), handler),
                ),
            ]
        };

        deliver(outbox);
        Ok(())
    }

    fn send(
        &self,
        data: &[u8],
        peers: &[LoopbackPeer],
        mode: SendMode,
    ) -> Result<(), TransportError> {
        let outbox = {
            let air = self.network.air();
            let my_peer = air
                .peer(self.node)
                .ok_or_else(|| TransportError::new("Local peer not bound"))?;
            let session = air
                .nodes
                .get(&self.node)
                .map(|n| &n.session)
                .ok_or_else(|| TransportError::new("Node left the network"))?;

            let mut targets = Vec::with_capacity(peers.len());
            let mut missing = Vec::new();
            for peer in peers {
                match air.node_of(peer).filter(|id| session.contains(id)) {
                    Some(id) => targets.push(id),
                    None => missing.push(peer.display_name.as_str()),
                }
            }
            if !missing.is_empty() {
                return Err(TransportError::new(format!(
                    "Peers ({}) not connected",
                    missing.join(", ")
                )));
            }

            tracing::trace!(node = self.node.0, targets = targets.len(), ?mode, "Loopback send");
            targets
                .into_iter()
                .map(|id| (air.delegate(id), Callback::Data(my_peer.clone(), data.to_vec())))
                .collect::<Outbox>()
        };

        deliver(outbox);
        Ok(())
    }

    fn disconnect(&self) {
        let outbox = Self::leave_session(&mut self.network.air(), self.node);
        deliver(outbox);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        let outbox = {
            let mut air = self.network.air();
            let mut outbox = Self::withdraw_advertisement(&mut air, self.node);
            outbox.extend(Self::leave_session(&mut air, self.node));
            air.nodes.remove(&self.node);
            outbox
        };
        tracing::debug!(node = self.node.0, "Loopback node left");
        deliver(outbox);
    }
}
