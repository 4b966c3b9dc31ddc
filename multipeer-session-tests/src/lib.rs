use cucumber::World;
use multipeer_session_core::{InvitationId, PeerHandle, PeerId, PeerRegistry};
use multipeer_session_p2p::{
    CoordinatorConfig, EventCategory, LoopbackNetwork, LoopbackTransport, SessionCoordinator,
    SessionError, SessionEvent,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle with value equality, standing in for a native peer object
#[derive(Debug, Clone, PartialEq)]
pub struct TestHandle {
    pub name: String,
    pub hash: u64,
}

impl TestHandle {
    pub fn named(name: &str) -> Self {
        let hash = name
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ b as u64).wrapping_mul(0x100_0000_01b3));
        Self {
            name: name.to_string(),
            hash,
        }
    }
}

impl PeerHandle for TestHandle {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn native_hash(&self) -> u64 {
        self.hash
    }
}

/// One coordinator on the shared loopback network, with its received events
pub struct Node {
    pub coordinator: Arc<SessionCoordinator<LoopbackTransport>>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    pub log: Vec<SessionEvent>,
}

impl Node {
    fn join(network: &LoopbackNetwork, name: &str, accepts_invitations: bool) -> Self {
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new(name));
        let (tx, inbox) = mpsc::unbounded_channel();
        for category in EventCategory::ALL {
            if category == EventCategory::ReceiveInvitation && !accepts_invitations {
                continue;
            }
            coordinator.arm(category, tx.clone());
        }

        Self {
            coordinator,
            inbox,
            log: Vec::new(),
        }
    }

    fn pump(&mut self) {
        while let Ok(event) = self.inbox.try_recv() {
            self.log.push(event);
        }
    }
}

#[derive(World, Default)]
pub struct CoordinatorWorld {
    /// Shared medium for all coordinators in a scenario
    pub network: LoopbackNetwork,

    /// Coordinators by display name
    pub nodes: HashMap<String, Node>,

    /// Result of the last fallible operation
    pub last_error: Option<SessionError>,

    /// Bytes reported by the last successful send
    pub last_sent: Option<usize>,

    /// Standalone registry for identity scenarios
    pub registry: Option<PeerRegistry<TestHandle>>,

    /// Ids handed out by the standalone registry, in call order
    pub resolved: Vec<(String, PeerId)>,
}

impl fmt::Debug for CoordinatorWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorWorld")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("last_error", &self.last_error)
            .field("last_sent", &self.last_sent)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

impl CoordinatorWorld {
    pub fn add_node(&mut self, name: &str, accepts_invitations: bool) {
        let node = Node::join(&self.network, name, accepts_invitations);
        self.nodes.insert(name.to_string(), node);
    }

    pub fn coordinator(&self, name: &str) -> Arc<SessionCoordinator<LoopbackTransport>> {
        self.nodes
            .get(name)
            .map(|node| node.coordinator.clone())
            .unwrap_or_else(|| panic!("Peer '{}' not found", name))
    }

    /// Move every pending event into the nodes' logs
    pub fn pump(&mut self) {
        for node in self.nodes.values_mut() {
            node.pump();
        }
    }

    pub fn log(&mut self, name: &str) -> &[SessionEvent] {
        self.pump();
        self.nodes
            .get(name)
            .map(|node| node.log.as_slice())
            .unwrap_or_else(|| panic!("Peer '{}' not found", name))
    }

    /// Id under which `observer` knows `target`, from the events it received
    pub fn known_id(&mut self, observer: &str, target: &str) -> Option<PeerId> {
        self.log(observer)
            .iter()
            .filter_map(SessionEvent::peer)
            .find(|peer| peer.name == target)
            .map(|peer| peer.id)
    }

    /// Last invitation `name` received
    pub fn last_invitation(&mut self, name: &str) -> Option<InvitationId> {
        self.log(name).iter().rev().find_map(|event| match event {
            SessionEvent::ReceiveInvitation { invitation_id, .. } => Some(*invitation_id),
            _ => None,
        })
    }

    pub fn record<T>(&mut self, result: Result<T, SessionError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    pub fn registry(&mut self) -> &mut PeerRegistry<TestHandle> {
        self.registry
            .get_or_insert_with(|| PeerRegistry::new(TestHandle::named("Local")))
    }
}
