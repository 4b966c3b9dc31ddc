use multipeer_session_core::{LocalIdentity, PeerHandle};
use multipeer_session_p2p::infrastructure::{SendMode, Transport, TransportDelegate, TransportError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

/// Native handle used by the mock transport
#[derive(Debug, Clone, PartialEq)]
pub struct MockPeer {
    pub name: String,
    pub hash: u64,
}

impl MockPeer {
    pub fn new(name: &str, hash: u64) -> Self {
        Self {
            name: name.to_string(),
            hash,
        }
    }
}

impl PeerHandle for MockPeer {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn native_hash(&self) -> u64 {
        self.hash
    }
}

/// Every operation the coordinator asked the transport for, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartAdvertising(String),
    StopAdvertising,
    StartBrowsing(String),
    StopBrowsing,
    Invite(MockPeer, Option<Duration>),
    Send {
        data: Vec<u8>,
        peers: Vec<MockPeer>,
        mode: SendMode,
    },
    Disconnect,
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub local: Option<MockPeer>,
    pub delegate: Option<Weak<dyn TransportDelegate<MockPeer>>>,
    pub fail_start: Option<String>,
    pub panic_on_start: bool,
    pub fail_send: Option<String>,
    pub fail_invite: Option<String>,
}

/// Recording transport that never touches a network
///
/// Clones share state, so a test keeps one clone to script failures,
/// inspect calls and fire delegate callbacks.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn local(&self) -> MockPeer {
        self.state().local.clone().expect("local peer not bound")
    }

    /// The coordinator, seen through the callback interface
    pub fn delegate(&self) -> Arc<dyn TransportDelegate<MockPeer>> {
        let weak = self.state().delegate.clone().expect("delegate not set");
        weak.upgrade().expect("coordinator dropped")
    }

    pub fn sends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Send { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    fn start(&self, call: Call) -> Result<(), TransportError> {
        let (panic_on_start, failure) = {
            let state = self.state();
            (state.panic_on_start, state.fail_start.clone())
        };
        if panic_on_start {
            panic!("mock transport refused to start");
        }
        if let Some(message) = failure {
            return Err(TransportError::new(message));
        }
        self.record(call);
        Ok(())
    }
}

impl Transport for MockTransport {
    type Peer = MockPeer;

    fn local_peer(&self, identity: &LocalIdentity) -> MockPeer {
        let peer = MockPeer::new(&identity.display_name, 0xfeed);
        self.state().local = Some(peer.clone());
        peer
    }

    fn set_delegate(&self, delegate: Weak<dyn TransportDelegate<MockPeer>>) {
        self.state().delegate = Some(delegate);
    }

    fn start_advertising(&self, service_type: &str) -> Result<(), TransportError> {
        self.start(Call::StartAdvertising(service_type.to_string()))
    }

    fn stop_advertising(&self) {
        self.record(Call::StopAdvertising);
    }

    fn start_browsing(&self, service_type: &str) -> Result<(), TransportError> {
        self.start(Call::StartBrowsing(service_type.to_string()))
    }

    fn stop_browsing(&self) {
        self.record(Call::StopBrowsing);
    }

    fn invite(
        &self,
        peer: &MockPeer,
        _context: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError> {
        if let Some(message) = self.state().fail_invite.clone() {
            return Err(TransportError::new(message));
        }
        self.record(Call::Invite(peer.clone(), timeout));
        Ok(())
    }

    fn send(&self, data: &[u8], peers: &[MockPeer], mode: SendMode) -> Result<(), TransportError> {
        self.record(Call::Send {
            data: data.to_vec(),
            peers: peers.to_vec(),
            mode,
        });
        match self.state().fail_send.clone() {
            Some(message) => Err(TransportError::new(message)),
            None => Ok(()),
        }
    }

    fn disconnect(&self) {
        self.record(Call::Disconnect);
    }
}
