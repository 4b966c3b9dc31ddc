use crate::infrastructure::error::TransportError;
use multipeer_session_core::{InvitationHandler, LocalIdentity, PeerHandle, SessionState};
use std::collections::HashMap;
use std::sync::Weak;
use std::time::Duration;

/// Delivery guarantee requested for a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Reliable,
    Unreliable,
}

/// Key/value pairs a peer advertises alongside its presence
pub type DiscoveryInfo = HashMap<String, String>;

/// One-shot answer to a certificate presented during session setup
pub type CertificateHandler = Box<dyn FnOnce(bool) + Send + 'static>;

/// Platform peer-to-peer service: advertise, browse, invite, send
///
/// Implementations may invoke delegate callbacks from any thread, including
/// synchronously from inside these methods.
pub trait Transport: Send + Sync + 'static {
    type Peer: PeerHandle;

    /// Build (and bind) the native handle of the local peer
    fn local_peer(&self, identity: &LocalIdentity) -> Self::Peer;

    /// Install the receiver of all transport callbacks
    fn set_delegate(&self, delegate: Weak<dyn TransportDelegate<Self::Peer>>);

    fn start_advertising(&self, service_type: &str) -> Result<(), TransportError>;

    fn stop_advertising(&self);

    fn start_browsing(&self, service_type: &str) -> Result<(), TransportError>;

    fn stop_browsing(&self);

    /// Invite a discovered peer into the local session. `None` waits forever.
    fn invite(
        &self,
        peer: &Self::Peer,
        context: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<(), TransportError>;

    fn send(&self, data: &[u8], peers: &[Self::Peer], mode: SendMode)
        -> Result<(), TransportError>;

    /// Leave the session, dropping every connected peer
    fn disconnect(&self);
}

/// Callbacks the transport raises on its own threads
pub trait TransportDelegate<H: PeerHandle>: Send + Sync {
    fn on_advertising_error(&self, message: &str);

    fn on_browsing_error(&self, message: &str);

    fn on_invitation_received(&self, peer: &H, context: Option<&[u8]>, handler: InvitationHandler);

    fn on_peer_found(&self, peer: &H, discovery_info: Option<&DiscoveryInfo>);

    fn on_peer_lost(&self, peer: &H);

    fn on_session_state_changed(&self, peer: &H, state: SessionState);

    fn on_data_received(&self, peer: &H, data: &[u8]);

    fn on_certificate_received(&self, peer: &H, chain: &[Vec<u8>], handler: CertificateHandler);
}
