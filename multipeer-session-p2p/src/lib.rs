// Application layer (use cases)
pub mod application;

// Infrastructure layer (adapters)
pub mod infrastructure;

pub mod error;

// Re-exports for convenience
pub use application::{
    AcceptAllCertificates, CertificatePolicy, CoordinatorConfig, Delivery, EventCategory,
    EventFunnel, EventSender, SessionCoordinator, SessionEvent,
};
pub use error::{ErrorKind, Result, SessionError};
pub use infrastructure::{
    LoopbackNetwork, LoopbackPeer, LoopbackTransport, SendMode, Transport, TransportDelegate,
    TransportError,
};
pub use multipeer_session_core::{
    InvitationId, PeerHandle, PeerId, PeerInfo, SessionState,
};
