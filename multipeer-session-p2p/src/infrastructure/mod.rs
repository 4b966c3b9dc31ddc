pub mod error;
pub mod loopback;
pub mod transport;

pub use error::TransportError;
pub use loopback::{is_valid_service_type, LoopbackNetwork, LoopbackPeer, LoopbackTransport};
pub use transport::{
    CertificateHandler, DiscoveryInfo, SendMode, Transport, TransportDelegate,
};
