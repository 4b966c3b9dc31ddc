mod config;
mod coordinator;
mod event_funnel;
mod events;

pub use config::{AcceptAllCertificates, CertificatePolicy, CoordinatorConfig};
pub use coordinator::SessionCoordinator;
pub use event_funnel::{Delivery, EventFunnel, EventSender};
pub use events::{EventCategory, SessionEvent};
